/*
 * output_format.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output formats a template can be configured with.
//!
//! The format is recorded on the configuration and visible to templates as
//! `${.output_format}`. No escaping is applied by the engine.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    Css,
    Html,
    JavaScript,
    Json,
    Rtf,
    PlainText,
    Xhtml,
    Xml,
    /// Neutral fallback for unknown or unspecified formats.
    #[default]
    Undefined,
}

impl OutputFormat {
    /// Look up a format by its short name (usually a file extension).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "css" => Some(OutputFormat::Css),
            "html" => Some(OutputFormat::Html),
            "js" => Some(OutputFormat::JavaScript),
            "json" => Some(OutputFormat::Json),
            "rtf" => Some(OutputFormat::Rtf),
            "txt" => Some(OutputFormat::PlainText),
            "xhtml" => Some(OutputFormat::Xhtml),
            "xml" => Some(OutputFormat::Xml),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Css => "CSS",
            OutputFormat::Html => "HTML",
            OutputFormat::JavaScript => "JavaScript",
            OutputFormat::Json => "JSON",
            OutputFormat::Rtf => "RTF",
            OutputFormat::PlainText => "plainText",
            OutputFormat::Xhtml => "XHTML",
            OutputFormat::Xml => "XML",
            OutputFormat::Undefined => "undefined",
        }
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Css => Some("text/css"),
            OutputFormat::Html => Some("text/html"),
            OutputFormat::JavaScript => Some("application/javascript"),
            OutputFormat::Json => Some("application/json"),
            OutputFormat::Rtf => Some("application/rtf"),
            OutputFormat::PlainText => Some("text/plain"),
            OutputFormat::Xhtml => Some("application/xhtml+xml"),
            OutputFormat::Xml => Some("application/xml"),
            OutputFormat::Undefined => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
