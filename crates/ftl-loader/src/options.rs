/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Per-request loader options.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{LoaderError, Result};

/// Options recognized by the loader. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    /// Entry template name. Defaults to the resource path relative to the
    /// context.
    pub template: Option<String>,

    /// Locations added to the engine runtime's resource path.
    pub classpath: Classpath,

    /// Module providing the data model. Defaults to the resource itself.
    pub data: Option<String>,

    /// Template encoding; `utf-8` when unset.
    pub encoding: Option<String>,

    /// Locale tag, `en_US` or `en-US`.
    pub locale: Option<String>,

    /// Output format name; derived from the resource extension when unset.
    pub format: Option<String>,

    /// Directory template names resolve against.
    #[serde(alias = "baseDirectory")]
    pub context: Option<PathBuf>,
}

impl LoaderOptions {
    /// Parse options from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| LoaderError::configuration(format!("Invalid loader options: {}", e)))
    }
}

/// Either a single entry or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Classpath {
    One(String),
    Many(Vec<String>),
}

impl Default for Classpath {
    fn default() -> Self {
        Classpath::Many(Vec::new())
    }
}

impl Classpath {
    /// Non-empty entries, in order.
    pub fn entries(&self) -> Vec<&str> {
        let entries: Vec<&str> = match self {
            Classpath::One(entry) => vec![entry.as_str()],
            Classpath::Many(entries) => entries.iter().map(String::as_str).collect(),
        };
        entries.into_iter().filter(|e| !e.is_empty()).collect()
    }
}
