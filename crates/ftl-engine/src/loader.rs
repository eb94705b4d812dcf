/*
 * loader.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template loading.
//!
//! This module provides the [`TemplateLoader`] trait through which the engine
//! pulls template text, the [`pipe`] used to hand back text that is produced
//! asynchronously, and an in-memory loader.
//!
//! The loader surface is synchronous: `reader` must return immediately. A
//! loader whose bytes arrive later returns the reading end of a pipe and
//! fills the writing end from a background task; the engine awaits the
//! reader until the writer is closed.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tokio::sync::mpsc;

use crate::error::{TemplateError, TemplateResult};
use crate::locale::Locale;

/// Handle to a located template, as returned by
/// [`TemplateLoader::find_template_source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateSource {
    path: PathBuf,
}

impl TemplateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Trait for loading template text.
///
/// Implementations resolve logical template names (relative paths such as
/// `"index_en.html"` or `"partials/header.html"`) to sources, and open
/// readers over them.
pub trait TemplateLoader: Send + Sync {
    /// Find the source for a template name.
    ///
    /// # Returns
    /// `Ok(None)` when the template does not exist. Not finding a template is
    /// not an error; the engine tries the next localized candidate.
    fn find_template_source(&self, name: &str) -> TemplateResult<Option<TemplateSource>>;

    /// Last modification time in milliseconds since the Unix epoch.
    fn last_modified(&self, source: &TemplateSource) -> TemplateResult<i64>;

    /// Open a reader over the template text. Must not block.
    fn reader(&self, source: &TemplateSource, encoding: &str) -> TemplateResult<PipeReader>;

    /// Release a source once the engine is done with it.
    fn close_template_source(&self, _source: &TemplateSource) {}
}

/// Create a connected writer/reader pair.
///
/// Text written to the [`PipeWriter`] becomes readable from the
/// [`PipeReader`]; the reader reaches end-of-input once the writer is closed
/// or dropped.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PipeWriter { tx }, PipeReader { rx })
}

/// Writing end of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl PipeWriter {
    /// Write a chunk of text.
    ///
    /// # Errors
    /// Fails when the reading end has already been dropped.
    pub fn write(&self, text: impl Into<String>) -> std::io::Result<()> {
        self.tx.send(text.into()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "template reader was dropped")
        })
    }

    /// Close the pipe, signalling end-of-input to the reader.
    pub fn close(self) {}
}

/// Reading end of a [`pipe`].
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::UnboundedReceiver<String>,
}

impl PipeReader {
    /// A reader that yields `text` and then ends.
    pub fn from_text(text: impl Into<String>) -> Self {
        let (writer, reader) = pipe();
        // The reader is alive, so the write cannot fail.
        let _ = writer.write(text);
        reader
    }

    /// Read until the writer is closed.
    pub async fn read_to_string(mut self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.rx.recv().await {
            text.push_str(&chunk);
        }
        text
    }
}

/// Loader that serves templates from an in-memory map.
///
/// Useful for testing and for templates bundled into the application.
#[derive(Debug, Clone)]
pub struct StringTemplateLoader {
    templates: HashMap<String, (String, i64)>,
}

impl Default for StringTemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTemplateLoader {
    /// Create a new empty loader.
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Add a template. The modification time is the time of insertion.
    pub fn add(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        self.templates
            .insert(name.into(), (content.into(), now));
        self
    }

    /// Create a loader with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut loader = Self::new();
        for (name, content) in templates {
            loader.add(name, content);
        }
        loader
    }
}

impl TemplateLoader for StringTemplateLoader {
    fn find_template_source(&self, name: &str) -> TemplateResult<Option<TemplateSource>> {
        Ok(self
            .templates
            .contains_key(name)
            .then(|| TemplateSource::new(name)))
    }

    fn last_modified(&self, source: &TemplateSource) -> TemplateResult<i64> {
        Ok(self
            .templates
            .get(&source_key(source))
            .map(|(_, modified)| *modified)
            .unwrap_or(-1))
    }

    fn reader(&self, source: &TemplateSource, _encoding: &str) -> TemplateResult<PipeReader> {
        let name = source_key(source);
        let (content, _) = self
            .templates
            .get(&name)
            .ok_or(TemplateError::NotFound { name: name.clone() })?;
        Ok(PipeReader::from_text(content.clone()))
    }
}

fn source_key(source: &TemplateSource) -> String {
    source.path().to_string_lossy().into_owned()
}

/// Localized candidates for a template name, most specific first.
///
/// `index.html` with locale `en_US` gives `index_en_US.html`,
/// `index_en.html`, `index.html`. The suffix goes before the extension of
/// the last path segment.
pub fn localized_names(name: &str, locale: &Locale) -> Vec<String> {
    let segment_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (stem, extension) = match name[segment_start..].rfind('.') {
        Some(dot) => name.split_at(segment_start + dot),
        None => (name, ""),
    };
    locale
        .lookup_suffixes()
        .into_iter()
        .map(|suffix| format!("{}{}{}", stem, suffix, extension))
        .collect()
}

/// Normalize a template name: strip leading slashes, resolve `.` and `..`.
///
/// # Errors
/// Returns [`TemplateError::MalformedName`] for empty names and names that
/// climb above the loader root.
pub fn normalize_name(name: &str) -> TemplateResult<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(name.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().unwrap_or_default()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(TemplateError::MalformedName {
                        name: name.to_string(),
                    });
                }
            }
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    if parts.is_empty() {
        return Err(TemplateError::MalformedName {
            name: name.to_string(),
        });
    }
    Ok(parts.join("/"))
}

/// Resolve an include name against the name of the including template.
///
/// Absolute names (`/x.html`) are relative to the loader root, everything
/// else to the directory of the including template.
pub fn resolve_include_name(current: &str, include: &str) -> TemplateResult<String> {
    if include.starts_with('/') {
        return normalize_name(include);
    }
    match current.rfind('/') {
        Some(slash) => normalize_name(&format!("{}/{}", &current[..slash], include)),
        None => normalize_name(include),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_names() {
        let locale = Locale::for_language_tag("en-US");
        assert_eq!(
            localized_names("index.html", &locale),
            vec!["index_en_US.html", "index_en.html", "index.html"]
        );
    }

    #[test]
    fn test_localized_names_without_extension() {
        let locale = Locale::for_language_tag("de");
        assert_eq!(localized_names("partials/nav", &locale), vec![
            "partials/nav_de",
            "partials/nav"
        ]);
    }

    #[test]
    fn test_localized_names_dot_in_directory() {
        let locale = Locale::for_language_tag("fr");
        assert_eq!(localized_names("v1.2/page", &locale), vec![
            "v1.2/page_fr",
            "v1.2/page"
        ]);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("/a/./b/../c.html").unwrap(), "a/c.html");
        assert!(normalize_name("../x.html").is_err());
        assert!(normalize_name("").is_err());
    }

    #[test]
    fn test_resolve_include_name() {
        assert_eq!(
            resolve_include_name("pages/index.html", "header.html").unwrap(),
            "pages/header.html"
        );
        assert_eq!(
            resolve_include_name("pages/index.html", "/header.html").unwrap(),
            "header.html"
        );
        assert_eq!(
            resolve_include_name("index.html", "../header.html").map_err(|e| e.to_string()),
            Err("Malformed template name: ../header.html".to_string())
        );
    }

    #[tokio::test]
    async fn test_pipe_reads_until_closed() {
        let (writer, reader) = pipe();
        let task = tokio::spawn(async move {
            writer.write("Hello, ").unwrap();
            writer.write("world").unwrap();
            writer.close();
        });
        assert_eq!(reader.read_to_string().await, "Hello, world");
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_writer_gives_empty_text() {
        let (writer, reader) = pipe();
        drop(writer);
        assert_eq!(reader.read_to_string().await, "");
    }

    #[test]
    fn test_string_loader() {
        let loader = StringTemplateLoader::with_templates([("a.html", "A")]);
        assert!(loader.find_template_source("a.html").unwrap().is_some());
        assert!(loader.find_template_source("b.html").unwrap().is_none());
        let source = TemplateSource::new("a.html");
        assert!(loader.last_modified(&source).unwrap() > 0);
    }
}
