/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The build pipeline as seen from the loader.
//!
//! The loader runs inside a bundler that owns module loading, caching and
//! the dependency graph. [`BuildContext`] is the slice of that machinery
//! the loader consumes for one request. It is a trait so the pipeline can be
//! driven by the real bundler bridge, by [`crate::FsBuildContext`], or by a
//! test double.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use async_trait::async_trait;
use hashlink::LinkedHashSet;

use crate::error::{LoaderError, Result};
use crate::host::HostValue;

/// Result of a synchronous stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_file: bool,
    pub modified: SystemTime,
}

/// Per-request view of the build pipeline.
#[async_trait]
pub trait BuildContext: Send + Sync {
    /// Directory that relative template names resolve against.
    fn context(&self) -> &Path;

    /// Absolute path of the file this request is for.
    fn resource_path(&self) -> &Path;

    /// Resolve a request against a directory. An absolute request stands
    /// on its own.
    fn resolve_path(&self, base: &Path, request: &str) -> PathBuf {
        base.join(request)
    }

    /// Record a file the output depends on. Append-only.
    fn add_dependency(&self, path: &Path);

    /// Mark the result of this request as cacheable.
    fn cacheable(&self, flag: bool);

    /// Stat a file. Synchronous because the template loader surface is.
    fn stat(&self, path: &Path) -> std::io::Result<FileStat>;

    /// Read a file's bytes.
    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Load and execute a module through the pipeline, returning its export.
    async fn load_module(&self, request: &ModuleRequest) -> Result<HostValue>;

    /// Report an error that happened outside the main completion path.
    fn emit_error(&self, error: LoaderError);
}

/// A `!`-separated module request such as `!!loader-a!loader-b!/src/page.html`.
///
/// A leading `!!` disables the loaders configured for the resource, so only
/// the listed loaders apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    pub bypass_configured: bool,
    pub loaders: Vec<String>,
    pub resource: PathBuf,
}

impl ModuleRequest {
    /// Request a resource with only the given loaders applied.
    pub fn inline(loaders: impl IntoIterator<Item = String>, resource: impl Into<PathBuf>) -> Self {
        Self {
            bypass_configured: true,
            loaders: loaders.into_iter().collect(),
            resource: resource.into(),
        }
    }

    pub fn parse(request: &str) -> Result<Self> {
        let (bypass_configured, rest) = match request.strip_prefix("!!") {
            Some(rest) => (true, rest),
            None => (false, request.strip_prefix('!').unwrap_or(request)),
        };
        let mut parts: Vec<&str> = rest.split('!').collect();
        let resource = match parts.pop() {
            Some(resource) if !resource.is_empty() => resource,
            _ => {
                return Err(LoaderError::configuration(format!(
                    "Module request '{}' names no resource",
                    request
                )));
            }
        };
        if parts.iter().any(|loader| loader.is_empty()) {
            return Err(LoaderError::configuration(format!(
                "Module request '{}' contains an empty loader",
                request
            )));
        }
        Ok(Self {
            bypass_configured,
            loaders: parts.into_iter().map(String::from).collect(),
            resource: PathBuf::from(resource),
        })
    }
}

impl fmt::Display for ModuleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bypass_configured {
            write!(f, "!!")?;
        }
        for loader in &self.loaders {
            write!(f, "{}!", loader)?;
        }
        write!(f, "{}", self.resource.display())
    }
}

/// Process-wide, append-only set of dependency paths. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    paths: Arc<Mutex<LinkedHashSet<PathBuf>>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path. Returns `false` when it was already recorded.
    ///
    /// A path keeps the position of its first recording.
    pub fn add(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let mut paths = self.paths.lock().unwrap_or_else(PoisonError::into_inner);
        // `insert` would move an existing entry to the back.
        if paths.contains(&path) {
            return false;
        }
        paths.insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    /// Paths in the order they were first recorded.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_inline_request() {
        let request = ModuleRequest::parse("!!upper!trim!/src/page.html").unwrap();
        assert!(request.bypass_configured);
        assert_eq!(request.loaders, vec!["upper", "trim"]);
        assert_eq!(request.resource, PathBuf::from("/src/page.html"));
        assert_eq!(request.to_string(), "!!upper!trim!/src/page.html");
    }

    #[test]
    fn test_parse_plain_resource() {
        let request = ModuleRequest::parse("/src/data.json").unwrap();
        assert!(!request.bypass_configured);
        assert!(request.loaders.is_empty());
        assert_eq!(request.to_string(), "/src/data.json");
    }

    #[test]
    fn test_parse_rejects_missing_resource() {
        assert!(matches!(
            ModuleRequest::parse("!!upper!"),
            Err(LoaderError::Configuration(_))
        ));
        assert!(matches!(
            ModuleRequest::parse("a!!b"),
            Err(LoaderError::Configuration(_))
        ));
    }

    #[test]
    fn test_dependency_set_is_shared_and_ordered() {
        let deps = DependencySet::new();
        let other = deps.clone();
        assert!(deps.add("/b"));
        assert!(other.add("/a"));
        assert!(!deps.add("/b"));
        assert!(!other.add("/b"));
        assert_eq!(other.paths(), vec![PathBuf::from("/b"), PathBuf::from("/a")]);
        assert!(deps.contains(Path::new("/a")));
        assert_eq!(deps.len(), 2);
    }
}
