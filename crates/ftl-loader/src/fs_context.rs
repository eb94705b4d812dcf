/*
 * fs_context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Filesystem-backed build context.
//!
//! Stands in for the bundler when the loader runs outside of one: modules are
//! files, loaders are named string transforms, and executing a module means
//! parsing `.json` files as data and returning everything else as text.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use hashlink::LinkedHashMap;

use crate::build::{BuildContext, DependencySet, FileStat, ModuleRequest};
use crate::error::{HostError, LoaderError, Result};
use crate::host::HostValue;

/// A named source transform, the counterpart of a bundler loader.
pub type SourceTransform = Arc<dyn Fn(String) -> std::result::Result<String, HostError> + Send + Sync>;

pub struct FsBuildContext {
    context: PathBuf,
    resource_path: PathBuf,
    dependencies: DependencySet,
    transforms: LinkedHashMap<String, SourceTransform>,
    configured: Vec<String>,
    cacheable: AtomicBool,
    errors: Mutex<Vec<LoaderError>>,
}

impl std::fmt::Debug for FsBuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBuildContext")
            .field("context", &self.context)
            .field("resource_path", &self.resource_path)
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

impl FsBuildContext {
    /// Create a context for `resource_path`, resolving names against
    /// `context`. Relative resource paths are taken relative to `context`.
    pub fn new(context: impl Into<PathBuf>, resource_path: impl AsRef<Path>) -> Self {
        let context = context.into();
        let resource_path = context.join(resource_path);
        Self {
            context,
            resource_path,
            dependencies: DependencySet::new(),
            transforms: LinkedHashMap::new(),
            configured: Vec::new(),
            cacheable: AtomicBool::new(false),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Record dependencies into a set shared with other contexts.
    pub fn with_dependencies(mut self, dependencies: DependencySet) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Register a named transform.
    pub fn with_transform(
        mut self,
        name: impl Into<String>,
        transform: impl Fn(String) -> std::result::Result<String, HostError> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    /// Transforms applied to every module request that does not start with
    /// `!!`, in request order.
    pub fn with_configured_loaders(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.configured = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable.load(Ordering::SeqCst)
    }

    /// Drain the errors reported through [`BuildContext::emit_error`].
    pub fn take_errors(&self) -> Vec<LoaderError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn apply_transforms(&self, request: &ModuleRequest, mut source: String) -> Result<String> {
        let configured = if request.bypass_configured {
            &[][..]
        } else {
            &self.configured[..]
        };
        // Loader chains run right to left.
        for name in configured.iter().chain(request.loaders.iter()).rev() {
            let transform = self.transforms.get(name).ok_or_else(|| {
                LoaderError::module(request, format!("Loader '{}' is not registered", name))
            })?;
            source = transform(source).map_err(|e| LoaderError::module(request, e.to_string()))?;
        }
        Ok(source)
    }
}

#[async_trait]
impl BuildContext for FsBuildContext {
    fn context(&self) -> &Path {
        &self.context
    }

    fn resource_path(&self) -> &Path {
        &self.resource_path
    }

    fn add_dependency(&self, path: &Path) {
        if self.dependencies.add(path) {
            tracing::debug!(path = %path.display(), "Added dependency");
        }
    }

    fn cacheable(&self, flag: bool) {
        self.cacheable.store(flag, Ordering::SeqCst);
    }

    fn stat(&self, path: &Path) -> std::io::Result<FileStat> {
        let metadata = std::fs::metadata(path)?;
        Ok(FileStat {
            is_file: metadata.is_file(),
            modified: metadata.modified()?,
        })
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn load_module(&self, request: &ModuleRequest) -> Result<HostValue> {
        let path = self.context.join(&request.resource);
        self.add_dependency(&path);

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| LoaderError::module(request, e.to_string()))?;
        let source = String::from_utf8(bytes)
            .map_err(|e| LoaderError::module(request, e.to_string()))?;
        let source = self.apply_transforms(request, source)?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            let value: serde_json::Value = serde_json::from_str(&source)
                .map_err(|e| LoaderError::module(request, e.to_string()))?;
            Ok(HostValue::from_json(&value))
        } else {
            Ok(HostValue::string(source))
        }
    }

    fn emit_error(&self, error: LoaderError) {
        tracing::warn!(error = %error, "Build error reported");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"a": [1, 2]}"#).unwrap();
        std::fs::write(dir.path().join("page.html"), "  Hello  ").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_json_module_is_data() {
        let dir = setup();
        let ctx = FsBuildContext::new(dir.path(), "page.html");
        let value = ctx
            .load_module(&ModuleRequest::parse("data.json").unwrap())
            .await
            .unwrap();
        assert_eq!(format!("{:?}", value), r#"{"a": [1, 2]}"#);
        assert!(ctx.dependencies().contains(&dir.path().join("data.json")));
    }

    #[tokio::test]
    async fn test_transforms_run_right_to_left() {
        let dir = setup();
        let ctx = FsBuildContext::new(dir.path(), "page.html")
            .with_transform("trim", |s| Ok(s.trim().to_string()))
            .with_transform("wrap", |s| Ok(format!("[{}]", s)));
        let value = ctx
            .load_module(&ModuleRequest::parse("!!wrap!trim!page.html").unwrap())
            .await
            .unwrap();
        assert!(value.same_value(&HostValue::string("[Hello]")));
    }

    #[tokio::test]
    async fn test_configured_loaders_are_bypassed() {
        let dir = setup();
        let ctx = FsBuildContext::new(dir.path(), "page.html")
            .with_transform("upper", |s| Ok(s.to_uppercase()))
            .with_configured_loaders(["upper"]);

        let configured = ctx
            .load_module(&ModuleRequest::parse("page.html").unwrap())
            .await
            .unwrap();
        assert!(configured.same_value(&HostValue::string("  HELLO  ")));

        let bypassed = ctx
            .load_module(&ModuleRequest::parse("!!page.html").unwrap())
            .await
            .unwrap();
        assert!(bypassed.same_value(&HostValue::string("  Hello  ")));
    }

    #[tokio::test]
    async fn test_unknown_loader_is_module_error() {
        let dir = setup();
        let ctx = FsBuildContext::new(dir.path(), "page.html");
        let err = ctx
            .load_module(&ModuleRequest::parse("!!missing!page.html").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Module { .. }));
    }

    #[test]
    fn test_emitted_errors_are_collected() {
        let ctx = FsBuildContext::new("/tmp", "x.html");
        ctx.emit_error(LoaderError::configuration("late"));
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(ctx.take_errors().is_empty());
    }
}
