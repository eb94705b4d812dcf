/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template loader backed by the build pipeline.
//!
//! The engine asks for template text synchronously, but bytes come from the
//! build pipeline asynchronously. [`VirtualTemplateSource::reader`] therefore
//! hands back the reading end of a pipe at once and fills the writing end
//! from a spawned task. Failures of that task are reported through
//! [`BuildContext::emit_error`]; the reader then just sees end-of-input.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ftl_engine::{PipeReader, TemplateError, TemplateLoader, TemplateResult, TemplateSource, pipe};

use crate::adapter::long_from_system_time;
use crate::build::{BuildContext, ModuleRequest};
use crate::error::LoaderError;
use crate::host::HostValue;

pub struct VirtualTemplateSource {
    ctx: Arc<dyn BuildContext>,
    base: PathBuf,
    resource_loaders: Vec<String>,
}

impl std::fmt::Debug for VirtualTemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualTemplateSource")
            .field("base", &self.base)
            .field("resource_loaders", &self.resource_loaders)
            .finish()
    }
}

impl VirtualTemplateSource {
    /// Template names resolve against `base`. With no `resource_loaders`,
    /// template files are read directly. Otherwise every template is loaded
    /// as a module through those loaders, so nested templates get the same
    /// transforms as the entry file.
    pub fn new(ctx: Arc<dyn BuildContext>, base: PathBuf, resource_loaders: Vec<String>) -> Self {
        Self {
            ctx,
            base,
            resource_loaders,
        }
    }
}

impl TemplateLoader for VirtualTemplateSource {
    fn find_template_source(&self, name: &str) -> TemplateResult<Option<TemplateSource>> {
        let path = self.ctx.resolve_path(&self.base, name);
        // Recorded even when missing so that creating the file later
        // invalidates the build.
        self.ctx.add_dependency(&path);

        match self.ctx.stat(&path) {
            Ok(stat) if stat.is_file => Ok(Some(TemplateSource::new(path))),
            _ => Ok(None),
        }
    }

    fn last_modified(&self, source: &TemplateSource) -> TemplateResult<i64> {
        let stat = self.ctx.stat(source.path())?;
        Ok(long_from_system_time(stat.modified))
    }

    fn reader(&self, source: &TemplateSource, encoding: &str) -> TemplateResult<PipeReader> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TemplateError::Io(std::io::Error::other(e)))?;

        let (writer, reader) = pipe();
        let ctx = Arc::clone(&self.ctx);
        let loaders = self.resource_loaders.clone();
        let path = source.path().to_path_buf();
        let encoding = encoding.to_string();

        runtime.spawn(async move {
            let filled = fill(ctx.as_ref(), &loaders, &path, &encoding)
                .await
                .and_then(|text| writer.write(text).map_err(|e| e.to_string()));
            if let Err(message) = filled {
                tracing::warn!(path = %path.display(), %message, "Template fill failed");
                ctx.emit_error(LoaderError::BackgroundFill { path, message });
            }
            writer.close();
        });

        Ok(reader)
    }

    fn close_template_source(&self, _source: &TemplateSource) {}
}

async fn fill(
    ctx: &dyn BuildContext,
    loaders: &[String],
    path: &Path,
    encoding: &str,
) -> Result<String, String> {
    if loaders.is_empty() {
        let bytes = ctx.read_file(path).await.map_err(|e| e.to_string())?;
        return decode(bytes, encoding);
    }

    let request = ModuleRequest::inline(loaders.iter().cloned(), PathBuf::from(path));
    match ctx.load_module(&request).await.map_err(|e| e.to_string())? {
        HostValue::String(text) => Ok(text.to_string()),
        other => Err(format!(
            "Module {} produced {} instead of template text",
            request,
            other.type_name()
        )),
    }
}

fn decode(bytes: Vec<u8>, encoding: &str) -> Result<String, String> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes).map_err(|e| e.to_string()),
        "iso-8859-1" | "latin1" => Ok(bytes.into_iter().map(char::from).collect()),
        other => Err(format!("Unsupported encoding: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::FileStat;
    use crate::fs_context::FsBuildContext;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// Resolves `~/` requests against a fixed directory.
    struct AliasContext {
        inner: FsBuildContext,
        home: PathBuf,
    }

    #[async_trait]
    impl BuildContext for AliasContext {
        fn context(&self) -> &Path {
            self.inner.context()
        }

        fn resource_path(&self) -> &Path {
            self.inner.resource_path()
        }

        fn resolve_path(&self, base: &Path, request: &str) -> PathBuf {
            match request.strip_prefix("~/") {
                Some(rest) => self.home.join(rest),
                None => base.join(request),
            }
        }

        fn add_dependency(&self, path: &Path) {
            self.inner.add_dependency(path);
        }

        fn cacheable(&self, flag: bool) {
            self.inner.cacheable(flag);
        }

        fn stat(&self, path: &Path) -> std::io::Result<FileStat> {
            self.inner.stat(path)
        }

        async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.inner.read_file(path).await
        }

        async fn load_module(&self, request: &ModuleRequest) -> crate::error::Result<HostValue> {
            self.inner.load_module(request).await
        }

        fn emit_error(&self, error: LoaderError) {
            self.inner.emit_error(error);
        }
    }

    fn setup() -> (TempDir, Arc<FsBuildContext>) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.html"), "<p>${x}</p>").unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        let ctx = Arc::new(
            FsBuildContext::new(dir.path(), "page.html")
                .with_transform("shout", |s| Ok(s.to_uppercase())),
        );
        (dir, ctx)
    }

    #[test]
    fn test_locate_records_dependency_even_when_missing() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx.clone(), dir.path().to_path_buf(), Vec::new());

        assert!(source.find_template_source("missing.html").unwrap().is_none());
        assert!(source.find_template_source("partials").unwrap().is_none());
        let found = source.find_template_source("page.html").unwrap().unwrap();
        assert_eq!(found.path(), dir.path().join("page.html"));

        assert_eq!(
            ctx.dependencies().paths(),
            vec![
                dir.path().join("missing.html"),
                dir.path().join("partials"),
                dir.path().join("page.html"),
            ]
        );
    }

    #[test]
    fn test_names_resolve_through_build_context() {
        let (dir, _) = setup();
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join("shared.html"), "shared").unwrap();
        let ctx = Arc::new(AliasContext {
            inner: FsBuildContext::new(dir.path(), "page.html"),
            home: home.path().to_path_buf(),
        });
        let source = VirtualTemplateSource::new(ctx.clone(), dir.path().to_path_buf(), Vec::new());

        let found = source.find_template_source("~/shared.html").unwrap().unwrap();
        assert_eq!(found.path(), home.path().join("shared.html"));
        assert!(source.find_template_source("page.html").unwrap().is_some());
        assert_eq!(
            ctx.inner.dependencies().paths(),
            vec![home.path().join("shared.html"), dir.path().join("page.html")]
        );
    }

    #[test]
    fn test_last_modified_matches_stat() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx, dir.path().to_path_buf(), Vec::new());
        let found = TemplateSource::new(dir.path().join("page.html"));
        let expected = long_from_system_time(
            std::fs::metadata(dir.path().join("page.html")).unwrap().modified().unwrap(),
        );
        assert_eq!(source.last_modified(&found).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_reader_reads_file() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx, dir.path().to_path_buf(), Vec::new());
        let reader = source
            .reader(&TemplateSource::new(dir.path().join("page.html")), "UTF-8")
            .unwrap();
        assert_eq!(reader.read_to_string().await, "<p>${x}</p>");
    }

    #[tokio::test]
    async fn test_reader_goes_through_resource_loaders() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx, dir.path().to_path_buf(), vec!["shout".to_string()]);
        let reader = source
            .reader(&TemplateSource::new(dir.path().join("page.html")), "utf-8")
            .unwrap();
        assert_eq!(reader.read_to_string().await, "<P>${X}</P>");
    }

    #[tokio::test]
    async fn test_fill_failure_goes_to_error_channel() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx.clone(), dir.path().to_path_buf(), Vec::new());
        let reader = source
            .reader(&TemplateSource::new(dir.path().join("gone.html")), "utf-8")
            .unwrap();
        assert_eq!(reader.read_to_string().await, "");

        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            LoaderError::BackgroundFill { path, .. } if path == &dir.path().join("gone.html")
        ));
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode(vec![0x63, 0x61, 0x66, 0xe9], "ISO-8859-1").unwrap(), "café");
        assert!(decode(vec![0xe9], "utf-8").is_err());
        assert!(decode(Vec::new(), "ebcdic").is_err());
    }

    #[test]
    fn test_reader_outside_runtime_is_an_error() {
        let (dir, ctx) = setup();
        let source = VirtualTemplateSource::new(ctx, dir.path().to_path_buf(), Vec::new());
        let err = source
            .reader(&TemplateSource::new(dir.path().join("page.html")), "utf-8")
            .unwrap_err();
        assert!(matches!(err, TemplateError::Io(_)));
    }
}
