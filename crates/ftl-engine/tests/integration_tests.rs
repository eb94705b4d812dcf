/*
 * integration_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for ftl-engine using test fixtures.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ftl_engine::model;
use ftl_engine::{
    Configuration, Locale, ModelRef, ObjectValue, OutputFormat, PipeReader, TemplateError,
    TemplateExceptionHandler, TemplateLoader, TemplateResult, TemplateSource,
};

/// Loader over a directory on disk, the way an embedding application
/// would supply one.
struct DirLoader {
    root: PathBuf,
}

impl TemplateLoader for DirLoader {
    fn find_template_source(&self, name: &str) -> TemplateResult<Option<TemplateSource>> {
        let path = self.root.join(name);
        Ok(path.is_file().then(|| TemplateSource::new(path)))
    }

    fn last_modified(&self, source: &TemplateSource) -> TemplateResult<i64> {
        let modified = std::fs::metadata(source.path())?.modified()?;
        Ok(modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(-1))
    }

    fn reader(&self, source: &TemplateSource, _encoding: &str) -> TemplateResult<PipeReader> {
        Ok(PipeReader::from_text(std::fs::read_to_string(source.path())?))
    }
}

/// Helper to get the path to test fixtures
fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-fixtures")
}

fn config(locale: &str) -> Configuration {
    let mut config = Configuration::new();
    config.set_locale(Locale::for_language_tag(locale));
    config.set_template_loader(Arc::new(DirLoader {
        root: fixture_dir(),
    }));
    config
}

async fn render(config: &Configuration, name: &str, root: ModelRef) -> TemplateResult<String> {
    config.get_template(name).await?.render(&root)
}

#[tokio::test]
async fn test_simple_interpolation() {
    let root = model::hash([("name", model::scalar("World"))]);
    let result = render(&config("en-US"), "simple.ftl", root).await.unwrap();
    assert_eq!(result, "Hello, World!");
}

#[tokio::test]
async fn test_localized_variant_is_used() {
    let root = model::hash([("name", model::scalar("Welt"))]);
    let result = render(&config("de-DE"), "simple.ftl", root).await.unwrap();
    assert_eq!(result, "Hallo, Welt!");
}

#[tokio::test]
async fn test_conditional() {
    let config = config("en-US");
    for (show, expected) in [(true, "Hello, Alice!"), (false, "Goodbye.")] {
        let root = model::hash([
            ("show_greeting", model::boolean(show)),
            ("name", model::scalar("Alice")),
        ]);
        assert_eq!(render(&config, "conditional.ftl", root).await.unwrap(), expected);
    }
}

#[tokio::test]
async fn test_list_with_separator() {
    let root = model::hash([(
        "items",
        model::sequence(["a", "b", "c"].map(model::scalar)),
    )]);
    let result = render(&config("en-US"), "list.ftl", root).await.unwrap();
    assert_eq!(result, "a, b, c");
}

#[tokio::test]
async fn test_include_runs_in_including_environment() {
    let root = model::hash([
        ("title", model::scalar("Home")),
        ("body", model::scalar("content")),
    ]);
    let result = render(&config("en-US"), "page.ftl", root).await.unwrap();
    assert_eq!(result, "<header>Home</header>\n<main>content</main>\n");
}

#[tokio::test]
async fn test_missing_include_fails_to_load() {
    let err = config("en-US")
        .get_template("broken_include.ftl")
        .await
        .unwrap_err();
    assert!(matches!(err, TemplateError::NotFound { ref name } if name == "partials/missing.ftl"));
}

#[tokio::test]
async fn test_shared_variables_and_output_format() {
    let mut config = config("en-US");
    config.set_output_format(OutputFormat::Html);
    config.set_shared_variable("name", ObjectValue::String("shared".to_string()));

    let template = config.get_template("simple.ftl").await.unwrap();
    let result = template.render(&model::hash::<&str>([])).unwrap();
    assert_eq!(result, "Hello, shared!");
}

#[tokio::test]
async fn test_ignore_handler_skips_failing_interpolation() {
    let mut config = config("en-US");
    config.set_template_exception_handler(TemplateExceptionHandler::Ignore);
    config.set_log_template_exceptions(false);

    let template = config.get_template("simple.ftl").await.unwrap();
    let result = template.render(&model::hash::<&str>([])).unwrap();
    assert_eq!(result, "Hello, !");
}

#[tokio::test]
async fn test_rethrow_handler_reports_location() {
    let template = config("en-US").get_template("simple.ftl").await.unwrap();
    let err = template.render(&model::hash::<&str>([])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Evaluation error in simple.ftl at line 1, column 8: \
         The following has evaluated to null or missing: name"
    );
}
