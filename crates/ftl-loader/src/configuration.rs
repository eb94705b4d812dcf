/*
 * configuration.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Per-request engine configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ftl_engine::{Configuration, Locale, OutputFormat, TemplateExceptionHandler};
use hashlink::LinkedHashMap;

use crate::adapter::unwrap_simple;
use crate::build::BuildContext;
use crate::error::Result;
use crate::host::HostValue;
use crate::options::LoaderOptions;
use crate::source::VirtualTemplateSource;

/// Build a fresh configuration for one render request.
///
/// The template loader is a [`VirtualTemplateSource`] over `ctx`, resolving
/// template names against `base_directory`. Errors are written into the
/// output as diagnostics and rethrown; the engine does not log them itself.
///
/// # Errors
/// Returns a binding error when a shared variable cannot be converted.
pub fn build_configuration(
    options: &LoaderOptions,
    ctx: Arc<dyn BuildContext>,
    base_directory: PathBuf,
    resource_loaders: Vec<String>,
    shared_variables: &LinkedHashMap<String, HostValue>,
) -> Result<Configuration> {
    let mut config = Configuration::new();
    config.set_default_encoding(options.encoding.as_deref().unwrap_or("utf-8"));
    config.set_locale(locale(options));
    config.set_output_format(output_format(options, ctx.resource_path()));
    config.set_log_template_exceptions(false);
    config.set_template_exception_handler(TemplateExceptionHandler::Debug);

    for (name, value) in shared_variables {
        config.set_shared_variable(name.clone(), unwrap_simple(value)?);
    }

    config.set_template_loader(Arc::new(VirtualTemplateSource::new(
        ctx,
        base_directory,
        resource_loaders,
    )));
    Ok(config)
}

/// The `locale` option with `_` read as `-`, else the process default.
pub fn locale(options: &LoaderOptions) -> Locale {
    match options.locale.as_deref() {
        Some(tag) if !tag.is_empty() => Locale::for_language_tag(&tag.replace('_', "-")),
        _ => Locale::default_locale(),
    }
}

/// The `format` option, else the resource extension. Unknown names select
/// [`OutputFormat::Undefined`].
pub fn output_format(options: &LoaderOptions, resource_path: &Path) -> OutputFormat {
    let name = options
        .format
        .as_deref()
        .or_else(|| resource_path.extension().and_then(|ext| ext.to_str()))
        .unwrap_or_default();
    OutputFormat::from_name(name).unwrap_or(OutputFormat::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_context::FsBuildContext;
    use pretty_assertions::assert_eq;

    fn options(locale: Option<&str>, format: Option<&str>) -> LoaderOptions {
        LoaderOptions {
            locale: locale.map(String::from),
            format: format.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_locale_underscore_equals_hyphen() {
        let underscore = locale(&options(Some("en_US"), None));
        let hyphen = locale(&options(Some("en-US"), None));
        assert_eq!(underscore, hyphen);
        assert_eq!(underscore.to_string(), "en_US");
    }

    #[test]
    fn test_locale_defaults_to_runtime() {
        assert_eq!(locale(&options(None, None)), Locale::default_locale());
    }

    #[test]
    fn test_output_format_from_extension() {
        let none = options(None, None);
        assert_eq!(output_format(&none, Path::new("/s/page.html")), OutputFormat::Html);
        assert_eq!(output_format(&none, Path::new("/s/page.tpl")), OutputFormat::Undefined);
        assert_eq!(output_format(&none, Path::new("/s/Makefile")), OutputFormat::Undefined);
    }

    #[test]
    fn test_output_format_option_wins() {
        let xml = options(None, Some("xml"));
        assert_eq!(output_format(&xml, Path::new("/s/page.html")), OutputFormat::Xml);
        let unknown = options(None, Some("markdown"));
        assert_eq!(output_format(&unknown, Path::new("/s/page.html")), OutputFormat::Undefined);
    }

    #[test]
    fn test_build_installs_fixed_policy() {
        let ctx: Arc<dyn BuildContext> = Arc::new(FsBuildContext::new("/srv", "site/index.html"));
        let mut shared = LinkedHashMap::new();
        shared.insert("site".to_string(), HostValue::string("Docs"));

        let config = build_configuration(
            &options(Some("de_DE"), None),
            ctx,
            PathBuf::from("/srv"),
            Vec::new(),
            &shared,
        )
        .unwrap();
        assert_eq!(config.template_exception_handler(), TemplateExceptionHandler::Debug);
        assert!(!config.log_template_exceptions());
        assert_eq!(config.output_format(), OutputFormat::Html);
        assert_eq!(config.locale().to_string(), "de_DE");
        assert_eq!(config.default_encoding(), "utf-8");
        assert_eq!(
            config.shared_variable("site").and_then(|m| m.as_scalar().map(String::from)),
            Some("Docs".to_string())
        );
    }

    #[test]
    fn test_unconvertible_shared_variable_fails() {
        let ctx: Arc<dyn BuildContext> = Arc::new(FsBuildContext::new("/srv", "index.html"));
        let mut shared = LinkedHashMap::new();
        shared.insert(
            "f".to_string(),
            HostValue::function("f", 3, |_, _| Ok(HostValue::Null)),
        );
        let err = build_configuration(
            &options(None, None),
            ctx,
            PathBuf::from("/srv"),
            Vec::new(),
            &shared,
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::LoaderError::Binding(_)));
    }
}
