/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration and template cache.
//!
//! A [`Configuration`] owns the settings templates are processed with, the
//! [`TemplateLoader`] they are read through, and a cache of compiled
//! templates keyed by name and locale. Cached entries are revalidated
//! against the loader's modification time on every lookup.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use hashlink::LinkedHashMap;

use crate::error::{TemplateError, TemplateResult};
use crate::loader::{TemplateLoader, localized_names, normalize_name, resolve_include_name};
use crate::locale::Locale;
use crate::model::ModelRef;
use crate::object::ObjectValue;
use crate::output_format::OutputFormat;
use crate::parser::Template;

/// Maximum include nesting depth.
pub const MAX_INCLUDE_DEPTH: usize = 50;

/// What happens when an expression fails during processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateExceptionHandler {
    /// Propagate the error.
    #[default]
    Rethrow,
    /// Write a diagnostic into the output, then propagate the error.
    Debug,
    /// Skip the failing statement and continue.
    Ignore,
}

/// Settings a template is processed with, captured when it is loaded.
#[derive(Debug, Clone)]
pub(crate) struct TemplateSettings {
    pub(crate) output_format: OutputFormat,
    pub(crate) locale: Locale,
    pub(crate) exception_handler: TemplateExceptionHandler,
    pub(crate) log_template_exceptions: bool,
    pub(crate) shared_variables: LinkedHashMap<String, ModelRef>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Undefined,
            locale: Locale::default_locale(),
            exception_handler: TemplateExceptionHandler::Rethrow,
            log_template_exceptions: true,
            shared_variables: LinkedHashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    locale: Locale,
}

struct CachedTemplate {
    source_name: String,
    last_modified: i64,
    template: Arc<Template>,
}

type LoadFuture<'a> = Pin<Box<dyn Future<Output = TemplateResult<Arc<Template>>> + Send + 'a>>;

/// Engine configuration.
pub struct Configuration {
    default_encoding: String,
    localized_lookup: bool,
    settings: Arc<TemplateSettings>,
    loader: Option<Arc<dyn TemplateLoader>>,
    cache: Mutex<HashMap<CacheKey, CachedTemplate>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("default_encoding", &self.default_encoding)
            .field("localized_lookup", &self.localized_lookup)
            .field("settings", &self.settings)
            .field("has_loader", &self.loader.is_some())
            .finish_non_exhaustive()
    }
}

impl Configuration {
    pub fn new() -> Self {
        Self {
            default_encoding: "utf-8".to_string(),
            localized_lookup: true,
            settings: Arc::new(TemplateSettings::default()),
            loader: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Encoding passed to [`TemplateLoader::reader`].
    pub fn set_default_encoding(&mut self, encoding: impl Into<String>) {
        self.default_encoding = encoding.into();
        self.clear_template_cache();
    }

    pub fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.settings_mut().locale = locale;
    }

    pub fn locale(&self) -> &Locale {
        &self.settings.locale
    }

    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.settings_mut().output_format = format;
    }

    pub fn output_format(&self) -> OutputFormat {
        self.settings.output_format
    }

    pub fn set_template_exception_handler(&mut self, handler: TemplateExceptionHandler) {
        self.settings_mut().exception_handler = handler;
    }

    pub fn template_exception_handler(&self) -> TemplateExceptionHandler {
        self.settings.exception_handler
    }

    /// Whether failing expressions are logged before the exception handler
    /// runs.
    pub fn set_log_template_exceptions(&mut self, log: bool) {
        self.settings_mut().log_template_exceptions = log;
    }

    pub fn log_template_exceptions(&self) -> bool {
        self.settings.log_template_exceptions
    }

    pub fn set_template_loader(&mut self, loader: Arc<dyn TemplateLoader>) {
        self.loader = Some(loader);
        self.clear_template_cache();
    }

    /// Enable or disable localized lookup (`index_en_US.html`,
    /// `index_en.html`, `index.html`). Enabled by default.
    pub fn set_localized_lookup(&mut self, enabled: bool) {
        self.localized_lookup = enabled;
        self.clear_template_cache();
    }

    pub fn localized_lookup(&self) -> bool {
        self.localized_lookup
    }

    /// Make a value visible to every template processed with this
    /// configuration. Data-model variables of the same name take precedence.
    pub fn set_shared_variable(&mut self, name: impl Into<String>, value: ObjectValue) {
        let model = value.to_model();
        self.settings_mut()
            .shared_variables
            .insert(name.into(), model);
    }

    pub fn shared_variable(&self, name: &str) -> Option<ModelRef> {
        self.settings.shared_variables.get(name).cloned()
    }

    /// Drop all cached templates.
    pub fn clear_template_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn settings_mut(&mut self) -> &mut TemplateSettings {
        // Templates loaded so far keep the settings they were loaded with.
        self.clear_template_cache();
        Arc::make_mut(&mut self.settings)
    }

    /// Get a template for the configured locale.
    ///
    /// Includes are loaded and resolved as part of the call.
    pub async fn get_template(&self, name: &str) -> TemplateResult<Arc<Template>> {
        let locale = self.settings.locale.clone();
        self.get_template_with_locale(name, &locale).await
    }

    /// Get a template for a specific locale.
    pub async fn get_template_with_locale(
        &self,
        name: &str,
        locale: &Locale,
    ) -> TemplateResult<Arc<Template>> {
        let mut stack = Vec::new();
        self.load(name.to_string(), locale, &mut stack).await
    }

    fn load<'a>(
        &'a self,
        name: String,
        locale: &'a Locale,
        stack: &'a mut Vec<String>,
    ) -> LoadFuture<'a> {
        Box::pin(async move {
            let loader = self.loader.as_ref().ok_or(TemplateError::NoLoader)?;
            let name = normalize_name(&name)?;
            if stack.contains(&name) || stack.len() >= MAX_INCLUDE_DEPTH {
                return Err(TemplateError::RecursiveInclude {
                    name,
                    max_depth: MAX_INCLUDE_DEPTH,
                });
            }

            let candidates = if self.localized_lookup {
                localized_names(&name, locale)
            } else {
                vec![name.clone()]
            };
            let mut found = None;
            for candidate in candidates {
                if let Some(source) = loader.find_template_source(&candidate)? {
                    found = Some((candidate, source));
                    break;
                }
            }
            let (source_name, source) =
                found.ok_or_else(|| TemplateError::NotFound { name: name.clone() })?;

            let last_modified = match loader.last_modified(&source) {
                Ok(modified) => modified,
                Err(e) => {
                    loader.close_template_source(&source);
                    return Err(e);
                }
            };
            let key = CacheKey {
                name: name.clone(),
                locale: locale.clone(),
            };
            if let Some(template) = self.cached(&key, &source_name, last_modified) {
                tracing::debug!(template = %name, source = %source_name, "template cache hit");
                loader.close_template_source(&source);
                return Ok(template);
            }

            let reader = loader.reader(&source, &self.default_encoding);
            let text = match reader {
                Ok(reader) => reader.read_to_string().await,
                Err(e) => {
                    loader.close_template_source(&source);
                    return Err(e);
                }
            };
            loader.close_template_source(&source);
            tracing::debug!(template = %name, source = %source_name, bytes = text.len(), "loaded template");

            let mut template = Template::compile_with_name(&text, &name)?;
            template.source_name = source_name.clone();
            template.locale = Some(locale.clone());
            template.settings = Arc::clone(&self.settings);

            stack.push(name.clone());
            let resolved = self.resolve_includes(&mut template, locale, stack).await;
            stack.pop();
            resolved?;

            let template = Arc::new(template);
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(key, CachedTemplate {
                    source_name,
                    last_modified,
                    template: Arc::clone(&template),
                });
            }
            Ok(template)
        })
    }

    async fn resolve_includes(
        &self,
        template: &mut Template,
        locale: &Locale,
        stack: &mut Vec<String>,
    ) -> TemplateResult<()> {
        let current = template.name.clone();
        for include in template.includes_mut() {
            let target = resolve_include_name(&current, &include.name)?;
            include.resolved = Some(self.load(target, locale, stack).await?);
        }
        Ok(())
    }

    fn cached(&self, key: &CacheKey, source_name: &str, last_modified: i64) -> Option<Arc<Template>> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.get(key)?;
        (entry.source_name == source_name && entry.last_modified == last_modified)
            .then(|| Arc::clone(&entry.template))
    }
}
