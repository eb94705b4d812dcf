/*
 * pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render pipeline.
//!
//! The loader runs in the pitching phase of the bundler: it receives the
//! remaining request (the loaders still to run, then the resource) and
//! produces the rendered output without the later loaders running.
//!
//! ## Pipeline Stages
//!
//! 1. **Check request**: the remaining request must end with the resource
//!    path; the other entries are the resource loaders nested templates are
//!    loaded through
//! 2. **Configure**: start the engine runtime and build a fresh
//!    configuration (see [`crate::build_configuration`])
//! 3. **Resolve template**: localized lookup plus includes, recording every
//!    candidate path as a dependency
//! 4. **Bind data**: load the data module and wrap its export
//! 5. **Render**: process into a fresh writer and take its text
//! 6. **Deliver**: hand the result to the single-shot [`Completion`]
//!
//! Every stage short-circuits on its first error. Nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ftl_engine::StringWriter;
use hashlink::LinkedHashMap;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::adapter::wrap_root;
use crate::build::{BuildContext, ModuleRequest};
use crate::configuration::build_configuration;
use crate::error::{LoaderError, Result};
use crate::host::HostValue;
use crate::options::LoaderOptions;
use crate::runtime::EngineRuntime;

type CompletionFn = Box<dyn FnOnce(Result<String>) + Send>;

/// The bundler's completion callback. May be invoked once.
pub struct Completion {
    callback: Mutex<Option<CompletionFn>>,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Completion {
    pub fn new(callback: impl FnOnce(Result<String>) + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// A completion that forwards its result into a channel.
    pub fn channel() -> (Self, oneshot::Receiver<Result<String>>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(move |result| {
            // A dropped receiver means nobody waits for the result.
            let _ = tx.send(result);
        });
        (completion, rx)
    }

    /// Deliver the result.
    ///
    /// # Errors
    /// [`LoaderError::AlreadyCompleted`] on every call after the first.
    pub fn complete(&self, result: Result<String>) -> Result<()> {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match callback {
            Some(callback) => {
                callback(result);
                Ok(())
            }
            None => Err(LoaderError::AlreadyCompleted),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// The template loader as a bundler plugin.
#[derive(Debug)]
pub struct FtlLoader {
    runtime: Arc<EngineRuntime>,
    shared_variables: LinkedHashMap<String, HostValue>,
}

impl Default for FtlLoader {
    fn default() -> Self {
        Self::new(EngineRuntime::shared())
    }
}

impl FtlLoader {
    pub fn new(runtime: Arc<EngineRuntime>) -> Self {
        Self {
            runtime,
            shared_variables: LinkedHashMap::new(),
        }
    }

    /// Add a variable visible to every template, converted once per request.
    pub fn with_shared_variable(mut self, name: impl Into<String>, value: HostValue) -> Self {
        self.shared_variables.insert(name.into(), value);
        self
    }

    pub fn runtime(&self) -> &Arc<EngineRuntime> {
        &self.runtime
    }

    /// Normal-phase entry point. Always fails: the loader only pitches.
    pub fn run(&self, _source: &str) -> Result<String> {
        Err(LoaderError::configuration(
            "This is a pitching loader; it cannot run in the normal phase",
        ))
    }

    /// Pitching-phase entry point: render and deliver the result through
    /// `completion`.
    ///
    /// # Errors
    /// Only [`LoaderError::AlreadyCompleted`], when `completion` had already
    /// been used. Render failures go to the completion.
    pub async fn pitch(
        &self,
        ctx: Arc<dyn BuildContext>,
        remaining_request: &str,
        options: &LoaderOptions,
        completion: &Completion,
    ) -> Result<()> {
        let result = self.render(ctx, remaining_request, options).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Render failed");
        }
        completion.complete(result)
    }

    /// Run the pipeline and return the rendered text.
    pub async fn render(
        &self,
        ctx: Arc<dyn BuildContext>,
        remaining_request: &str,
        options: &LoaderOptions,
    ) -> Result<String> {
        let resource_loaders = resource_loaders(remaining_request, ctx.resource_path())?;
        let base_directory = base_directory(options, ctx.context());
        let template_name = template_name(options, &base_directory, ctx.resource_path())?;
        let data_request = data_request(options, ctx.resource_path())?;

        ctx.cacheable(true);

        let span = tracing::info_span!(
            "render",
            resource = %ctx.resource_path().display(),
            template = %template_name
        );
        async move {
            self.runtime
                .register_classpath(ctx.context(), options.classpath.entries());
            self.runtime.ensure_started();

            let config = build_configuration(
                options,
                Arc::clone(&ctx),
                base_directory,
                resource_loaders,
                &self.shared_variables,
            )?;

            let template = config
                .get_template(&template_name)
                .await
                .map_err(LoaderError::Resolution)?;
            tracing::debug!(source = template.source_name(), "Template resolved");

            let data = ctx.load_module(&data_request).await?;
            let root = wrap_root(&data)?;

            let mut writer = StringWriter::new();
            template
                .process(&root, &mut writer)
                .map_err(LoaderError::Evaluation)?;
            let output = writer.into_string();
            tracing::info!(bytes = output.len(), "Rendered");
            Ok(output)
        }
        .instrument(span)
        .await
    }
}

/// Split the remaining request. The last entry must be the resource itself.
fn resource_loaders(remaining_request: &str, resource_path: &Path) -> Result<Vec<String>> {
    let mut entries: Vec<&str> = remaining_request.split('!').collect();
    match entries.pop() {
        Some(last) if Path::new(last) == resource_path => Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_empty())
            .map(String::from)
            .collect()),
        _ => Err(LoaderError::configuration(format!(
            "Expected remaining request to end with resource path \"{}\"",
            resource_path.display()
        ))),
    }
}

fn base_directory(options: &LoaderOptions, context: &Path) -> PathBuf {
    match &options.context {
        Some(dir) => context.join(dir),
        None => context.to_path_buf(),
    }
}

fn template_name(options: &LoaderOptions, base: &Path, resource_path: &Path) -> Result<String> {
    if let Some(template) = &options.template {
        return Ok(template.clone());
    }
    if options.data.is_none() {
        return Err(LoaderError::configuration(
            "Neither `template` nor `data` is set; the resource cannot be both",
        ));
    }
    let relative = resource_path.strip_prefix(base).map_err(|_| {
        LoaderError::configuration(format!(
            "Resource {} is outside of {}; set `template` explicitly",
            resource_path.display(),
            base.display()
        ))
    })?;
    Ok(relative.to_string_lossy().replace('\\', "/"))
}

fn data_request(options: &LoaderOptions, resource_path: &Path) -> Result<ModuleRequest> {
    match &options.data {
        Some(data) => ModuleRequest::parse(data),
        None => Ok(ModuleRequest {
            bypass_configured: false,
            loaders: Vec::new(),
            resource: resource_path.to_path_buf(),
        }),
    }
}
