/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Bundler plugin that renders templates through `ftl-engine` at build time.
//!
//! For a resource such as `page.json` the loader looks up a template (by
//! default the resource path itself, usually set with the `template`
//! option), binds the data module's export as the template's root hash, and
//! returns the rendered text in place of the resource.
//!
//! The pieces:
//!
//! - [`adapter`]: host values as engine models, and back
//! - [`VirtualTemplateSource`]: template loading through the build pipeline,
//!   recording every candidate path as a dependency
//! - [`build_configuration`]: one engine configuration per request
//! - [`FtlLoader`]: the render pipeline and its single-shot [`Completion`]
//! - [`SerialLoader`]: the same pipeline with requests run one at a time
//! - [`BuildContext`]: what the loader needs from the bundler, with
//!   [`FsBuildContext`] as a filesystem-backed implementation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ftl_loader::{Completion, FsBuildContext, FtlLoader, LoaderOptions};
//!
//! let ctx = Arc::new(FsBuildContext::new("/site", "test.json"));
//! let options = LoaderOptions {
//!     template: Some("index.html".to_string()),
//!     ..Default::default()
//! };
//! let (completion, result) = Completion::channel();
//! FtlLoader::default()
//!     .pitch(ctx, "/site/test.json", &options, &completion)
//!     .await?;
//! assert_eq!(result.await??, "<em>123</em>\n");
//! ```

pub mod adapter;
pub mod build;
pub mod configuration;
pub mod error;
pub mod fs_context;
pub mod host;
pub mod options;
pub mod pipeline;
pub mod queue;
pub mod runtime;
pub mod source;

pub use adapter::{ValueNode, unwrap_simple, wrap, wrap_model, wrap_root};
pub use build::{BuildContext, DependencySet, FileStat, ModuleRequest};
pub use configuration::build_configuration;
pub use error::{AdapterError, HostError, LoaderError, Result};
pub use fs_context::{FsBuildContext, SourceTransform};
pub use host::{HostDate, HostFunction, HostRegExp, HostValue};
pub use options::{Classpath, LoaderOptions};
pub use pipeline::{Completion, FtlLoader};
pub use queue::{SerialLoader, SerializationQueue};
pub use runtime::EngineRuntime;
pub use source::VirtualTemplateSource;
