/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for ftl-loader

use std::path::PathBuf;

use ftl_engine::{ModelError, TemplateError};
use thiserror::Error;

/// A host value has no representation on the engine side.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// The value is outside the shapes the adapter knows (symbols).
    #[error("No mapping for {0}")]
    NoMapping(String),

    /// Functions handed to the engine must take 0, 1 or 2 arguments.
    #[error("Function {name} declares {arity} parameters; only 0, 1 or 2 are supported")]
    UnsupportedArity { name: String, arity: usize },

    /// A regular expression the engine's pattern compiler rejects.
    #[error("Invalid regular expression /{pattern}/: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl From<AdapterError> for ModelError {
    fn from(err: AdapterError) -> Self {
        ModelError::new(err.to_string())
    }
}

/// Error thrown by a host function.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum LoaderError {
    /// Bad or unsupported options; raised before any asynchronous work.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The template (or a template it includes) could not be found or parsed.
    #[error("Template resolution failed: {0}")]
    Resolution(#[source] TemplateError),

    /// The data model could not be bound into engine values.
    #[error("Data binding failed: {0}")]
    Binding(#[from] AdapterError),

    /// The engine failed while processing the template.
    #[error("Template evaluation failed: {0}")]
    Evaluation(#[source] TemplateError),

    /// Filling a template pipe failed after `open` had returned.
    #[error("Background read of {} failed: {message}", .path.display())]
    BackgroundFill { path: PathBuf, message: String },

    /// Loading or executing a module through the build pipeline failed.
    #[error("Module {request} failed: {message}")]
    Module { request: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The completion callback was invoked a second time.
    #[error("Completion callback invoked more than once")]
    AlreadyCompleted,
}

impl LoaderError {
    /// Create a configuration error from any message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a module error for a request.
    pub fn module(request: impl ToString, msg: impl Into<String>) -> Self {
        Self::Module {
            request: request.to_string(),
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
