/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template loading, parsing and evaluation.

use thiserror::Error;

use crate::ast::Location;

/// Error raised by a data-model implementation while a template is evaluated.
///
/// Model adapters return this from inside evaluation, for example when a
/// sequence is indexed out of range. The evaluator attaches the template
/// location and reports it as [`TemplateError::Model`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", .message.as_deref().unwrap_or("template model error"))]
pub struct ModelError {
    message: Option<String>,
}

impl ModelError {
    /// Create a model error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Create a model error without a message.
    pub fn empty() -> Self {
        Self { message: None }
    }

    /// The message, if one was given.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Error parsing the template syntax.
    #[error("Parse error in {template} at {location}: {message}")]
    ParseError {
        template: String,
        location: Location,
        message: String,
    },

    /// No candidate of the (localized) lookup was found by the loader.
    #[error("Template not found: {name}")]
    NotFound { name: String },

    /// The template name escapes the loader root or is empty.
    #[error("Malformed template name: {name}")]
    MalformedName { name: String },

    /// Recursive include detected.
    #[error("Recursive include detected (depth > {max_depth}): {name}")]
    RecursiveInclude { name: String, max_depth: usize },

    /// Error evaluating the template.
    #[error("Evaluation error in {template} at {location}: {message}")]
    EvaluationError {
        template: String,
        location: Location,
        message: String,
    },

    /// A data-model implementation failed during evaluation.
    #[error("Model error in {template} at {location}: {source}")]
    Model {
        template: String,
        location: Location,
        #[source]
        source: ModelError,
    },

    /// The configuration has no template loader.
    #[error("No template loader configured")]
    NoLoader,

    /// I/O error reported by a template loader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    /// Whether this error was raised while evaluating (as opposed to loading).
    pub fn is_evaluation(&self) -> bool {
        matches!(
            self,
            TemplateError::EvaluationError { .. } | TemplateError::Model { .. }
        )
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
