/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template engine driven through a configuration, a template loader and a
//! data model made of capability traits.
//!
//! The engine never touches the filesystem itself. Template text is pulled
//! through a [`TemplateLoader`] implementation supplied by the embedding
//! application, and the data a template reads is exposed through
//! [`TemplateModel`] and its capability traits ([`HashModel`],
//! [`SequenceModel`], [`CollectionModel`], [`MethodModel`], [`DateModel`]).
//!
//! Supported template language:
//!
//! - Interpolation: `${user.name}`, `${items[0]}`, `${format(price, "EUR")}`
//! - Conditionals: `<#if cond>...<#elseif other>...<#else>...</#if>`
//! - Lists: `<#list items as item>...<#sep>, </#list>`
//! - Includes: `<#include "header.html">` (resolved through the loader)
//! - Comments: `<#-- ignored -->`
//! - Operators: `!` (default), `??` (exists), `==`, `!=`, `&&`, `||`, `!`
//! - Built-ins: `?size`, `?keys`, `?values`, `?upper_case`, `?lower_case`,
//!   `?c`, `?string`, `?has_content`, `?long`, `?date`, `?time`, `?datetime`,
//!   and on loop variables `?index`, `?counter`, `?has_next`, `?is_first`,
//!   `?is_last`
//! - Special variables: `.output_format`, `.locale`, `.template_name`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ftl_engine::{Configuration, StringTemplateLoader, StringWriter, model};
//!
//! let mut loader = StringTemplateLoader::new();
//! loader.add("hello.html", "Hello, ${name}!");
//!
//! let mut config = Configuration::new();
//! config.set_template_loader(Arc::new(loader));
//!
//! let template = config.get_template("hello.html").await?;
//! let root = model::hash([("name", model::scalar("World"))]);
//! let mut out = StringWriter::new();
//! template.process(&root, &mut out)?;
//! assert_eq!(out.to_string(), "Hello, World!");
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod loader;
pub mod locale;
pub mod model;
pub mod object;
pub mod output_format;
pub mod parser;
pub mod pattern;
pub mod writer;

// Re-export main types at crate root
pub use ast::{Expr, IfBlock, Include, Interpolation, ListBlock, Location, TemplateNode, Text};
pub use config::{Configuration, TemplateExceptionHandler};
pub use error::{ModelError, TemplateError, TemplateResult};
pub use loader::{
    PipeReader, PipeWriter, StringTemplateLoader, TemplateLoader, TemplateSource, pipe,
};
pub use locale::Locale;
pub use model::{
    CollectionModel, DateModel, DateType, EngineDate, HashModel, MethodModel, ModelIterator,
    ModelKind, ModelRef, ModelResult, SequenceModel, SimpleSequence, TemplateModel,
};
pub use object::{NativeFunction, ObjectValue};
pub use output_format::OutputFormat;
pub use parser::Template;
pub use pattern::Pattern;
pub use writer::StringWriter;
