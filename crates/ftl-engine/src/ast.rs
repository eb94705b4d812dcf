/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree for parsed templates.
//! Each node includes a source location for error reporting.

use std::fmt;
use std::sync::Arc;

use crate::parser::Template;

/// Line/column position in a template (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A node in the template AST.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    /// Literal text to be output as-is.
    Text(Text),

    /// Interpolation: `${expr}`
    Interpolation(Interpolation),

    /// Conditional block: `<#if c>...<#elseif d>...<#else>...</#if>`
    If(IfBlock),

    /// List block: `<#list xs as x>...<#sep>...</#list>`
    List(ListBlock),

    /// Include: `<#include "name">`
    Include(Include),

    /// Comment (not rendered): `<#-- comment -->`
    Comment(Comment),
}

/// Literal text node.
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub text: String,
    pub location: Location,
}

/// Interpolation node.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolation {
    pub expr: Expr,
    /// The expression as written, for error messages.
    pub source: String,
    pub location: Location,
}

/// Conditional block.
#[derive(Debug, Clone)]
pub struct IfBlock {
    /// (condition, body) pairs for the if/elseif branches.
    pub branches: Vec<(Expr, Vec<TemplateNode>)>,
    pub else_branch: Option<Vec<TemplateNode>>,
    pub location: Location,
}

/// List block.
#[derive(Debug, Clone)]
pub struct ListBlock {
    /// Expression producing the sequence or collection to iterate.
    pub source: Expr,
    /// Loop variable name.
    pub var: String,
    pub body: Vec<TemplateNode>,
    /// Output between iterations (from `<#sep>`).
    pub separator: Option<Vec<TemplateNode>>,
    pub location: Location,
}

/// Include directive.
#[derive(Debug, Clone)]
pub struct Include {
    /// Name as written in the directive.
    pub name: String,
    pub location: Location,
    /// The included template, populated when the including template is
    /// loaded through a [`crate::Configuration`].
    pub resolved: Option<Arc<Template>>,
}

/// Comment node.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    pub location: Location,
}

/// Expression AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Top-level variable: `name`
    Variable(String),
    /// Special variable: `.output_format`
    Special(String),
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    /// Dotted access: `a.b`
    Dot(Box<Expr>, String),
    /// Bracket access: `a[0]`, `a["key"]`
    Index(Box<Expr>, Box<Expr>),
    /// Method call: `f(x, y)`
    Call(Box<Expr>, Vec<Expr>),
    /// Built-in: `a?size`
    BuiltIn(Box<Expr>, String),
    /// Default operator: `a!"fallback"`, or `a!` for an empty fallback.
    Default(Box<Expr>, Option<Box<Expr>>),
    /// Existence test: `a??`
    Exists(Box<Expr>),
    Not(Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Renders the expression back to template syntax, for error messages.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Special(name) => write!(f, ".{}", name),
            Expr::StringLit(s) => write!(f, "{:?}", s),
            Expr::NumberLit(n) => write!(f, "{}", n),
            Expr::BoolLit(b) => write!(f, "{}", b),
            Expr::Dot(target, key) => write!(f, "{}.{}", target, key),
            Expr::Index(target, index) => write!(f, "{}[{}]", target, index),
            Expr::Call(target, args) => {
                write!(f, "{}(", target)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::BuiltIn(target, name) => write!(f, "{}?{}", target, name),
            Expr::Default(target, None) => write!(f, "{}!", target),
            Expr::Default(target, Some(fallback)) => write!(f, "{}!{}", target, fallback),
            Expr::Exists(target) => write!(f, "{}??", target),
            Expr::Not(inner) => write!(f, "!{}", inner),
            Expr::Eq(a, b) => write!(f, "{} == {}", a, b),
            Expr::Ne(a, b) => write!(f, "{} != {}", a, b),
            Expr::And(a, b) => write!(f, "{} && {}", a, b),
            Expr::Or(a, b) => write!(f, "{} || {}", a, b),
        }
    }
}
