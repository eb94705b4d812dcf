/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template evaluation.
//!
//! This module implements the processing of parsed templates against a data
//! model. Values are looked up in loop variables first, then in the root
//! hash, then in the configuration's shared variables.

use chrono::{DateTime, Utc};

use crate::ast::{Expr, IfBlock, ListBlock, Location, TemplateNode};
use crate::config::{TemplateExceptionHandler, TemplateSettings};
use crate::error::{ModelError, TemplateError, TemplateResult};
use crate::model::{
    self, DateModel, DateType, HashModel, ModelKind, ModelRef, SimpleSequence,
};
use crate::parser::Template;
use crate::writer::StringWriter;

const UNKNOWN_DATE_TYPE: &str = "Can't convert the date to string, because it is not known \
    which parts of the date variable are in use. Use ?date, ?time, or ?datetime built-in to \
    specify it.";

impl Template {
    /// Process the template against a data model, appending to `out`.
    ///
    /// The root model must expose the hash capability.
    pub fn process(&self, root: &ModelRef, out: &mut StringWriter) -> TemplateResult<()> {
        let root = root.as_hash().ok_or_else(|| TemplateError::EvaluationError {
            template: self.name.clone(),
            location: Location::new(1, 1),
            message: format!("The data model root must be a hash, not a {}", root.kind()),
        })?;
        tracing::debug!(template = %self.name, format = %self.settings.output_format, "processing template");

        let mut env = Environment {
            root,
            settings: &self.settings,
            locals: Vec::new(),
        };
        env.render(self, &self.nodes, out)
    }

    /// Process the template and return the output.
    pub fn render(&self, root: &ModelRef) -> TemplateResult<String> {
        let mut out = StringWriter::new();
        self.process(root, &mut out)?;
        Ok(out.into_string())
    }
}

/// Where an expression is evaluated, for error reporting.
#[derive(Clone, Copy)]
struct Site<'a> {
    template: &'a Template,
    location: Location,
}

impl Site<'_> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::EvaluationError {
            template: self.template.name.clone(),
            location: self.location,
            message: message.into(),
        }
    }

    fn model(&self, source: ModelError) -> TemplateError {
        TemplateError::Model {
            template: self.template.name.clone(),
            location: self.location,
            source,
        }
    }
}

struct LoopVariable {
    name: String,
    value: ModelRef,
    index: usize,
    has_next: bool,
}

struct Environment<'a> {
    root: &'a dyn HashModel,
    settings: &'a TemplateSettings,
    locals: Vec<LoopVariable>,
}

impl Environment<'_> {
    fn render(
        &mut self,
        template: &Template,
        nodes: &[TemplateNode],
        out: &mut StringWriter,
    ) -> TemplateResult<()> {
        for node in nodes {
            match node {
                TemplateNode::Text(text) => out.write(&text.text),
                TemplateNode::Comment(_) => {}
                TemplateNode::Interpolation(interpolation) => {
                    let site = Site {
                        template,
                        location: interpolation.location,
                    };
                    let text = self
                        .eval(&interpolation.expr, site)
                        .and_then(|value| to_display_string(&value, &interpolation.expr, site));
                    if let Some(text) = self.guard(site, text, out)? {
                        out.write(&text);
                    }
                }
                TemplateNode::If(block) => self.render_if(template, block, out)?,
                TemplateNode::List(block) => self.render_list(template, block, out)?,
                TemplateNode::Include(include) => {
                    let Some(included) = &include.resolved else {
                        let site = Site {
                            template,
                            location: include.location,
                        };
                        let error = Err(site.error(format!(
                            "Include \"{}\" was not resolved; load the template through a Configuration",
                            include.name
                        )));
                        self.guard::<()>(site, error, out)?;
                        continue;
                    };
                    self.render(included, &included.nodes, out)?;
                }
            }
        }
        Ok(())
    }

    fn render_if(
        &mut self,
        template: &Template,
        block: &IfBlock,
        out: &mut StringWriter,
    ) -> TemplateResult<()> {
        let site = Site {
            template,
            location: block.location,
        };
        for (condition, body) in &block.branches {
            let value = self.eval_boolean(condition, site);
            match self.guard(site, value, out)? {
                Some(true) => return self.render(template, body, out),
                Some(false) => {}
                None => return Ok(()),
            }
        }
        if let Some(body) = &block.else_branch {
            self.render(template, body, out)?;
        }
        Ok(())
    }

    fn render_list(
        &mut self,
        template: &Template,
        block: &ListBlock,
        out: &mut StringWriter,
    ) -> TemplateResult<()> {
        let site = Site {
            template,
            location: block.location,
        };
        let items = self
            .eval(&block.source, site)
            .and_then(|source| collect_items(&source, &block.source, site));
        let Some(items) = self.guard(site, items, out)? else {
            return Ok(());
        };

        let count = items.len();
        for (index, value) in items.into_iter().enumerate() {
            let has_next = index + 1 < count;
            self.locals.push(LoopVariable {
                name: block.var.clone(),
                value,
                index,
                has_next,
            });
            let mut result = self.render(template, &block.body, out);
            if result.is_ok()
                && has_next
                && let Some(separator) = &block.separator
            {
                result = self.render(template, separator, out);
            }
            self.locals.pop();
            result?;
        }
        Ok(())
    }

    /// Apply the exception handler to a failed evaluation. `Ok(None)` means
    /// the failing statement is skipped.
    fn guard<T>(
        &self,
        site: Site<'_>,
        result: TemplateResult<T>,
        out: &mut StringWriter,
    ) -> TemplateResult<Option<T>> {
        let error = match result {
            Ok(value) => return Ok(Some(value)),
            Err(error) if error.is_evaluation() => error,
            Err(error) => return Err(error),
        };
        if self.settings.log_template_exceptions {
            tracing::error!(template = %site.template.name, location = %site.location, error = %error, "Error executing template");
        }
        match self.settings.exception_handler {
            TemplateExceptionHandler::Rethrow => Err(error),
            TemplateExceptionHandler::Debug => {
                out.write(&format!("\n[Template error (debug mode): {}]\n", error));
                Err(error)
            }
            TemplateExceptionHandler::Ignore => Ok(None),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&self, expr: &Expr, site: Site<'_>) -> TemplateResult<ModelRef> {
        self.eval_opt(expr, site)?.ok_or_else(|| {
            site.error(format!(
                "The following has evaluated to null or missing: {}",
                expr
            ))
        })
    }

    fn eval_boolean(&self, expr: &Expr, site: Site<'_>) -> TemplateResult<bool> {
        let value = self.eval(expr, site)?;
        value.as_boolean().ok_or_else(|| {
            site.error(format!(
                "Expected a boolean, but {} evaluated to a {}",
                expr,
                value.kind()
            ))
        })
    }

    /// Evaluate an expression; `Ok(None)` when a variable or key is missing.
    fn eval_opt(&self, expr: &Expr, site: Site<'_>) -> TemplateResult<Option<ModelRef>> {
        match expr {
            Expr::Variable(name) => self.lookup(name, site),
            Expr::Special(name) => self.special(name, site).map(Some),
            Expr::StringLit(s) => Ok(Some(model::scalar(s.clone()))),
            Expr::NumberLit(n) => Ok(Some(model::number(*n))),
            Expr::BoolLit(b) => Ok(Some(model::boolean(*b))),
            Expr::Dot(target, key) => {
                let Some(target_value) = self.present(target, site)? else {
                    return Ok(None);
                };
                let hash = target_value.as_hash().ok_or_else(|| {
                    site.error(format!(
                        "Expected a hash, but {} evaluated to a {}",
                        target,
                        target_value.kind()
                    ))
                })?;
                hash.get(key).map_err(|e| site.model(e))
            }
            Expr::Index(target, index) => {
                let Some(target_value) = self.present(target, site)? else {
                    return Ok(None);
                };
                let index_value = self.eval(index, site)?;
                if let Some(n) = index_value.as_number() {
                    let sequence = target_value.as_sequence().ok_or_else(|| {
                        site.error(format!(
                            "Expected a sequence, but {} evaluated to a {}",
                            target,
                            target_value.kind()
                        ))
                    })?;
                    if n < 0.0 || n.fract() != 0.0 {
                        return Err(site.error(format!("Invalid sequence index: {}", n)));
                    }
                    return sequence.get(n as usize).map(Some).map_err(|e| site.model(e));
                }
                if let Some(key) = index_value.as_scalar() {
                    let hash = target_value.as_hash().ok_or_else(|| {
                        site.error(format!(
                            "Expected a hash, but {} evaluated to a {}",
                            target,
                            target_value.kind()
                        ))
                    })?;
                    return hash.get(key).map_err(|e| site.model(e));
                }
                Err(site.error(format!(
                    "Index {} must be a number or a string, not a {}",
                    index,
                    index_value.kind()
                )))
            }
            Expr::Call(target, args) => {
                let callee = self.eval(target, site)?;
                let method = callee.as_method().ok_or_else(|| {
                    site.error(format!(
                        "Expected a method, but {} evaluated to a {}",
                        target,
                        callee.kind()
                    ))
                })?;
                let mut arguments = SimpleSequence::new();
                for arg in args {
                    arguments.push(self.eval(arg, site)?);
                }
                method.exec(&arguments).map(Some).map_err(|e| site.model(e))
            }
            Expr::BuiltIn(target, name) => self.builtin(target, name, site).map(Some),
            Expr::Default(target, fallback) => match self.present(target, site)? {
                Some(value) => Ok(Some(value)),
                None => match fallback {
                    Some(fallback) => self.eval_opt(fallback, site),
                    None => Ok(Some(model::nothing())),
                },
            },
            Expr::Exists(target) => Ok(Some(model::boolean(self.present(target, site)?.is_some()))),
            Expr::Not(inner) => Ok(Some(model::boolean(!self.eval_boolean(inner, site)?))),
            Expr::Eq(a, b) => {
                let equal = self.equal(a, b, site)?;
                Ok(Some(model::boolean(equal)))
            }
            Expr::Ne(a, b) => {
                let equal = self.equal(a, b, site)?;
                Ok(Some(model::boolean(!equal)))
            }
            Expr::And(a, b) => Ok(Some(model::boolean(
                self.eval_boolean(a, site)? && self.eval_boolean(b, site)?,
            ))),
            Expr::Or(a, b) => Ok(Some(model::boolean(
                self.eval_boolean(a, site)? || self.eval_boolean(b, site)?,
            ))),
        }
    }

    /// Like `eval_opt`, but the "nothing" model also counts as missing.
    fn present(&self, expr: &Expr, site: Site<'_>) -> TemplateResult<Option<ModelRef>> {
        Ok(self
            .eval_opt(expr, site)?
            .filter(|value| value.kind() != ModelKind::Nothing))
    }

    fn lookup(&self, name: &str, site: Site<'_>) -> TemplateResult<Option<ModelRef>> {
        if let Some(local) = self.locals.iter().rev().find(|l| l.name == name) {
            return Ok(Some(local.value.clone()));
        }
        let value = self.root.get(name).map_err(|e| site.model(e))?;
        match value {
            Some(value) if value.kind() != ModelKind::Nothing => Ok(Some(value)),
            other => Ok(self
                .settings
                .shared_variables
                .get(name)
                .cloned()
                .or(other)),
        }
    }

    fn special(&self, name: &str, site: Site<'_>) -> TemplateResult<ModelRef> {
        match name {
            "output_format" => Ok(model::scalar(self.settings.output_format.name())),
            "locale" => Ok(model::scalar(
                site.template
                    .locale
                    .as_ref()
                    .unwrap_or(&self.settings.locale)
                    .to_string(),
            )),
            "template_name" => Ok(model::scalar(site.template.name.clone())),
            other => Err(site.error(format!("Unknown special variable: .{}", other))),
        }
    }

    fn equal(&self, a: &Expr, b: &Expr, site: Site<'_>) -> TemplateResult<bool> {
        let left = self.eval(a, site)?;
        let right = self.eval(b, site)?;
        if let (Some(x), Some(y)) = (left.as_number(), right.as_number()) {
            return Ok(x == y);
        }
        if let (Some(x), Some(y)) = (left.as_boolean(), right.as_boolean()) {
            return Ok(x == y);
        }
        if let (Some(x), Some(y)) = (left.as_date(), right.as_date()) {
            let x = x.as_date().map_err(|e| site.model(e))?;
            let y = y.as_date().map_err(|e| site.model(e))?;
            return Ok(x == y);
        }
        if let (Some(x), Some(y)) = (left.as_scalar(), right.as_scalar()) {
            return Ok(x == y);
        }
        Err(site.error(format!(
            "Can't compare values of these types: {} ({}) and {} ({})",
            a,
            left.kind(),
            b,
            right.kind()
        )))
    }

    fn builtin(&self, target: &Expr, name: &str, site: Site<'_>) -> TemplateResult<ModelRef> {
        if let Expr::Variable(var) = target
            && let Some(local) = self.locals.iter().rev().find(|l| &l.name == var)
        {
            match name {
                "index" => return Ok(model::number(local.index as f64)),
                "counter" => return Ok(model::number((local.index + 1) as f64)),
                "has_next" => return Ok(model::boolean(local.has_next)),
                "is_first" => return Ok(model::boolean(local.index == 0)),
                "is_last" => return Ok(model::boolean(!local.has_next)),
                _ => {}
            }
        }

        if name == "has_content" {
            let value = self.present(target, site)?;
            return Ok(model::boolean(value.is_some_and(|v| has_content(&v))));
        }

        let value = self.eval(target, site)?;
        let mismatch = |expected: &str| {
            site.error(format!(
                "?{} expects a {}, but {} evaluated to a {}",
                name,
                expected,
                target,
                value.kind()
            ))
        };

        match name {
            "size" => {
                if let Some(sequence) = value.as_sequence() {
                    Ok(model::number(sequence.size() as f64))
                } else if let Some(hash) = value.as_hash() {
                    Ok(model::number(hash.size() as f64))
                } else if let Some(collection) = value.as_collection() {
                    Ok(model::number(collection.size() as f64))
                } else {
                    Err(mismatch("sequence, hash or collection"))
                }
            }
            "keys" => value
                .as_hash()
                .map(|hash| hash.keys())
                .ok_or_else(|| mismatch("hash")),
            "values" => value
                .as_hash()
                .map(|hash| hash.values())
                .ok_or_else(|| mismatch("hash")),
            "upper_case" => value
                .as_scalar()
                .map(|s| model::scalar(s.to_uppercase()))
                .ok_or_else(|| mismatch("string")),
            "lower_case" => value
                .as_scalar()
                .map(|s| model::scalar(s.to_lowercase()))
                .ok_or_else(|| mismatch("string")),
            "c" => {
                if let Some(n) = value.as_number() {
                    Ok(model::scalar(format_computer_number(n)))
                } else if let Some(b) = value.as_boolean() {
                    Ok(model::scalar(b.to_string()))
                } else if let Some(s) = value.as_scalar() {
                    Ok(model::scalar(s))
                } else {
                    Err(mismatch("number, boolean or string"))
                }
            }
            "string" => to_display_string(&value, target, site).map(model::scalar),
            "long" => {
                if let Some(date) = value.as_date() {
                    let date = date.as_date().map_err(|e| site.model(e))?;
                    Ok(model::number(date.millis() as f64))
                } else if let Some(n) = value.as_number() {
                    Ok(model::number(n.trunc()))
                } else {
                    Err(mismatch("date or number"))
                }
            }
            "date" | "time" | "datetime" => {
                let date = value.as_date().ok_or_else(|| mismatch("date"))?;
                let millis = date.as_date().map_err(|e| site.model(e))?;
                let date_type = match name {
                    "date" => DateType::Date,
                    "time" => DateType::Time,
                    _ => DateType::DateTime,
                };
                Ok(model::date(millis, date_type))
            }
            other => Err(site.error(format!("Unknown built-in: ?{}", other))),
        }
    }
}

fn has_content(value: &ModelRef) -> bool {
    if let Some(s) = value.as_scalar() {
        return !s.is_empty();
    }
    if let Some(sequence) = value.as_sequence() {
        return sequence.size() > 0;
    }
    if let Some(hash) = value.as_hash() {
        return !hash.is_empty();
    }
    if let Some(collection) = value.as_collection() {
        return !collection.is_empty();
    }
    true
}

/// Materialize the items of a sequence or collection for `<#list>`.
fn collect_items(value: &ModelRef, expr: &Expr, site: Site<'_>) -> TemplateResult<Vec<ModelRef>> {
    if value.kind() == ModelKind::Nothing {
        return Ok(Vec::new());
    }
    if let Some(sequence) = value.as_sequence() {
        return (0..sequence.size())
            .map(|i| sequence.get(i).map_err(|e| site.model(e)))
            .collect();
    }
    if let Some(collection) = value.as_collection() {
        let mut items = Vec::with_capacity(collection.size());
        let mut iterator = collection.iterator();
        while iterator.has_next() {
            items.push(iterator.next().map_err(|e| site.model(e))?);
        }
        return Ok(items);
    }
    Err(site.error(format!(
        "Expected a sequence or collection, but {} evaluated to a {}",
        expr,
        value.kind()
    )))
}

fn to_display_string(value: &ModelRef, expr: &Expr, site: Site<'_>) -> TemplateResult<String> {
    if let Some(s) = value.as_scalar() {
        return Ok(s.to_string());
    }
    if let Some(n) = value.as_number() {
        return Ok(format_number(n));
    }
    if let Some(b) = value.as_boolean() {
        return Ok(b.to_string());
    }
    if let Some(date) = value.as_date() {
        return format_date(date, site);
    }
    Err(site.error(format!(
        "Expected a string, number, boolean or date, but {} evaluated to a {}",
        expr,
        value.kind()
    )))
}

/// Number as written by `?c`: no grouping, full precision.
fn format_computer_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "INF" } else { "-INF" }).to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Number as interpolated: grouped thousands, at most three fraction digits.
fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return format_computer_number(n);
    }
    let text = format_computer_number((n * 1000.0).round() / 1000.0);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

fn format_date(date: &dyn DateModel, site: Site<'_>) -> TemplateResult<String> {
    let pattern = match date.date_type() {
        DateType::Unknown => return Err(site.error(UNKNOWN_DATE_TYPE)),
        DateType::Date => "%Y-%m-%d",
        DateType::Time => "%H:%M:%S",
        DateType::DateTime => "%Y-%m-%dT%H:%M:%S%.3fZ",
    };
    let value = date.as_date().map_err(|e| site.model(e))?;
    let datetime = DateTime::<Utc>::from_timestamp_millis(value.millis())
        .ok_or_else(|| site.error(format!("Date out of range: {} ms", value.millis())))?;
    Ok(datetime.format(pattern).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineDate, SimpleHash};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn render(source: &str, root: ModelRef) -> TemplateResult<String> {
        Template::compile(source)?.render(&root)
    }

    fn data() -> ModelRef {
        model::hash([
            ("name", model::scalar("Ada")),
            ("count", model::number(1234.5)),
            ("flag", model::boolean(true)),
            ("empty", model::scalar("")),
            ("nothing", model::nothing()),
            (
                "tags",
                model::sequence([model::scalar("a"), model::scalar("b"), model::scalar("c")]),
            ),
            (
                "user",
                model::hash([("name", model::scalar("Grace")), ("age", model::number(85.0))]),
            ),
        ])
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(render("Hi ${name}!", data()).unwrap(), "Hi Ada!");
        assert_eq!(render("${user.name}/${user['age']}", data()).unwrap(), "Grace/85");
        assert_eq!(render("${tags[1]}", data()).unwrap(), "b");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(render("${count}", data()).unwrap(), "1,234.5");
        assert_eq!(render("${count?c}", data()).unwrap(), "1234.5");
        assert_eq!(format_number(123.0), "123");
        assert_eq!(format_number(-1234567.0), "-1,234,567");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_computer_number(f64::NAN), "NaN");
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = render("${missing}", data()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Evaluation error in <template> at line 1, column 1: \
             The following has evaluated to null or missing: missing"
        );
        assert!(render("${user.missing}", data()).is_err());
    }

    #[test]
    fn test_default_and_exists() {
        assert_eq!(render("${missing!'x'}", data()).unwrap(), "x");
        assert_eq!(render("[${missing!}]", data()).unwrap(), "[]");
        assert_eq!(render("${nothing!'n'}", data()).unwrap(), "n");
        assert_eq!(render("${missing.deep!'d'}", data()).unwrap(), "d");
        assert_eq!(render("${name??} ${missing??}", data()).unwrap(), "true false");
    }

    #[test]
    fn test_nothing_renders_empty() {
        assert_eq!(render("[${nothing}]", data()).unwrap(), "[]");
    }

    #[test]
    fn test_conditionals() {
        let source = "<#if flag && name == 'Ada'>yes<#else>no</#if>";
        assert_eq!(render(source, data()).unwrap(), "yes");
        let source = "<#if !flag>a<#elseif user.age != 85>b<#else>c</#if>";
        assert_eq!(render(source, data()).unwrap(), "c");
        assert!(render("<#if name>x</#if>", data()).is_err());
        assert!(render("<#if name == 1>x</#if>", data()).is_err());
    }

    #[test]
    fn test_list_with_separator_and_loop_builtins() {
        let source = "<#list tags as t>${t?counter}:${t}<#sep>, </#list>";
        assert_eq!(render(source, data()).unwrap(), "1:a, 2:b, 3:c");
        let source = "<#list user?keys as k>${k}<#if k?has_next>|</#if></#list>";
        assert_eq!(render(source, data()).unwrap(), "name|age");
        assert_eq!(render("<#list missing! as x>${x}</#list>", data()).unwrap(), "");
        assert!(render("<#list name as x>${x}</#list>", data()).is_err());
    }

    #[test]
    fn test_builtins() {
        assert_eq!(render("${tags?size} ${user?size}", data()).unwrap(), "3 2");
        assert_eq!(render("${name?upper_case}${name?lower_case}", data()).unwrap(), "ADAada");
        assert_eq!(
            render("${empty?has_content?c} ${name?has_content?c} ${missing?has_content?c}", data())
                .unwrap(),
            "false true false"
        );
        assert_eq!(render("${flag?string}", data()).unwrap(), "true");
        assert!(render("${name?nope}", data()).is_err());
    }

    #[test]
    fn test_out_of_range_index_is_model_error() {
        let err = render("${tags[5]}", data()).unwrap_err();
        assert!(matches!(err, TemplateError::Model { .. }));
    }

    #[test]
    fn test_dates() {
        let root = model::hash([
            ("unknown", model::date(EngineDate::from_millis(0), DateType::Unknown)),
            ("day", model::date(EngineDate::from_millis(86_400_000), DateType::Date)),
        ]);
        assert_eq!(render("${day}", root.clone()).unwrap(), "1970-01-02");
        assert_eq!(render("${unknown?datetime}", root.clone()).unwrap(), "1970-01-01T00:00:00.000Z");
        assert_eq!(render("${unknown?long?c}", root.clone()).unwrap(), "0");
        let err = render("${unknown}", root).unwrap_err();
        assert!(err.to_string().contains("Can't convert the date to string"));
    }

    #[test]
    fn test_specials() {
        let out = render("${.output_format}|${.template_name}", data()).unwrap();
        assert_eq!(out, "undefined|<template>");
    }

    #[test]
    fn test_root_must_be_hash() {
        let template = Template::compile("x").unwrap();
        assert!(template.render(&model::scalar("nope")).is_err());
    }

    #[test]
    fn test_exception_handlers() {
        let mut template = Template::compile("a${missing}b").unwrap();

        let mut settings = TemplateSettings {
            exception_handler: TemplateExceptionHandler::Ignore,
            log_template_exceptions: false,
            ..TemplateSettings::default()
        };
        template.settings = Arc::new(settings.clone());
        assert_eq!(template.render(&data()).unwrap(), "ab");

        settings.exception_handler = TemplateExceptionHandler::Debug;
        template.settings = Arc::new(settings);
        let mut out = StringWriter::new();
        assert!(template.process(&data(), &mut out).is_err());
        assert!(out.to_string().starts_with("a\n[Template error (debug mode): "));
    }

    #[test]
    fn test_shared_variables_fill_in() {
        let mut template = Template::compile("${site} ${name}").unwrap();
        let mut settings = TemplateSettings::default();
        settings
            .shared_variables
            .insert("site".to_string(), model::scalar("shared"));
        settings
            .shared_variables
            .insert("name".to_string(), model::scalar("ignored"));
        template.settings = Arc::new(settings);
        assert_eq!(template.render(&data()).unwrap(), "shared Ada");
    }

    #[test]
    fn test_method_call() {
        use crate::model::{MethodModel, TemplateModel};

        #[derive(Debug)]
        struct Join;
        impl TemplateModel for Join {
            fn kind(&self) -> ModelKind {
                ModelKind::Method
            }
            fn as_method(&self) -> Option<&dyn MethodModel> {
                Some(self)
            }
        }
        impl MethodModel for Join {
            fn exec(&self, arguments: &SimpleSequence) -> Result<ModelRef, ModelError> {
                let parts: Vec<String> = arguments
                    .iter()
                    .map(|a| a.as_scalar().unwrap_or("?").to_string())
                    .collect();
                Ok(model::scalar(parts.join("+")))
            }
        }

        let mut root = SimpleHash::new();
        root.insert("join", Arc::new(Join) as ModelRef);
        root.insert("x", model::scalar("x"));
        let root: ModelRef = Arc::new(root);
        assert_eq!(render("${join(x, 'y')}", root.clone()).unwrap(), "x+y");
        assert!(render("${x()}", root).is_err());
    }
}
