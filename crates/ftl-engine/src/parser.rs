/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template parser.
//!
//! Parsing happens in two passes: a scanner splits the source into text,
//! interpolations, comments and directive tags, and a tree builder nests the
//! directive tags into [`TemplateNode`]s. Expressions are handed to
//! [`crate::expr::parse_expression`].

use std::sync::Arc;

use crate::ast::{
    Comment, Expr, IfBlock, Include, Interpolation, ListBlock, Location, TemplateNode, Text,
};
use crate::config::TemplateSettings;
use crate::error::{TemplateError, TemplateResult};
use crate::expr::parse_expression;
use crate::locale::Locale;

/// A compiled template ready for processing.
#[derive(Debug, Clone)]
pub struct Template {
    /// Name the template was requested under.
    pub(crate) name: String,

    /// Name of the localized candidate that was actually loaded.
    pub(crate) source_name: String,

    /// Locale the template was looked up with, when loaded through a
    /// configuration.
    pub(crate) locale: Option<Locale>,

    pub(crate) nodes: Vec<TemplateNode>,

    /// Settings captured from the configuration at load time.
    pub(crate) settings: Arc<TemplateSettings>,
}

impl Template {
    /// Compile a template from source text.
    ///
    /// Templates compiled this way use default settings and cannot contain
    /// `<#include>` directives that are processed; includes are only resolved
    /// by [`crate::Configuration::get_template`].
    pub fn compile(source: &str) -> TemplateResult<Self> {
        Self::compile_with_name(source, "<template>")
    }

    /// Compile a template from source text with a name for error reporting.
    pub fn compile_with_name(source: &str, name: &str) -> TemplateResult<Self> {
        let pieces = Scanner::new(source, name).scan()?;
        let mut builder = TreeBuilder {
            pieces,
            pos: 0,
            template: name,
        };
        let (nodes, end) = builder.build(&[])?;
        if let Some(end) = end {
            return Err(parse_error(
                name,
                end.location(),
                format!("Unexpected {}", end.describe()),
            ));
        }

        Ok(Template {
            name: name.to_string(),
            source_name: name.to_string(),
            locale: None,
            nodes,
            settings: Arc::new(TemplateSettings::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the localized source that was loaded (`index_en.html` for a
    /// request of `index.html`).
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Get the AST nodes of this template.
    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    /// All include directives, in document order.
    pub(crate) fn includes_mut(&mut self) -> Vec<&mut Include> {
        let mut includes = Vec::new();
        collect_includes(&mut self.nodes, &mut includes);
        includes
    }
}

fn collect_includes<'a>(nodes: &'a mut [TemplateNode], out: &mut Vec<&'a mut Include>) {
    for node in nodes {
        match node {
            TemplateNode::Include(include) => out.push(include),
            TemplateNode::If(block) => {
                for (_, body) in &mut block.branches {
                    collect_includes(body, out);
                }
                if let Some(body) = &mut block.else_branch {
                    collect_includes(body, out);
                }
            }
            TemplateNode::List(block) => {
                collect_includes(&mut block.body, out);
                if let Some(body) = &mut block.separator {
                    collect_includes(body, out);
                }
            }
            TemplateNode::Text(_) | TemplateNode::Interpolation(_) | TemplateNode::Comment(_) => {}
        }
    }
}

fn parse_error(template: &str, location: Location, message: impl Into<String>) -> TemplateError {
    TemplateError::ParseError {
        template: template.to_string(),
        location,
        message: message.into(),
    }
}

// ============================================================================
// Scanner
// ============================================================================

#[derive(Debug)]
enum Piece {
    Text(String, Location),
    Interpolation(String, Location),
    Comment(String, Location),
    Open {
        name: String,
        args: String,
        location: Location,
    },
    Close {
        name: String,
        location: Location,
    },
}

impl Piece {
    fn location(&self) -> Location {
        match self {
            Piece::Text(_, location)
            | Piece::Interpolation(_, location)
            | Piece::Comment(_, location)
            | Piece::Open { location, .. }
            | Piece::Close { location, .. } => *location,
        }
    }

    fn describe(&self) -> String {
        match self {
            Piece::Open { name, .. } => format!("<#{}>", name),
            Piece::Close { name, .. } => format!("</#{}>", name),
            Piece::Text(..) => "text".to_string(),
            Piece::Interpolation(..) => "interpolation".to_string(),
            Piece::Comment(..) => "comment".to_string(),
        }
    }
}

struct Scanner<'a> {
    src: &'a str,
    template: &'a str,
    pos: usize,
    line_starts: Vec<usize>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str, template: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            src,
            template,
            pos: 0,
            line_starts,
        }
    }

    fn location_at(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };
        let column = self.src[self.line_starts[line]..offset].chars().count() + 1;
        Location::new(line + 1, column)
    }

    fn scan(mut self) -> TemplateResult<Vec<Piece>> {
        let mut pieces = Vec::new();
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let Some(start) = find_markup(rest) else {
                pieces.push(Piece::Text(rest.to_string(), self.location_at(self.pos)));
                break;
            };
            if start > 0 {
                pieces.push(Piece::Text(
                    rest[..start].to_string(),
                    self.location_at(self.pos),
                ));
            }
            self.pos += start;
            pieces.push(self.scan_markup()?);
        }
        Ok(pieces)
    }

    fn scan_markup(&mut self) -> TemplateResult<Piece> {
        let start = self.pos;
        let location = self.location_at(start);
        let rest = &self.src[start..];

        if let Some(body) = rest.strip_prefix("${") {
            let end = find_unquoted(body, '}').ok_or_else(|| {
                parse_error(self.template, location, "Unclosed interpolation")
            })?;
            self.pos = start + 2 + end + 1;
            return Ok(Piece::Interpolation(body[..end].to_string(), location));
        }

        if let Some(body) = rest.strip_prefix("<#--") {
            let end = body
                .find("-->")
                .ok_or_else(|| parse_error(self.template, location, "Unclosed comment"))?;
            self.pos = start + 4 + end + 3;
            return Ok(Piece::Comment(body[..end].to_string(), location));
        }

        if let Some(body) = rest.strip_prefix("</#") {
            let end = body
                .find('>')
                .ok_or_else(|| parse_error(self.template, location, "Unclosed end tag"))?;
            self.pos = start + 3 + end + 1;
            return Ok(Piece::Close {
                name: body[..end].trim().to_string(),
                location,
            });
        }

        // `<#name args>`; find_markup only stops on these four prefixes.
        let body = &rest[2..];
        let end = find_unquoted(body, '>')
            .ok_or_else(|| parse_error(self.template, location, "Unclosed directive"))?;
        self.pos = start + 2 + end + 1;
        let tag = body[..end].trim();
        let tag = tag.strip_suffix('/').unwrap_or(tag).trim_end();
        let (name, args) = match tag.find(char::is_whitespace) {
            Some(split) => (&tag[..split], tag[split..].trim()),
            None => (tag, ""),
        };
        Ok(Piece::Open {
            name: name.to_string(),
            args: args.to_string(),
            location,
        })
    }
}

/// Offset of the next `${`, `<#` or `</#` in `text`.
fn find_markup(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find(|&i| {
        let rest = &bytes[i..];
        rest.starts_with(b"${") || rest.starts_with(b"<#") || rest.starts_with(b"</#")
    })
}

/// Offset of the first `target` outside a string literal.
fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == target => return Some(i),
            None => {}
        }
    }
    None
}

// ============================================================================
// Tree builder
// ============================================================================

struct TreeBuilder<'a> {
    pieces: Vec<Piece>,
    pos: usize,
    template: &'a str,
}

impl TreeBuilder<'_> {
    /// Build nodes until a piece whose directive name is in `stop` (an open
    /// tag like `else` or a close tag like `/if`). The stopping piece is
    /// consumed and returned.
    fn build(&mut self, stop: &[&str]) -> TemplateResult<(Vec<TemplateNode>, Option<Piece>)> {
        let mut nodes = Vec::new();
        while self.pos < self.pieces.len() {
            let piece = std::mem::replace(
                &mut self.pieces[self.pos],
                Piece::Text(String::new(), Location::default()),
            );
            self.pos += 1;

            let key = match &piece {
                Piece::Open { name, .. } => Some(name.clone()),
                Piece::Close { name, .. } => Some(format!("/{}", name)),
                _ => None,
            };
            if let Some(key) = key
                && stop.contains(&key.as_str())
            {
                return Ok((nodes, Some(piece)));
            }

            let node = match piece {
                Piece::Text(text, location) => TemplateNode::Text(Text { text, location }),
                Piece::Comment(text, location) => {
                    TemplateNode::Comment(Comment { text, location })
                }
                Piece::Interpolation(source, location) => {
                    let expr = self.expression(&source, location)?;
                    TemplateNode::Interpolation(Interpolation {
                        expr,
                        source: source.trim().to_string(),
                        location,
                    })
                }
                Piece::Open {
                    name,
                    args,
                    location,
                } => self.directive(&name, &args, location)?,
                close @ Piece::Close { .. } => {
                    return Err(parse_error(
                        self.template,
                        close.location(),
                        format!("Unexpected {}", close.describe()),
                    ));
                }
            };
            nodes.push(node);
        }
        Ok((nodes, None))
    }

    fn expression(&self, source: &str, location: Location) -> TemplateResult<Expr> {
        parse_expression(source).map_err(|message| parse_error(self.template, location, message))
    }

    fn directive(&mut self, name: &str, args: &str, location: Location) -> TemplateResult<TemplateNode> {
        match name {
            "if" => self.if_block(args, location),
            "list" => self.list_block(args, location),
            "include" => {
                let name = match self.expression(args, location)? {
                    Expr::StringLit(name) => name,
                    _ => {
                        return Err(parse_error(
                            self.template,
                            location,
                            "<#include> expects a string literal template name",
                        ));
                    }
                };
                Ok(TemplateNode::Include(Include {
                    name,
                    location,
                    resolved: None,
                }))
            }
            other => Err(parse_error(
                self.template,
                location,
                format!("Unknown directive <#{}>", other),
            )),
        }
    }

    fn if_block(&mut self, args: &str, location: Location) -> TemplateResult<TemplateNode> {
        let mut branches = Vec::new();
        let mut condition = self.expression(args, location)?;
        loop {
            let (body, end) = self.build(&["elseif", "else", "/if"])?;
            branches.push((condition, body));
            match end {
                Some(Piece::Open {
                    name,
                    args,
                    location: at,
                }) if name == "elseif" => {
                    condition = self.expression(&args, at)?;
                }
                Some(Piece::Open { .. }) => {
                    let (body, end) = self.build(&["/if"])?;
                    if end.is_none() {
                        break;
                    }
                    return Ok(TemplateNode::If(IfBlock {
                        branches,
                        else_branch: Some(body),
                        location,
                    }));
                }
                Some(_) => {
                    return Ok(TemplateNode::If(IfBlock {
                        branches,
                        else_branch: None,
                        location,
                    }));
                }
                None => break,
            }
        }
        Err(parse_error(self.template, location, "Unclosed <#if>"))
    }

    fn list_block(&mut self, args: &str, location: Location) -> TemplateResult<TemplateNode> {
        let (source, var) = args.rsplit_once(" as ").ok_or_else(|| {
            parse_error(
                self.template,
                location,
                "<#list> expects `<#list items as item>`",
            )
        })?;
        let var = var.trim();
        if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(parse_error(
                self.template,
                location,
                format!("Invalid loop variable name: {}", var),
            ));
        }
        let source = self.expression(source, location)?;

        let (body, end) = self.build(&["sep", "/list"])?;
        let separator = match end {
            Some(Piece::Open { .. }) => {
                let (separator, end) = self.build(&["/list"])?;
                if end.is_none() {
                    return Err(parse_error(self.template, location, "Unclosed <#list>"));
                }
                Some(separator)
            }
            Some(_) => None,
            None => return Err(parse_error(self.template, location, "Unclosed <#list>")),
        };

        Ok(TemplateNode::List(ListBlock {
            source,
            var: var.to_string(),
            body,
            separator,
            location,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Template {
        Template::compile(source).expect("template should compile")
    }

    #[test]
    fn test_text_and_interpolation() {
        let t = compile("<em>${test}</em>\n");
        assert_eq!(t.nodes().len(), 3);
        match &t.nodes()[1] {
            TemplateNode::Interpolation(i) => {
                assert_eq!(i.expr, Expr::Variable("test".into()));
                assert_eq!(i.location, Location::new(1, 5));
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elseif_else() {
        let t = compile("<#if a>A<#elseif b>B<#else>C</#if>");
        match &t.nodes()[0] {
            TemplateNode::If(block) => {
                assert_eq!(block.branches.len(), 2);
                assert!(block.else_branch.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_list_with_separator() {
        let t = compile("<#list user.tags as tag>${tag}<#sep>, </#list>");
        match &t.nodes()[0] {
            TemplateNode::List(block) => {
                assert_eq!(block.var, "tag");
                assert_eq!(block.body.len(), 1);
                assert_eq!(block.separator.as_ref().map(Vec::len), Some(1));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_quoted_delimiters_in_expressions() {
        let t = compile(r#"${x!"}"}<#if y == ">">ok</#if>"#);
        assert_eq!(t.nodes().len(), 2);
    }

    #[test]
    fn test_include_collects() {
        let mut t = compile(r#"<#if a><#include "a.html"></#if><#include "/b.html"/>"#);
        let names: Vec<String> = t.includes_mut().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["a.html", "/b.html"]);
    }

    #[test]
    fn test_comment_spanning_lines() {
        let t = compile("a<#-- one\ntwo -->${b}");
        match &t.nodes()[2] {
            TemplateNode::Interpolation(i) => assert_eq!(i.location, Location::new(2, 8)),
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        for source in [
            "${unclosed",
            "<#if a>never closed",
            "<#list xs>${x}</#list>",
            "</#if>",
            "<#unknown>",
            "<#include name>",
            "${a b}",
        ] {
            let err = Template::compile_with_name(source, "bad.html").unwrap_err();
            assert!(
                matches!(err, TemplateError::ParseError { ref template, .. } if template == "bad.html"),
                "{} gave {:?}",
                source,
                err
            );
        }
    }

    #[test]
    fn test_error_location() {
        let err = Template::compile("line one\n  ${a.}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error in <template> at line 2, column 3: Expected name after '.'"
        );
    }
}
