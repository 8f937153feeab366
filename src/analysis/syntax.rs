//! Tree-sitter plumbing for Go sources.

use once_cell::sync::Lazy;
use phf::phf_set;
use tree_sitter::{Language, LanguageError, Node, Parser};

/// The Go grammar, shared by every parser and query.
pub static GO_LANGUAGE: Lazy<Language> = Lazy::new(|| tree_sitter_go::LANGUAGE.into());

/// Predeclared non-interface types.
pub static BASIC_TYPES: phf::Set<&'static str> = phf_set! {
    "bool", "byte", "complex64", "complex128", "float32", "float64",
    "int", "int8", "int16", "int32", "int64", "rune", "string",
    "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
};

/// Predeclared functions.
pub static BUILTIN_FUNCS: phf::Set<&'static str> = phf_set! {
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag",
    "len", "make", "max", "min", "new", "panic", "print", "println", "real",
    "recover",
};

/// Create a parser for the current thread.
///
/// `tree_sitter::Parser` is not shareable, so every worker builds its own.
pub fn create_parser() -> Result<Parser, LanguageError> {
    let mut parser = Parser::new();
    parser.set_language(&GO_LANGUAGE)?;
    Ok(parser)
}

/// Source text of a node, or `""` for invalid UTF-8.
pub fn text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Named children of a node.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First named child of a node.
pub fn first_named<'t>(node: Node<'t>) -> Option<Node<'t>> {
    named_children(node).into_iter().next()
}

/// All children attached under a field name.
pub fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Statements of a block, looking through an intermediate `statement_list`
/// when the grammar produces one.
pub fn statements<'t>(block: Node<'t>) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    for child in named_children(block) {
        if child.kind() == "statement_list" {
            out.extend(named_children(child));
        } else {
            out.push(child);
        }
    }
    out
}

/// Specs of a `var`/`const`/`type` declaration, flattening grouped forms.
pub fn specs<'t>(decl: Node<'t>, spec_kind: &str) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    for child in named_children(decl) {
        if child.kind() == spec_kind {
            out.push(child);
        } else if child.kind().ends_with("_list") {
            out.extend(
                named_children(child)
                    .into_iter()
                    .filter(|n| n.kind() == spec_kind),
            );
        }
    }
    out
}

/// Expressions of an `expression_list`, or the node itself.
pub fn expressions<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    if node.kind() == "expression_list" {
        named_children(node)
            .into_iter()
            .filter(|n| n.kind() != "comment")
            .collect()
    } else {
        vec![node]
    }
}

/// Whether a node has an anonymous child token of the given kind.
pub fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

/// Whether `inner` lies within `outer`'s byte range.
pub fn contains(outer: Node, inner: Node) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

/// Re-find a node by its byte span and kind.
///
/// Declarations are stored as spans so that resolved tables do not borrow
/// the trees they came from.
pub fn node_at<'t>(root: Node<'t>, span: Span, kind: &str) -> Option<Node<'t>> {
    let mut node = root.descendant_for_byte_range(span.start, span.end)?;
    loop {
        if node.kind() == kind && node.start_byte() == span.start && node.end_byte() == span.end {
            return Some(node);
        }
        if node.start_byte() < span.start || node.end_byte() > span.end {
            return None;
        }
        node = node.parent()?;
    }
}

/// Byte range of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn from_node(node: Node) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
        }
    }
}

/// Unquote a Go string literal (interpreted or raw). Escapes other than
/// `\"` and `\\` are left as written; import paths and method names never
/// contain them.
pub fn unquote(literal: &str) -> String {
    let trimmed = literal.trim();
    if let Some(raw) = trimmed.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return raw.to_string();
    }
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
