//! Parsed files and the type oracle seam.

use std::path::PathBuf;

use tree_sitter::Node;

use super::types::{GoType, Signature};

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// Trees are kept for the whole run so every stage walks the same syntax
/// without re-parsing.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// Path relative to the module root, used for workspace layout.
    pub module_path: PathBuf,
    /// Path as shown to the user.
    pub display_path: String,
}

impl ParsedFile {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// 1-based line of a node.
    pub fn line_of(&self, node: Node) -> usize {
        node.start_position().row + 1
    }

    /// Whether this is a Go test file.
    pub fn is_test_file(&self) -> bool {
        self.display_path.ends_with("_test.go")
    }
}

/// Locates a file within a loaded project: compilation unit, then file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef {
    pub unit: usize,
    pub file: usize,
}

/// What an identifier denotes at its position.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A variable, constant, parameter or receiver of the given type.
    Var(GoType),
    /// A declared function.
    Func(Signature),
    /// A type name.
    Type(GoType),
    /// An imported package, by import path.
    Package(String),
    Unknown,
}

/// Result of selecting `x.name` on a value of some type.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// A struct field, possibly promoted from an embedded field.
    Field(GoType),
    /// A method, either declared on a named type or part of an interface.
    Method(Signature),
}

/// Semantic queries over a loaded project.
///
/// Implementations must be read-only after construction so stages can query
/// them from many threads at once. Anything that cannot be resolved comes
/// back as [`GoType::Unknown`] or [`Binding::Unknown`], never as an error.
pub trait TypeOracle: Send + Sync {
    /// Static type of an expression node.
    fn type_of(&self, file: FileRef, expr: Node) -> GoType;

    /// Type denoted by a type expression node.
    fn resolve_type(&self, file: FileRef, type_expr: Node) -> GoType;

    /// Declaration an identifier refers to.
    fn binding_of(&self, file: FileRef, ident: Node) -> Binding;

    /// Underlying type of a named type; other types are returned unchanged.
    fn underlying(&self, ty: &GoType) -> GoType;

    /// Select a field or method on a value of type `ty`.
    fn member(&self, ty: &GoType, name: &str) -> Option<Member>;

    /// Constraint of the type parameter `param` as declared by the generic
    /// function or type enclosing `site`.
    fn constraint_of(&self, file: FileRef, site: Node, param: &str) -> GoType;
}
