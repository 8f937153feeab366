//! Package declaration tables and lexical identifier lookup.

use std::collections::HashMap;

use tree_sitter::Node;

use super::{GoOracle, MAX_DEPTH};
use crate::analysis::loader::CompilationUnit;
use crate::analysis::syntax::{self, Span, BASIC_TYPES};
use crate::analysis::traits::{Binding, FileRef};
use crate::analysis::types::{GoType, TypeName};
use crate::error::ResolveError;

/// Where a declaration lives within its unit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeclSite {
    pub file: usize,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub(crate) struct TypeDecl {
    pub site: DeclSite,
    /// `type_spec` or `type_alias`.
    pub kind: &'static str,
    /// Names of the declared type parameters.
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValueDecl {
    pub site: DeclSite,
    /// `var_spec` or `const_spec`.
    pub kind: &'static str,
}

/// Top-level declarations of one compilation unit.
#[derive(Debug, Default)]
pub struct PackageScope {
    pub(crate) types: HashMap<String, TypeDecl>,
    pub(crate) funcs: HashMap<String, DeclSite>,
    /// Methods keyed by receiver base type name, then method name.
    pub(crate) methods: HashMap<String, HashMap<String, DeclSite>>,
    pub(crate) values: HashMap<String, ValueDecl>,
    /// Per file: local package name to import path.
    pub(crate) imports: Vec<HashMap<String, String>>,
}

impl PackageScope {
    /// Collect the top-level declarations of a unit.
    ///
    /// A type declared twice makes the whole unit unresolvable.
    pub fn build(
        unit: &CompilationUnit,
        package_names: &HashMap<String, String>,
    ) -> Result<Self, ResolveError> {
        let mut scope = PackageScope::default();
        for (file_idx, file) in unit.files.iter().enumerate() {
            let src = &file.source[..];
            let mut imports = HashMap::new();
            for decl in syntax::named_children(file.tree.root_node()) {
                match decl.kind() {
                    "import_declaration" => {
                        for spec in syntax::specs(decl, "import_spec") {
                            collect_import(spec, src, package_names, &mut imports);
                        }
                    }
                    "type_declaration" => {
                        for spec in syntax::named_children(decl) {
                            let kind = match spec.kind() {
                                "type_spec" => "type_spec",
                                "type_alias" => "type_alias",
                                _ => continue,
                            };
                            let Some(name) = spec.child_by_field_name("name") else {
                                continue;
                            };
                            let name = syntax::text(name, src).to_string();
                            if scope.types.contains_key(&name) {
                                return Err(ResolveError::Redeclared {
                                    package: unit.import_path.clone(),
                                    name,
                                });
                            }
                            let params = spec
                                .child_by_field_name("type_parameters")
                                .map(|list| type_param_names(list, src))
                                .unwrap_or_default();
                            scope.types.insert(
                                name,
                                TypeDecl {
                                    site: site(file_idx, spec),
                                    kind,
                                    params,
                                },
                            );
                        }
                    }
                    "function_declaration" => {
                        if let Some(name) = decl.child_by_field_name("name") {
                            let name = syntax::text(name, src);
                            if name != "init" && name != "_" {
                                scope.funcs.insert(name.to_string(), site(file_idx, decl));
                            }
                        }
                    }
                    "method_declaration" => {
                        let receiver = decl
                            .child_by_field_name("receiver")
                            .and_then(|r| receiver_base(r, src));
                        let name = decl.child_by_field_name("name");
                        if let (Some(receiver), Some(name)) = (receiver, name) {
                            scope
                                .methods
                                .entry(receiver)
                                .or_default()
                                .insert(syntax::text(name, src).to_string(), site(file_idx, decl));
                        }
                    }
                    "var_declaration" | "const_declaration" => {
                        let kind = if decl.kind() == "var_declaration" {
                            "var_spec"
                        } else {
                            "const_spec"
                        };
                        for spec in syntax::specs(decl, kind) {
                            for name in syntax::field_children(spec, "name") {
                                let name = syntax::text(name, src);
                                if name != "_" {
                                    scope.values.insert(
                                        name.to_string(),
                                        ValueDecl {
                                            site: site(file_idx, spec),
                                            kind,
                                        },
                                    );
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            scope.imports.push(imports);
        }
        Ok(scope)
    }
}

fn site(file: usize, node: Node) -> DeclSite {
    DeclSite {
        file,
        span: Span::from_node(node),
    }
}

fn collect_import(
    spec: Node,
    src: &[u8],
    package_names: &HashMap<String, String>,
    imports: &mut HashMap<String, String>,
) {
    let Some(path) = spec.child_by_field_name("path") else {
        return;
    };
    let path = syntax::unquote(syntax::text(path, src));
    let local = match spec.child_by_field_name("name") {
        Some(name) => syntax::text(name, src).to_string(),
        None => package_names
            .get(&path)
            .cloned()
            .unwrap_or_else(|| default_import_name(&path)),
    };
    // Blank and dot imports introduce no qualifier.
    if local != "_" && local != "." {
        imports.insert(local, path);
    }
}

/// Conventional package name of an import path outside the project:
/// the last element, skipping a major-version suffix.
fn default_import_name(path: &str) -> String {
    let mut parts = path.rsplit('/');
    let last = parts.next().unwrap_or(path);
    let is_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].chars().all(|c| c.is_ascii_digit());
    let name = if is_version {
        parts.next().unwrap_or(last)
    } else {
        last
    };
    // gopkg.in style: yaml.v3
    let name = match name.rfind(".v") {
        Some(i) if i + 2 < name.len() && name[i + 2..].chars().all(|c| c.is_ascii_digit()) => {
            &name[..i]
        }
        _ => name,
    };
    name.trim_start_matches("go-").replace(['-', '.'], "_")
}

fn type_param_names(list: Node, src: &[u8]) -> Vec<String> {
    syntax::named_children(list)
        .into_iter()
        .filter(|n| n.kind() == "type_parameter_declaration")
        .flat_map(|decl| syntax::field_children(decl, "name"))
        .map(|name| syntax::text(name, src).to_string())
        .collect()
}

/// Base type name of a method receiver: `(s *Store)` and `(b Box[T])` give
/// `Store` and `Box`.
fn receiver_base(receiver: Node, src: &[u8]) -> Option<String> {
    let param = syntax::named_children(receiver)
        .into_iter()
        .find(|n| n.kind() == "parameter_declaration")?;
    let mut ty = param.child_by_field_name("type")?;
    loop {
        match ty.kind() {
            "pointer_type" | "parenthesized_type" => {
                ty = syntax::first_named(ty)?;
            }
            "generic_type" => ty = ty.child_by_field_name("type")?,
            "type_identifier" => return Some(syntax::text(ty, src).to_string()),
            _ => return None,
        }
    }
}

impl GoOracle<'_> {
    /// Resolve an identifier by walking its enclosing scopes outward, then
    /// the package scope, imports and the universe.
    pub(super) fn lookup(&self, at: FileRef, ident: Node, depth: usize) -> Binding {
        if depth > MAX_DEPTH {
            return Binding::Unknown;
        }
        let name = self.text(at, ident);
        if name == "_" {
            return Binding::Unknown;
        }

        let mut child = ident;
        let mut current = ident.parent();
        while let Some(scope) = current {
            if let Some(binding) = self.declared_in(at, scope, child, ident, name, depth) {
                return binding;
            }
            child = scope;
            current = scope.parent();
        }

        self.package_binding(at, name, depth)
    }

    /// Declarations of `name` made by `scope` and visible at `ident`.
    fn declared_in(
        &self,
        at: FileRef,
        scope: Node,
        child: Node,
        ident: Node,
        name: &str,
        depth: usize,
    ) -> Option<Binding> {
        let pos = ident.start_byte();
        match scope.kind() {
            "block" | "statement_list" => syntax::statements(scope)
                .into_iter()
                .rev()
                .filter(|stmt| stmt.end_byte() <= pos)
                .find_map(|stmt| self.declared_by(at, stmt, name, depth)),
            "if_statement" | "expression_switch_statement" => {
                let init = scope.child_by_field_name("initializer")?;
                if syntax::contains(init, ident) {
                    return None;
                }
                self.declared_by(at, init, name, depth)
            }
            "for_statement" => {
                let clause = syntax::named_children(scope)
                    .into_iter()
                    .find(|n| n.kind() == "for_clause" || n.kind() == "range_clause")?;
                if clause.kind() == "for_clause" {
                    let init = clause.child_by_field_name("initializer")?;
                    if syntax::contains(init, ident) {
                        return None;
                    }
                    self.declared_by(at, init, name, depth)
                } else {
                    self.range_binding(at, clause, ident, name, depth)
                }
            }
            "type_switch_statement" => self.type_switch_binding(at, scope, child, ident, name, depth),
            "communication_case" => {
                let comm = scope.child_by_field_name("communication")?;
                if comm.kind() != "receive_statement" || syntax::contains(comm, ident) {
                    return None;
                }
                let left = comm.child_by_field_name("left")?;
                let index = self.index_in(at, left, name)?;
                let right = comm.child_by_field_name("right")?;
                Some(Binding::Var(self.tuple_element(at, right, index, true, depth + 1)))
            }
            "func_literal" | "function_declaration" | "method_declaration" => {
                self.parameter_binding(at, scope, name, depth)
            }
            _ => None,
        }
    }

    /// Declarations made by a single statement.
    fn declared_by(&self, at: FileRef, stmt: Node, name: &str, depth: usize) -> Option<Binding> {
        match stmt.kind() {
            "short_var_declaration" => {
                let left = stmt.child_by_field_name("left")?;
                let index = self.index_in(at, left, name)?;
                let rights = syntax::expressions(stmt.child_by_field_name("right")?);
                let ty = if rights.len() > index && rights.len() > 1 {
                    self.expr_type(at, rights[index], depth + 1)
                } else if rights.len() == 1 {
                    let multi = syntax::expressions(left).len() > 1;
                    self.tuple_element(at, rights[0], index, multi, depth + 1)
                } else {
                    GoType::Unknown
                };
                Some(Binding::Var(ty))
            }
            "var_declaration" | "const_declaration" => {
                let kind = if stmt.kind() == "var_declaration" {
                    "var_spec"
                } else {
                    "const_spec"
                };
                syntax::specs(stmt, kind)
                    .into_iter()
                    .rev()
                    .find_map(|spec| {
                        let names = syntax::field_children(spec, "name");
                        let index = names.iter().position(|n| self.text(at, *n) == name)?;
                        Some(Binding::Var(self.spec_value_type(at, spec, index, depth + 1)))
                    })
            }
            "type_declaration" => syntax::named_children(stmt).into_iter().find_map(|spec| {
                let spec_name = spec.child_by_field_name("name")?;
                if self.text(at, spec_name) != name {
                    return None;
                }
                let rhs = spec.child_by_field_name("type")?;
                Some(Binding::Type(self.type_expr(at, rhs, depth + 1)))
            }),
            "labeled_statement" => syntax::named_children(stmt)
                .into_iter()
                .find(|n| n.kind() != "label_name")
                .and_then(|inner| self.declared_by(at, inner, name, depth)),
            _ => None,
        }
    }

    /// Type of the `index`-th name of a `var_spec`/`const_spec`.
    ///
    /// A const spec without type or value repeats the previous spec of its
    /// group (`iota` sequences).
    pub(super) fn spec_value_type(&self, at: FileRef, spec: Node, index: usize, depth: usize) -> GoType {
        if depth > MAX_DEPTH {
            return GoType::Unknown;
        }
        if let Some(ty) = spec.child_by_field_name("type") {
            return self.type_expr(at, ty, depth + 1);
        }
        if let Some(value) = spec.child_by_field_name("value") {
            let values = syntax::expressions(value);
            if values.len() > index && values.len() > 1 {
                return self.expr_type(at, values[index], depth + 1);
            }
            if let Some(first) = values.first() {
                let multi = syntax::field_children(spec, "name").len() > 1;
                return self.tuple_element(at, *first, index, multi, depth + 1);
            }
        }
        if spec.kind() == "const_spec" {
            let mut prev = spec.prev_named_sibling();
            while let Some(p) = prev {
                if p.kind() == "const_spec"
                    && (p.child_by_field_name("type").is_some() || p.child_by_field_name("value").is_some())
                {
                    return self.spec_value_type(at, p, 0, depth + 1);
                }
                prev = p.prev_named_sibling();
            }
        }
        GoType::Unknown
    }

    fn range_binding(
        &self,
        at: FileRef,
        clause: Node,
        ident: Node,
        name: &str,
        depth: usize,
    ) -> Option<Binding> {
        let right = clause.child_by_field_name("right")?;
        let left = clause.child_by_field_name("left")?;
        if syntax::contains(right, ident) || syntax::contains(left, ident) {
            return None;
        }
        if !syntax::has_token(clause, ":=") {
            return None;
        }
        let index = self.index_in(at, left, name)?;
        let ranged = self.underlying_at(&self.expr_type(at, right, depth + 1), depth + 1);
        let ranged = match ranged {
            GoType::Pointer(inner) => self.underlying_at(&inner, depth + 1),
            other => other,
        };
        let ty = match (ranged, index) {
            (GoType::Slice(_), 0) | (GoType::Array { .. }, 0) => GoType::basic("int"),
            (GoType::Slice(elem), 1) | (GoType::Array { elem, .. }, 1) => *elem,
            (GoType::Map { key, .. }, 0) => *key,
            (GoType::Map { value, .. }, 1) => *value,
            (GoType::Chan { elem, .. }, 0) => *elem,
            (GoType::Basic(b), 0) if b == "string" => GoType::basic("int"),
            (GoType::Basic(b), 1) if b == "string" => GoType::basic("rune"),
            (GoType::Basic(b), 0) => GoType::Basic(b),
            (GoType::Func(sig), i) => sig
                .params
                .first()
                .and_then(|yield_fn| match yield_fn {
                    GoType::Func(inner) => inner.params.get(i).cloned(),
                    _ => None,
                })
                .unwrap_or(GoType::Unknown),
            _ => GoType::Unknown,
        };
        Some(Binding::Var(ty))
    }

    /// The symbol bound by `switch v := x.(type)` inside one case clause:
    /// the case type for single-type cases, the switched type otherwise.
    fn type_switch_binding(
        &self,
        at: FileRef,
        switch: Node,
        child: Node,
        ident: Node,
        name: &str,
        depth: usize,
    ) -> Option<Binding> {
        if child.kind() == "type_case" || child.kind() == "default_case" {
            let aliased = switch
                .child_by_field_name("alias")
                .and_then(|alias| self.index_in(at, alias, name))
                .is_some();
            if aliased {
                let value = switch.child_by_field_name("value")?;
                let case_types = if child.kind() == "type_case" {
                    syntax::field_children(child, "type")
                } else {
                    Vec::new()
                };
                let ty = match case_types.as_slice() {
                    [single] if self.text(at, *single) != "nil" => {
                        self.type_expr(at, *single, depth + 1)
                    }
                    _ => self.expr_type(at, value, depth + 1),
                };
                return Some(Binding::Var(ty));
            }
        }

        let init = switch.child_by_field_name("initializer")?;
        if syntax::contains(init, ident) {
            return None;
        }
        self.declared_by(at, init, name, depth)
    }

    /// Index of `name` among the identifiers of an expression list.
    fn index_in(&self, at: FileRef, list: Node, name: &str) -> Option<usize> {
        syntax::expressions(list)
            .iter()
            .position(|n| n.kind() == "identifier" && self.text(at, *n) == name)
    }

    /// Receiver, parameters and named results of a function.
    fn parameter_binding(&self, at: FileRef, func: Node, name: &str, depth: usize) -> Option<Binding> {
        for field in ["receiver", "parameters", "result"] {
            let Some(list) = func.child_by_field_name(field) else {
                continue;
            };
            if list.kind() != "parameter_list" {
                continue;
            }
            for param in syntax::named_children(list) {
                let names = syntax::field_children(param, "name");
                if !names.iter().any(|n| self.text(at, *n) == name) {
                    continue;
                }
                let ty = param
                    .child_by_field_name("type")
                    .map(|t| self.type_expr(at, t, depth + 1))
                    .unwrap_or(GoType::Unknown);
                let ty = if param.kind() == "variadic_parameter_declaration" {
                    GoType::slice(ty)
                } else {
                    ty
                };
                return Some(Binding::Var(ty));
            }
        }
        None
    }

    /// Package-level declarations, imports of the current file, universe.
    pub(super) fn package_binding(&self, at: FileRef, name: &str, depth: usize) -> Binding {
        let Some(scope) = self.scope(at.unit) else {
            return Binding::Unknown;
        };
        let unit = &self.project.units[at.unit];

        if let Some(decl) = scope.values.get(name) {
            let decl_at = FileRef {
                unit: at.unit,
                file: decl.site.file,
            };
            let Some(spec) = self.node_in(decl_at, decl.site.span, decl.kind) else {
                return Binding::Unknown;
            };
            let index = syntax::field_children(spec, "name")
                .iter()
                .position(|n| self.text(decl_at, *n) == name)
                .unwrap_or(0);
            return Binding::Var(self.spec_value_type(decl_at, spec, index, depth + 1));
        }
        if let Some(decl) = scope.funcs.get(name) {
            let decl_at = FileRef {
                unit: at.unit,
                file: decl.file,
            };
            return match self.node_in(decl_at, decl.span, "function_declaration") {
                Some(func) => Binding::Func(self.signature(
                    decl_at,
                    func.child_by_field_name("parameters"),
                    func.child_by_field_name("result"),
                    depth + 1,
                )),
                None => Binding::Unknown,
            };
        }
        if let Some(decl) = scope.types.get(name) {
            if decl.kind == "type_alias" {
                return Binding::Type(
                    self.declared_type(&TypeName::new(unit.import_path.clone(), name), depth)
                        .unwrap_or(GoType::Unknown),
                );
            }
            return Binding::Type(GoType::Named(TypeName::new(unit.import_path.clone(), name)));
        }
        if let Some(path) = scope.imports.get(at.file).and_then(|m| m.get(name)) {
            return Binding::Package(path.clone());
        }
        universe(name)
    }
}

/// Predeclared identifiers.
fn universe(name: &str) -> Binding {
    match name {
        "true" | "false" => Binding::Var(GoType::basic("bool")),
        "iota" => Binding::Var(GoType::basic("int")),
        "error" => Binding::Type(GoType::Named(TypeName::error())),
        "any" => Binding::Type(GoType::empty_interface()),
        _ if BASIC_TYPES.contains(name) => Binding::Type(GoType::basic(name)),
        _ => Binding::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_import_name() {
        assert_eq!(default_import_name("fmt"), "fmt");
        assert_eq!(default_import_name("net/http"), "http");
        assert_eq!(default_import_name("github.com/go-chi/chi/v5"), "chi");
        assert_eq!(default_import_name("github.com/mattn/go-sqlite3"), "sqlite3");
        assert_eq!(default_import_name("gopkg.in/yaml.v3"), "yaml");
    }
}
