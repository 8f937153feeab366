//! In-process type oracle for Go.
//!
//! Resolution works directly on the tree-sitter syntax trees of a loaded
//! [`Project`]:
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Project      │────▶│ PackageScope   │────▶│ GoOracle         │
//! │ (trees)      │     │ (per unit)     │     │ type_of/binding  │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//! ```
//!
//! Package scopes hold declaration sites as byte spans; nodes are re-found
//! in the owning tree on demand. Named types resolve to their underlying
//! shape lazily and the result is cached. Whatever cannot be resolved (an
//! external package, a construct outside the supported subset) becomes
//! [`GoType::Unknown`], which downstream stages treat as "no evidence".

mod expr;
mod scope;

use std::collections::HashMap;
use std::sync::RwLock;

use rayon::prelude::*;
use tracing::warn;
use tree_sitter::Node;

use super::loader::Project;
use super::syntax::{self, Span};
use super::traits::{Binding, FileRef, Member, TypeOracle};
use super::types::{GoType, InterfaceShape, Signature, StructShape, TypeName};

pub use scope::PackageScope;

/// Bound on mutually recursive resolution steps.
const MAX_DEPTH: usize = 48;

/// Type oracle over the syntax trees of one project.
pub struct GoOracle<'p> {
    project: &'p Project,
    /// `None` for units whose declarations could not be resolved.
    scopes: Vec<Option<PackageScope>>,
    underlying_cache: RwLock<HashMap<TypeName, GoType>>,
}

impl<'p> GoOracle<'p> {
    /// Build package scopes for every unit of the project.
    pub fn new(project: &'p Project) -> Self {
        let package_names: HashMap<String, String> = project
            .units
            .iter()
            .filter(|u| !u.is_external_test())
            .map(|u| (u.import_path.clone(), u.name.clone()))
            .collect();

        let scopes = project
            .units
            .par_iter()
            .map(|unit| match PackageScope::build(unit, &package_names) {
                Ok(scope) => Some(scope),
                Err(err) => {
                    warn!(package = %unit.import_path, error = %err, "cannot resolve package, skipping");
                    None
                }
            })
            .collect();

        Self {
            project,
            scopes,
            underlying_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn project(&self) -> &'p Project {
        self.project
    }

    /// Whether the unit resolved and may be analyzed.
    pub fn is_resolved(&self, unit: usize) -> bool {
        matches!(self.scopes.get(unit), Some(Some(_)))
    }

    fn scope(&self, unit: usize) -> Option<&PackageScope> {
        self.scopes.get(unit).and_then(Option::as_ref)
    }

    /// Re-find a node of a file by span.
    fn node_in(&self, at: FileRef, span: Span, kind: &str) -> Option<Node<'p>> {
        syntax::node_at(self.project.file(at).tree.root_node(), span, kind)
    }

    fn text(&self, at: FileRef, node: Node) -> &'p str {
        syntax::text(node, &self.project.file(at).source)
    }

    /// Type parameters of a declared generic type, if any.
    fn type_params_of(&self, name: &TypeName) -> Vec<String> {
        self.project
            .unit_by_import_path(&name.package)
            .and_then(|unit| self.scope(unit))
            .and_then(|scope| scope.types.get(&name.name))
            .map(|decl| decl.params.clone())
            .unwrap_or_default()
    }

    fn underlying_at(&self, ty: &GoType, depth: usize) -> GoType {
        if depth > MAX_DEPTH {
            return GoType::Unknown;
        }
        match ty {
            GoType::Named(name) => self.underlying_named(name, depth),
            GoType::Instance { base, args } => {
                let params = self.type_params_of(base);
                let generic = self.underlying_named(base, depth);
                substitute(&generic, &bindings(&params, args))
            }
            other => other.clone(),
        }
    }

    fn underlying_named(&self, name: &TypeName, depth: usize) -> GoType {
        if name.is_predeclared() {
            return predeclared_underlying(&name.name);
        }
        if let Ok(cache) = self.underlying_cache.read() {
            if let Some(cached) = cache.get(name) {
                return cached.clone();
            }
        }

        let resolved = match self.declared_type(name, depth) {
            Some(GoType::Named(next)) => self.underlying_named(&next, depth + 1),
            Some(instance @ GoType::Instance { .. }) => self.underlying_at(&instance, depth + 1),
            Some(other) => other,
            None => GoType::Unknown,
        };

        if let Ok(mut cache) = self.underlying_cache.write() {
            cache.insert(name.clone(), resolved.clone());
        }
        resolved
    }

    /// Right-hand side of a type declaration in the analyzed project.
    fn declared_type(&self, name: &TypeName, depth: usize) -> Option<GoType> {
        let unit = self.project.unit_by_import_path(&name.package)?;
        let decl = self.scope(unit)?.types.get(&name.name)?;
        let at = FileRef {
            unit,
            file: decl.site.file,
        };
        let spec = self.node_in(at, decl.site.span, decl.kind)?;
        let rhs = spec.child_by_field_name("type")?;
        Some(self.type_expr(at, rhs, depth + 1))
    }

    /// Method declared with a receiver of the named type.
    fn declared_method(
        &self,
        name: &TypeName,
        args: &[GoType],
        method: &str,
        depth: usize,
    ) -> Option<Signature> {
        let unit = self.project.unit_by_import_path(&name.package)?;
        let site = self.scope(unit)?.methods.get(&name.name)?.get(method)?;
        let at = FileRef {
            unit,
            file: site.file,
        };
        let decl = self.node_in(at, site.span, "method_declaration")?;
        let sig = self.signature(
            at,
            decl.child_by_field_name("parameters"),
            decl.child_by_field_name("result"),
            depth + 1,
        );
        if args.is_empty() {
            return Some(sig);
        }
        let params = self.receiver_type_params(at, decl);
        Some(substitute_signature(&sig, &bindings(&params, args)))
    }

    /// Names bound by a generic receiver such as `(b *Box[T])`.
    fn receiver_type_params(&self, at: FileRef, method: Node) -> Vec<String> {
        let Some(receiver) = method.child_by_field_name("receiver") else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for param in syntax::named_children(receiver) {
            let Some(mut ty) = param.child_by_field_name("type") else {
                continue;
            };
            while ty.kind() == "pointer_type" || ty.kind() == "parenthesized_type" {
                match syntax::first_named(ty) {
                    Some(inner) => ty = inner,
                    None => break,
                }
            }
            if ty.kind() != "generic_type" {
                continue;
            }
            if let Some(args) = ty.child_by_field_name("type_arguments") {
                for arg in syntax::named_children(args) {
                    let ident = if arg.kind() == "type_elem" {
                        syntax::named_children(arg).into_iter().next()
                    } else {
                        Some(arg)
                    };
                    if let Some(ident) = ident {
                        names.push(self.text(at, ident).to_string());
                    }
                }
            }
        }
        names
    }

    fn member_at(&self, ty: &GoType, name: &str, depth: usize) -> Option<Member> {
        if depth > MAX_DEPTH {
            return None;
        }
        match ty {
            GoType::Pointer(inner) => match inner.as_ref() {
                GoType::Named(_) | GoType::Instance { .. } | GoType::Struct(_) => {
                    self.member_at(inner, name, depth + 1)
                }
                _ => None,
            },
            GoType::Named(type_name) | GoType::Instance { base: type_name, .. } => {
                let args: &[GoType] = match ty {
                    GoType::Instance { args, .. } => args.as_slice(),
                    _ => &[],
                };
                if let Some(sig) = self.declared_method(type_name, args, name, depth) {
                    return Some(Member::Method(sig));
                }
                match self.underlying_at(ty, depth + 1) {
                    GoType::Interface(shape) => shape.method(name).cloned().map(Member::Method),
                    GoType::Struct(shape) => self.struct_member(&shape, name, depth + 1),
                    _ => None,
                }
            }
            GoType::Interface(shape) => shape.method(name).cloned().map(Member::Method),
            GoType::Struct(shape) => self.struct_member(shape, name, depth + 1),
            _ => None,
        }
    }

    /// Field or promoted member of a struct. Shallower depths win.
    fn struct_member(&self, shape: &StructShape, name: &str, depth: usize) -> Option<Member> {
        if let Some(field) = shape.field(name) {
            return Some(Member::Field(field.ty.clone()));
        }
        shape
            .fields
            .iter()
            .filter(|f| f.embedded)
            .find_map(|f| self.member_at(&f.ty, name, depth + 1))
    }
}

impl TypeOracle for GoOracle<'_> {
    fn type_of(&self, file: FileRef, expr: Node) -> GoType {
        if !self.is_resolved(file.unit) {
            return GoType::Unknown;
        }
        self.expr_type(file, expr, 0)
    }

    fn resolve_type(&self, file: FileRef, type_expr: Node) -> GoType {
        if !self.is_resolved(file.unit) {
            return GoType::Unknown;
        }
        self.type_expr(file, type_expr, 0)
    }

    fn binding_of(&self, file: FileRef, ident: Node) -> Binding {
        if !self.is_resolved(file.unit) {
            return Binding::Unknown;
        }
        self.lookup(file, ident, 0)
    }

    fn underlying(&self, ty: &GoType) -> GoType {
        self.underlying_at(ty, 0)
    }

    fn member(&self, ty: &GoType, name: &str) -> Option<Member> {
        self.member_at(ty, name, 0)
    }

    fn constraint_of(&self, file: FileRef, site: Node, param: &str) -> GoType {
        if !self.is_resolved(file.unit) {
            return GoType::Unknown;
        }
        self.type_param_constraint(file, site, param, 0)
    }
}

/// Underlying shape of a predeclared named type.
fn predeclared_underlying(name: &str) -> GoType {
    match name {
        "error" => {
            let mut shape = InterfaceShape::default();
            shape.methods.insert(
                "Error".to_string(),
                Signature {
                    params: Vec::new(),
                    results: vec![GoType::basic("string")],
                    variadic: false,
                },
            );
            GoType::Interface(shape)
        }
        _ => GoType::Unknown,
    }
}

fn bindings(params: &[String], args: &[GoType]) -> HashMap<String, GoType> {
    params.iter().cloned().zip(args.iter().cloned()).collect()
}

/// Replace type parameters by their arguments.
fn substitute(ty: &GoType, map: &HashMap<String, GoType>) -> GoType {
    if map.is_empty() {
        return ty.clone();
    }
    let sub = |t: &GoType| Box::new(substitute(t, map));
    match ty {
        GoType::TypeParam(name) => map.get(name).cloned().unwrap_or_else(|| ty.clone()),
        GoType::Instance { base, args } => GoType::Instance {
            base: base.clone(),
            args: args.iter().map(|a| substitute(a, map)).collect(),
        },
        GoType::Pointer(elem) => GoType::Pointer(sub(elem)),
        GoType::Slice(elem) => GoType::Slice(sub(elem)),
        GoType::Array { len, elem } => GoType::Array {
            len: len.clone(),
            elem: sub(elem),
        },
        GoType::Map { key, value } => GoType::Map {
            key: sub(key),
            value: sub(value),
        },
        GoType::Chan { dir, elem } => GoType::Chan {
            dir: *dir,
            elem: sub(elem),
        },
        GoType::Func(sig) => GoType::Func(substitute_signature(sig, map)),
        GoType::Interface(shape) => GoType::Interface(InterfaceShape {
            methods: shape
                .methods
                .iter()
                .map(|(name, sig)| (name.clone(), substitute_signature(sig, map)))
                .collect(),
            incomplete: shape.incomplete,
        }),
        GoType::Struct(shape) => GoType::Struct(StructShape {
            fields: shape
                .fields
                .iter()
                .map(|f| super::types::StructField {
                    name: f.name.clone(),
                    ty: substitute(&f.ty, map),
                    embedded: f.embedded,
                })
                .collect(),
        }),
        GoType::Tuple(values) => GoType::Tuple(values.iter().map(|v| substitute(v, map)).collect()),
        other => other.clone(),
    }
}

fn substitute_signature(sig: &Signature, map: &HashMap<String, GoType>) -> Signature {
    Signature {
        params: sig.params.iter().map(|t| substitute(t, map)).collect(),
        results: sig.results.iter().map(|t| substitute(t, map)).collect(),
        variadic: sig.variadic,
    }
}
