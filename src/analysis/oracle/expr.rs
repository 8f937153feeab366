//! Static types of expressions and meaning of type expressions.

use tree_sitter::Node;

use super::{GoOracle, MAX_DEPTH};
use crate::analysis::syntax::{self, BUILTIN_FUNCS};
use crate::analysis::traits::{Binding, FileRef, Member};
use crate::analysis::types::{
    ChanDir, GoType, InterfaceShape, Signature, StructField, StructShape, TypeName,
};

const COMPARISON_OPERATORS: &[&str] = &["==", "!=", "<", "<=", ">", ">=", "&&", "||"];

impl GoOracle<'_> {
    pub(super) fn expr_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        if depth > MAX_DEPTH {
            return GoType::Unknown;
        }
        match node.kind() {
            "identifier" => match self.lookup(at, node, depth + 1) {
                Binding::Var(ty) => ty,
                Binding::Func(sig) => GoType::Func(sig),
                _ => GoType::Unknown,
            },
            "int_literal" => GoType::basic("int"),
            "float_literal" => GoType::basic("float64"),
            "imaginary_literal" => GoType::basic("complex128"),
            "rune_literal" => GoType::basic("rune"),
            "interpreted_string_literal" | "raw_string_literal" => GoType::basic("string"),
            "true" | "false" => GoType::basic("bool"),
            "iota" => GoType::basic("int"),
            "parenthesized_expression" => match syntax::first_named(node) {
                Some(inner) => self.expr_type(at, inner, depth + 1),
                None => GoType::Unknown,
            },
            "unary_expression" => self.unary_type(at, node, depth),
            "binary_expression" => self.binary_type(at, node, depth),
            "selector_expression" => self.selector_type(at, node, depth),
            "call_expression" => self.call_type(at, node, depth),
            "type_assertion_expression" | "type_conversion_expression" | "composite_literal" => {
                match node.child_by_field_name("type") {
                    Some(ty) => self.type_expr(at, ty, depth + 1),
                    None => GoType::Unknown,
                }
            }
            "func_literal" => GoType::Func(self.signature(
                at,
                node.child_by_field_name("parameters"),
                node.child_by_field_name("result"),
                depth + 1,
            )),
            "index_expression" => self.index_type(at, node, depth),
            "slice_expression" => {
                let Some(operand) = node.child_by_field_name("operand") else {
                    return GoType::Unknown;
                };
                let ty = self.expr_type(at, operand, depth + 1);
                match self.underlying_at(&ty, depth + 1) {
                    GoType::Array { elem, .. } => GoType::Slice(elem),
                    GoType::Pointer(inner) => match self.underlying_at(&inner, depth + 1) {
                        GoType::Array { elem, .. } => GoType::Slice(elem),
                        _ => GoType::Unknown,
                    },
                    _ => ty,
                }
            }
            _ => GoType::Unknown,
        }
    }

    fn unary_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        let (Some(operator), Some(operand)) = (
            node.child_by_field_name("operator"),
            node.child_by_field_name("operand"),
        ) else {
            return GoType::Unknown;
        };
        let inner = self.expr_type(at, operand, depth + 1);
        match self.text(at, operator) {
            "&" => GoType::pointer(inner),
            "*" => match inner {
                GoType::Pointer(elem) => *elem,
                other => match self.underlying_at(&other, depth + 1) {
                    GoType::Pointer(elem) => *elem,
                    _ => GoType::Unknown,
                },
            },
            "<-" => match self.underlying_at(&inner, depth + 1) {
                GoType::Chan { elem, .. } => *elem,
                _ => GoType::Unknown,
            },
            "!" => GoType::basic("bool"),
            _ => inner,
        }
    }

    fn binary_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.text(at, op))
            .unwrap_or("");
        if COMPARISON_OPERATORS.contains(&operator) {
            return GoType::basic("bool");
        }
        let left = node
            .child_by_field_name("left")
            .map(|l| self.expr_type(at, l, depth + 1))
            .unwrap_or(GoType::Unknown);
        if operator == "<<" || operator == ">>" {
            return left;
        }
        // An untyped constant operand takes the type of the other side.
        let left_is_literal = node
            .child_by_field_name("left")
            .map(|l| l.kind().ends_with("_literal"))
            .unwrap_or(false);
        if left.is_unknown() || left_is_literal {
            if let Some(right) = node.child_by_field_name("right") {
                let right = self.expr_type(at, right, depth + 1);
                if !right.is_unknown() {
                    return right;
                }
            }
        }
        left
    }

    fn selector_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        let (Some(operand), Some(field)) = (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) else {
            return GoType::Unknown;
        };
        let name = self.text(at, field);
        if operand.kind() == "identifier" {
            if let Binding::Package(path) = self.lookup(at, operand, depth + 1) {
                return match self.package_member(&path, name, depth) {
                    Binding::Var(ty) => ty,
                    Binding::Func(sig) => GoType::Func(sig),
                    _ => GoType::Unknown,
                };
            }
        }
        let base = self.expr_type(at, operand, depth + 1);
        match self.member_at(&base, name, depth + 1) {
            Some(Member::Field(ty)) => ty,
            Some(Member::Method(sig)) => GoType::Func(sig),
            None => GoType::Unknown,
        }
    }

    /// Exported member of another package of the project.
    pub(super) fn package_member(&self, path: &str, name: &str, depth: usize) -> Binding {
        match self.project.unit_by_import_path(path) {
            Some(unit) if self.is_resolved(unit) => {
                self.package_binding(FileRef { unit, file: 0 }, name, depth + 1)
            }
            _ => Binding::Unknown,
        }
    }

    fn call_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        let Some(function) = node.child_by_field_name("function") else {
            return GoType::Unknown;
        };
        if let Some(target) = self.conversion_target(at, function, depth) {
            return target;
        }
        if function.kind() == "identifier" {
            let name = self.text(at, function);
            if BUILTIN_FUNCS.contains(name)
                && matches!(self.lookup(at, function, depth + 1), Binding::Unknown)
            {
                return self.builtin_call(at, name, node, depth);
            }
        }
        let callee = self.expr_type(at, function, depth + 1);
        match self.underlying_at(&callee, depth + 1) {
            GoType::Func(sig) => match sig.results.len() {
                1 => sig.results.into_iter().next().unwrap_or(GoType::Unknown),
                _ => GoType::Tuple(sig.results),
            },
            _ => GoType::Unknown,
        }
    }

    /// The target type when a call expression is really a conversion.
    fn conversion_target(&self, at: FileRef, function: Node, depth: usize) -> Option<GoType> {
        match function.kind() {
            "identifier" => match self.lookup(at, function, depth + 1) {
                Binding::Type(ty) => Some(ty),
                _ => None,
            },
            "selector_expression" => {
                let operand = function.child_by_field_name("operand")?;
                let field = function.child_by_field_name("field")?;
                if operand.kind() != "identifier" {
                    return None;
                }
                let Binding::Package(path) = self.lookup(at, operand, depth + 1) else {
                    return None;
                };
                match self.package_member(&path, self.text(at, field), depth) {
                    Binding::Type(ty) => Some(ty),
                    _ => None,
                }
            }
            "parenthesized_expression" => {
                let inner = syntax::first_named(function)?;
                if inner.kind() == "unary_expression" {
                    let operator = inner.child_by_field_name("operator")?;
                    let operand = inner.child_by_field_name("operand")?;
                    if self.text(at, operator) == "*" {
                        return self
                            .conversion_target(at, operand, depth + 1)
                            .map(GoType::pointer);
                    }
                    return None;
                }
                self.conversion_target(at, inner, depth + 1)
            }
            "pointer_type" | "slice_type" | "array_type" | "map_type" | "channel_type"
            | "function_type" | "interface_type" | "parenthesized_type" | "qualified_type" => {
                Some(self.type_expr(at, function, depth + 1))
            }
            _ => None,
        }
    }

    fn builtin_call(&self, at: FileRef, name: &str, call: Node, depth: usize) -> GoType {
        let args = call
            .child_by_field_name("arguments")
            .map(|list| {
                syntax::named_children(list)
                    .into_iter()
                    .filter(|n| n.kind() != "comment")
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let first = args.first().copied();
        match name {
            "new" => first
                .map(|t| GoType::pointer(self.type_expr(at, t, depth + 1)))
                .unwrap_or(GoType::Unknown),
            "make" => first
                .map(|t| self.type_expr(at, t, depth + 1))
                .unwrap_or(GoType::Unknown),
            "append" | "min" | "max" => first
                .map(|e| self.expr_type(at, e, depth + 1))
                .unwrap_or(GoType::Unknown),
            "len" | "cap" | "copy" => GoType::basic("int"),
            "recover" => GoType::empty_interface(),
            "real" | "imag" => GoType::basic("float64"),
            "complex" => GoType::basic("complex128"),
            _ => GoType::Tuple(Vec::new()),
        }
    }

    fn index_type(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        let Some(operand) = node.child_by_field_name("operand") else {
            return GoType::Unknown;
        };
        let base = self.expr_type(at, operand, depth + 1);
        match self.underlying_at(&base, depth + 1) {
            GoType::Slice(elem) | GoType::Array { elem, .. } => *elem,
            GoType::Pointer(inner) => match self.underlying_at(&inner, depth + 1) {
                GoType::Array { elem, .. } => *elem,
                _ => GoType::Unknown,
            },
            GoType::Map { value, .. } => *value,
            GoType::Basic(name) if name == "string" => GoType::basic("byte"),
            // Explicit instantiation of a generic function.
            GoType::Func(sig) => GoType::Func(sig),
            _ => GoType::Unknown,
        }
    }

    /// Type of the `index`-th value produced by `expr` on the right-hand
    /// side of a multi-value assignment. `comma_ok` marks the forms that
    /// yield an extra `bool` (`x.(T)`, `m[k]`, `<-ch`).
    pub(super) fn tuple_element(
        &self,
        at: FileRef,
        expr: Node,
        index: usize,
        comma_ok: bool,
        depth: usize,
    ) -> GoType {
        let comma_ok_form = match expr.kind() {
            "type_assertion_expression" | "index_expression" => true,
            "unary_expression" => expr
                .child_by_field_name("operator")
                .map(|op| self.text(at, op) == "<-")
                .unwrap_or(false),
            _ => false,
        };
        if comma_ok && comma_ok_form {
            return match index {
                0 => self.expr_type(at, expr, depth + 1),
                1 => GoType::basic("bool"),
                _ => GoType::Unknown,
            };
        }
        match self.expr_type(at, expr, depth + 1) {
            GoType::Tuple(values) => values.get(index).cloned().unwrap_or(GoType::Unknown),
            single if index == 0 => single,
            _ => GoType::Unknown,
        }
    }

    pub(super) fn type_expr(&self, at: FileRef, node: Node, depth: usize) -> GoType {
        if depth > MAX_DEPTH {
            return GoType::Unknown;
        }
        match node.kind() {
            "type_identifier" | "identifier" => {
                let name = self.text(at, node);
                if self.is_type_param(at, node, name) {
                    return GoType::TypeParam(name.to_string());
                }
                match self.lookup(at, node, depth + 1) {
                    Binding::Type(ty) => ty,
                    _ => GoType::Unknown,
                }
            }
            "qualified_type" | "selector_expression" => {
                let (package, name) = if node.kind() == "qualified_type" {
                    (
                        node.child_by_field_name("package"),
                        node.child_by_field_name("name"),
                    )
                } else {
                    (
                        node.child_by_field_name("operand"),
                        node.child_by_field_name("field"),
                    )
                };
                let (Some(package), Some(name)) = (package, name) else {
                    return GoType::Unknown;
                };
                let Binding::Package(path) = self.lookup(at, package, depth + 1) else {
                    return GoType::Unknown;
                };
                self.qualified_type(&path, self.text(at, name), depth)
            }
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|t| self.type_expr(at, t, depth + 1))
                    .unwrap_or(GoType::Unknown);
                let args = node
                    .child_by_field_name("type_arguments")
                    .map(|list| {
                        syntax::named_children(list)
                            .into_iter()
                            .map(|arg| self.type_expr(at, arg, depth + 1))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                match base {
                    GoType::Named(name) => GoType::Instance { base: name, args },
                    other => other,
                }
            }
            "pointer_type" => syntax::first_named(node)
                .map(|elem| GoType::pointer(self.type_expr(at, elem, depth + 1)))
                .unwrap_or(GoType::Unknown),
            "slice_type" => node
                .child_by_field_name("element")
                .map(|elem| GoType::slice(self.type_expr(at, elem, depth + 1)))
                .unwrap_or(GoType::Unknown),
            "array_type" | "implicit_length_array_type" => {
                let len = node
                    .child_by_field_name("length")
                    .map(|l| syntax::squash_whitespace(self.text(at, l)))
                    .unwrap_or_else(|| "...".to_string());
                match node.child_by_field_name("element") {
                    Some(elem) => GoType::Array {
                        len,
                        elem: Box::new(self.type_expr(at, elem, depth + 1)),
                    },
                    None => GoType::Unknown,
                }
            }
            "map_type" => match (
                node.child_by_field_name("key"),
                node.child_by_field_name("value"),
            ) {
                (Some(key), Some(value)) => GoType::Map {
                    key: Box::new(self.type_expr(at, key, depth + 1)),
                    value: Box::new(self.type_expr(at, value, depth + 1)),
                },
                _ => GoType::Unknown,
            },
            "channel_type" => {
                let dir = match node.child(0).map(|c| c.kind()) {
                    Some("<-") => ChanDir::Recv,
                    _ if syntax::has_token(node, "<-") => ChanDir::Send,
                    _ => ChanDir::Both,
                };
                match node.child_by_field_name("value") {
                    Some(elem) => GoType::Chan {
                        dir,
                        elem: Box::new(self.type_expr(at, elem, depth + 1)),
                    },
                    None => GoType::Unknown,
                }
            }
            "function_type" => GoType::Func(self.signature(
                at,
                node.child_by_field_name("parameters"),
                node.child_by_field_name("result"),
                depth + 1,
            )),
            "interface_type" => GoType::Interface(self.interface_shape(at, node, depth + 1)),
            "struct_type" => GoType::Struct(self.struct_shape(at, node, depth + 1)),
            "parenthesized_type" | "parenthesized_expression" => syntax::first_named(node)
                .map(|inner| self.type_expr(at, inner, depth + 1))
                .unwrap_or(GoType::Unknown),
            "type_elem" | "type_constraint" => {
                let parts = syntax::named_children(node);
                match parts.as_slice() {
                    [single] => self.type_expr(at, *single, depth + 1),
                    _ => GoType::Unknown,
                }
            }
            "unary_expression" => {
                let operator = node.child_by_field_name("operator");
                let operand = node.child_by_field_name("operand");
                match (operator, operand) {
                    (Some(op), Some(operand)) if self.text(at, op) == "*" => {
                        GoType::pointer(self.type_expr(at, operand, depth + 1))
                    }
                    _ => GoType::Unknown,
                }
            }
            _ => GoType::Unknown,
        }
    }

    /// A type named through a package qualifier.
    ///
    /// Packages outside the project still yield a comparable name; only
    /// their shapes stay unknown.
    fn qualified_type(&self, path: &str, name: &str, depth: usize) -> GoType {
        match self.package_member(path, name, depth) {
            Binding::Type(ty) => ty,
            _ => GoType::Named(TypeName::new(path, name)),
        }
    }

    /// Whether `name` is a type parameter of an enclosing generic
    /// declaration.
    fn is_type_param(&self, at: FileRef, node: Node, name: &str) -> bool {
        let mut current = node.parent();
        while let Some(scope) = current {
            match scope.kind() {
                "function_declaration" | "type_spec" | "type_alias" => {
                    if let Some(list) = scope.child_by_field_name("type_parameters") {
                        let declared = syntax::named_children(list)
                            .into_iter()
                            .flat_map(|decl| syntax::field_children(decl, "name"))
                            .any(|n| self.text(at, n) == name);
                        if declared {
                            return true;
                        }
                    }
                }
                "method_declaration" => {
                    if self.receiver_type_params(at, scope).iter().any(|p| p == name) {
                        return true;
                    }
                }
                _ => {}
            }
            current = scope.parent();
        }
        false
    }

    /// Constraint declared for the type parameter `name` in scope at `node`.
    ///
    /// Parameters bound by a generic method receiver are declared on the
    /// receiver's type and stay unknown here.
    pub(super) fn type_param_constraint(&self, at: FileRef, node: Node, name: &str, depth: usize) -> GoType {
        let mut current = node.parent();
        while let Some(scope) = current {
            if matches!(scope.kind(), "function_declaration" | "type_spec" | "type_alias") {
                let declared = scope
                    .child_by_field_name("type_parameters")
                    .into_iter()
                    .flat_map(syntax::named_children)
                    .find(|decl| {
                        syntax::field_children(*decl, "name")
                            .iter()
                            .any(|n| self.text(at, *n) == name)
                    });
                if let Some(decl) = declared {
                    return decl
                        .child_by_field_name("type")
                        .map(|constraint| self.type_expr(at, constraint, depth + 1))
                        .unwrap_or(GoType::Unknown);
                }
            }
            current = scope.parent();
        }
        GoType::Unknown
    }

    pub(super) fn signature(
        &self,
        at: FileRef,
        params: Option<Node>,
        result: Option<Node>,
        depth: usize,
    ) -> Signature {
        let mut sig = Signature::default();
        if let Some(list) = params {
            sig.variadic = self.collect_params(at, list, &mut sig.params, depth);
        }
        if let Some(result) = result {
            if result.kind() == "parameter_list" {
                self.collect_params(at, result, &mut sig.results, depth);
            } else {
                sig.results.push(self.type_expr(at, result, depth + 1));
            }
        }
        sig
    }

    /// Append one type per declared name. Returns whether the list ends in a
    /// variadic parameter.
    fn collect_params(&self, at: FileRef, list: Node, out: &mut Vec<GoType>, depth: usize) -> bool {
        let mut variadic = false;
        for param in syntax::named_children(list) {
            let ty = param
                .child_by_field_name("type")
                .map(|t| self.type_expr(at, t, depth + 1))
                .unwrap_or(GoType::Unknown);
            match param.kind() {
                "parameter_declaration" => {
                    let names = syntax::field_children(param, "name").len().max(1);
                    out.extend(std::iter::repeat(ty).take(names));
                }
                "variadic_parameter_declaration" => {
                    out.push(GoType::slice(ty));
                    variadic = true;
                }
                _ => {}
            }
        }
        variadic
    }

    /// Method set of an interface type literal, with embedded interfaces
    /// of the project flattened in.
    pub(super) fn interface_shape(&self, at: FileRef, node: Node, depth: usize) -> InterfaceShape {
        let mut shape = InterfaceShape::default();
        if depth > MAX_DEPTH {
            shape.incomplete = true;
            return shape;
        }
        for elem in syntax::named_children(node) {
            match elem.kind() {
                "method_elem" | "method_spec" => {
                    let Some(name) = elem.child_by_field_name("name") else {
                        continue;
                    };
                    let sig = self.signature(
                        at,
                        elem.child_by_field_name("parameters"),
                        elem.child_by_field_name("result"),
                        depth + 1,
                    );
                    shape.methods.insert(self.text(at, name).to_string(), sig);
                }
                "type_elem" | "constraint_elem" | "interface_type_name" => {
                    let embedded = self.type_expr(at, elem, depth + 1);
                    match self.underlying_at(&embedded, depth + 1) {
                        GoType::Interface(inner) => {
                            shape.incomplete |= inner.incomplete;
                            for (name, sig) in inner.methods {
                                shape.methods.entry(name).or_insert(sig);
                            }
                        }
                        _ => shape.incomplete = true,
                    }
                }
                _ => {}
            }
        }
        shape
    }

    fn struct_shape(&self, at: FileRef, node: Node, depth: usize) -> StructShape {
        let mut shape = StructShape::default();
        let Some(list) = syntax::named_children(node)
            .into_iter()
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return shape;
        };
        for decl in syntax::named_children(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let Some(type_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let ty = self.type_expr(at, type_node, depth + 1);
            let names = syntax::field_children(decl, "name");
            if names.is_empty() {
                let ty = if syntax::has_token(decl, "*") {
                    GoType::pointer(ty)
                } else {
                    ty
                };
                shape.fields.push(StructField {
                    name: embedded_field_name(self.text(at, type_node)),
                    ty,
                    embedded: true,
                });
            } else {
                for name in names {
                    shape.fields.push(StructField {
                        name: self.text(at, name).to_string(),
                        ty: ty.clone(),
                        embedded: false,
                    });
                }
            }
        }
        shape
    }
}

/// Field name of an embedded field: `*pkg.Base[T]` gives `Base`.
fn embedded_field_name(type_text: &str) -> String {
    let without_args = type_text.split('[').next().unwrap_or(type_text);
    without_args
        .trim_start_matches('*')
        .rsplit('.')
        .next()
        .unwrap_or(without_args)
        .trim()
        .to_string()
}
