//! Evidence shapes: the syntactic forms that can prove a method is reached
//! through an interface, each with its own resolver.

use std::collections::HashMap;

use serde::Serialize;
use tracing::trace;
use tree_sitter::Node;

use crate::analysis::syntax;
use crate::analysis::{
    has_identical_method, identical_interfaces, Binding, FileRef, GoType, Member, ParsedFile,
    TypeName, TypeOracle,
};
use crate::extract::{Extraction, MethodRef};

/// How a method was found to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// `x.Method(...)`
    DirectCall,
    /// `go x.Method(...)`
    GoroutineCall,
    /// `defer x.Method(...)`
    DeferredCall,
    /// `x.(Iface).Method(...)`
    AssertedCall,
    /// `f := x.Method`
    MethodValue,
    /// A struct field typed with the interface.
    FieldDeclaration,
    /// `reflect.Value.MethodByName("Method")`
    Reflection,
}

impl EvidenceKind {
    /// Weak evidence corroborates but never proves usage.
    pub fn is_weak(self) -> bool {
        matches!(self, EvidenceKind::FieldDeclaration)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceKind::DirectCall => "direct call",
            EvidenceKind::GoroutineCall => "goroutine call",
            EvidenceKind::DeferredCall => "deferred call",
            EvidenceKind::AssertedCall => "call on type assertion",
            EvidenceKind::MethodValue => "method value",
            EvidenceKind::FieldDeclaration => "field declaration",
            EvidenceKind::Reflection => "reflection",
        }
    }
}

/// A syntactic site that may reference interface methods.
#[derive(Debug, Clone)]
pub enum Shape<'t> {
    Call {
        receiver: Node<'t>,
        method: &'t str,
        kind: EvidenceKind,
    },
    MethodValue {
        receiver: Node<'t>,
        method: &'t str,
    },
    FieldDeclaration {
        field_type: Node<'t>,
    },
    Reflection {
        method: String,
    },
}

/// Shapes rooted at one node.
pub fn classify<'t>(node: Node<'t>, file: &'t ParsedFile) -> Vec<Shape<'t>> {
    match node.kind() {
        "call_expression" => classify_call(node, file),
        "selector_expression" => {
            let is_callee = node
                .parent()
                .filter(|p| p.kind() == "call_expression")
                .and_then(|p| p.child_by_field_name("function"))
                .map(|f| f.id() == node.id())
                .unwrap_or(false);
            if is_callee {
                return Vec::new();
            }
            match (node.child_by_field_name("operand"), node.child_by_field_name("field")) {
                (Some(receiver), Some(field)) => vec![Shape::MethodValue {
                    receiver,
                    method: file.node_text(field),
                }],
                _ => Vec::new(),
            }
        }
        "field_declaration" => match node.child_by_field_name("type") {
            Some(field_type) => vec![Shape::FieldDeclaration { field_type }],
            None => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn classify_call<'t>(call: Node<'t>, file: &'t ParsedFile) -> Vec<Shape<'t>> {
    let Some(function) = call.child_by_field_name("function") else {
        return Vec::new();
    };
    let function = unparen(function);
    if function.kind() != "selector_expression" {
        return Vec::new();
    }
    let (Some(receiver), Some(field)) = (
        function.child_by_field_name("operand"),
        function.child_by_field_name("field"),
    ) else {
        return Vec::new();
    };
    let method = file.node_text(field);

    let kind = match call.parent().map(|p| p.kind()) {
        Some("go_statement") => EvidenceKind::GoroutineCall,
        Some("defer_statement") => EvidenceKind::DeferredCall,
        _ if unparen(receiver).kind() == "type_assertion_expression" => EvidenceKind::AssertedCall,
        _ => EvidenceKind::DirectCall,
    };
    let mut shapes = vec![Shape::Call {
        receiver,
        method,
        kind,
    }];

    if method == "MethodByName" {
        let literal = call
            .child_by_field_name("arguments")
            .and_then(syntax::first_named)
            .filter(|arg| {
                matches!(arg.kind(), "interpreted_string_literal" | "raw_string_literal")
            });
        if let Some(literal) = literal {
            shapes.push(Shape::Reflection {
                method: syntax::unquote(file.node_text(literal)),
            });
        }
    }
    shapes
}

fn unparen(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match syntax::first_named(node) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Candidate methods indexed for lookup by the resolvers.
pub struct CandidateIndex<'e> {
    extraction: &'e Extraction,
    by_name: HashMap<&'e str, Vec<MethodRef>>,
    by_type: HashMap<&'e TypeName, usize>,
}

impl<'e> CandidateIndex<'e> {
    pub fn new(extraction: &'e Extraction) -> Self {
        let mut by_name: HashMap<&str, Vec<MethodRef>> = HashMap::new();
        for at in extraction.method_refs() {
            let (_, entry) = extraction.method(at);
            by_name.entry(entry.name.as_str()).or_default().push(at);
        }
        let by_type = extraction
            .interfaces
            .iter()
            .enumerate()
            .map(|(idx, decl)| (&decl.type_name, idx))
            .collect();
        Self {
            extraction,
            by_name,
            by_type,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn named(&self, method: &str) -> &[MethodRef] {
        self.by_name.get(method).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolves shapes to the candidate methods they prove used.
pub struct Resolver<'a> {
    pub oracle: &'a dyn TypeOracle,
    pub index: &'a CandidateIndex<'a>,
}

impl Resolver<'_> {
    pub fn resolve(&self, at: FileRef, shape: &Shape) -> Vec<(MethodRef, EvidenceKind)> {
        match shape {
            Shape::Call {
                receiver,
                method,
                kind,
            } => self.resolve_call(at, *receiver, method, *kind),
            Shape::MethodValue { receiver, method } => self.resolve_method_value(at, *receiver, method),
            Shape::FieldDeclaration { field_type } => self.resolve_field(at, *field_type),
            Shape::Reflection { method } => self.resolve_reflection(method),
        }
    }

    fn resolve_call(
        &self,
        at: FileRef,
        receiver: Node,
        method: &str,
        kind: EvidenceKind,
    ) -> Vec<(MethodRef, EvidenceKind)> {
        let candidates = self.index.named(method);
        if candidates.is_empty() || self.is_package(at, receiver) {
            return Vec::new();
        }
        let ty = self.receiver_type(at, receiver);
        if ty.is_unknown() {
            trace!(method, "receiver type unresolved");
            return Vec::new();
        }
        self.matching(&ty, candidates, kind)
    }

    /// Like a call, but plain struct field reads never count.
    fn resolve_method_value(
        &self,
        at: FileRef,
        receiver: Node,
        method: &str,
    ) -> Vec<(MethodRef, EvidenceKind)> {
        let candidates = self.index.named(method);
        if candidates.is_empty() || self.is_package(at, receiver) {
            return Vec::new();
        }
        let ty = self.receiver_type(at, receiver);
        if ty.is_unknown() || matches!(self.oracle.member(&ty, method), Some(Member::Field(_))) {
            return Vec::new();
        }
        self.matching(&ty, candidates, EvidenceKind::MethodValue)
    }

    /// A field typed with a tracked interface, or with one identical to it,
    /// weakly supports every method of that interface. Only bare type names
    /// count: an interface injected from another package through a
    /// qualified field type is no evidence for it.
    fn resolve_field(&self, at: FileRef, field_type: Node) -> Vec<(MethodRef, EvidenceKind)> {
        if field_type.kind() != "type_identifier" {
            return Vec::new();
        }
        let ty = self.oracle.resolve_type(at, field_type);
        let shape = match self.oracle.underlying(&ty) {
            GoType::Interface(shape) => shape,
            _ => return Vec::new(),
        };
        let declared = ty
            .type_name()
            .and_then(|name| self.index.by_type.get(name))
            .copied();
        self.index
            .extraction
            .interfaces
            .iter()
            .enumerate()
            .filter(|(idx, decl)| Some(*idx) == declared || identical_interfaces(&shape, &decl.shape))
            .flat_map(|(interface, decl)| {
                (0..decl.methods.len()).map(move |method| {
                    (MethodRef { interface, method }, EvidenceKind::FieldDeclaration)
                })
            })
            .collect()
    }

    /// Reflection names a method but not its interface, so it counts for
    /// every tracked method of that name.
    fn resolve_reflection(&self, method: &str) -> Vec<(MethodRef, EvidenceKind)> {
        self.index
            .named(method)
            .iter()
            .map(|at| (*at, EvidenceKind::Reflection))
            .collect()
    }

    /// Static type a method is selected on.
    ///
    /// A type parameter stands for its constraint. A receiver that denotes a
    /// type rather than a value (`Logger.Debug`, `(*T).Close`) is a method
    /// expression and selects on that type.
    fn receiver_type(&self, at: FileRef, receiver: Node) -> GoType {
        match self.oracle.type_of(at, receiver) {
            GoType::TypeParam(name) => self.oracle.constraint_of(at, receiver, &name),
            GoType::Unknown => self.oracle.resolve_type(at, receiver),
            ty => ty,
        }
    }

    fn is_package(&self, at: FileRef, receiver: Node) -> bool {
        receiver.kind() == "identifier"
            && matches!(self.oracle.binding_of(at, receiver), Binding::Package(_))
    }

    /// Candidates reached by selecting their method on a value of type `ty`.
    ///
    /// The declared interface itself matches by name. Any other interface
    /// matches when it is identical to the declared one, or when it has a
    /// same-named method with an identical signature. Same-named methods
    /// with different signatures never match.
    fn matching(
        &self,
        ty: &GoType,
        candidates: &[MethodRef],
        kind: EvidenceKind,
    ) -> Vec<(MethodRef, EvidenceKind)> {
        let underlying = self.oracle.underlying(ty);
        candidates
            .iter()
            .filter(|at| {
                let (decl, entry) = self.index.extraction.method(**at);
                if matches!(ty, GoType::Named(name) if *name == decl.type_name) {
                    return true;
                }
                match &underlying {
                    GoType::Interface(shape) => {
                        identical_interfaces(shape, &decl.shape)
                            || has_identical_method(shape, &entry.name, &entry.signature)
                    }
                    _ => false,
                }
            })
            .map(|at| (*at, kind))
            .collect()
    }
}
