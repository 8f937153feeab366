//! Resolved, language-neutral type descriptors produced by the type oracle.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Identity of a declared (named) type: the import path of its package plus
/// its name. Predeclared types such as `error` use an empty package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// The predeclared `error` interface.
    pub fn error() -> Self {
        Self::new("", "error")
    }

    pub fn is_predeclared(&self) -> bool {
        self.package.is_empty()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

/// A resolved type.
///
/// `Unknown` marks anything the oracle could not resolve; it is never
/// identical to any type, including another `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoType {
    /// Predeclared non-interface type (`int`, `string`, `bool`, ...).
    Basic(String),
    /// Reference to a declared type.
    Named(TypeName),
    /// Instantiation of a generic declared type.
    Instance { base: TypeName, args: Vec<GoType> },
    /// Type parameter of an enclosing generic declaration.
    TypeParam(String),
    Pointer(Box<GoType>),
    Slice(Box<GoType>),
    Array { len: String, elem: Box<GoType> },
    Map { key: Box<GoType>, value: Box<GoType> },
    Chan { dir: ChanDir, elem: Box<GoType> },
    Func(Signature),
    Interface(InterfaceShape),
    Struct(StructShape),
    /// Multiple values of a call expression.
    Tuple(Vec<GoType>),
    Unknown,
}

impl GoType {
    pub fn basic(name: &str) -> Self {
        GoType::Basic(name.to_string())
    }

    pub fn pointer(elem: GoType) -> Self {
        GoType::Pointer(Box::new(elem))
    }

    pub fn slice(elem: GoType) -> Self {
        GoType::Slice(Box::new(elem))
    }

    /// The empty interface (`interface{}` / `any`).
    pub fn empty_interface() -> Self {
        GoType::Interface(InterfaceShape::default())
    }

    /// The declared type name, if this is a named type or an instantiation.
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            GoType::Named(name) => Some(name),
            GoType::Instance { base, .. } => Some(base),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, GoType::Unknown)
    }
}

impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoType::Basic(name) => write!(f, "{}", name),
            GoType::Named(name) => write!(f, "{}", name),
            GoType::Instance { base, args } => {
                write!(f, "{}[{}]", base, join(args))
            }
            GoType::TypeParam(name) => write!(f, "{}", name),
            GoType::Pointer(elem) => write!(f, "*{}", elem),
            GoType::Slice(elem) => write!(f, "[]{}", elem),
            GoType::Array { len, elem } => write!(f, "[{}]{}", len, elem),
            GoType::Map { key, value } => write!(f, "map[{}]{}", key, value),
            GoType::Chan { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {}", elem),
                ChanDir::Send => write!(f, "chan<- {}", elem),
                ChanDir::Recv => write!(f, "<-chan {}", elem),
            },
            GoType::Func(sig) => write!(f, "func{}", sig),
            GoType::Interface(shape) => write!(f, "{}", shape),
            GoType::Struct(shape) => {
                write!(f, "struct{{")?;
                for (i, field) in shape.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    if field.embedded {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{} {}", field.name, field.ty)?;
                    }
                }
                write!(f, "}}")
            }
            GoType::Tuple(values) => write!(f, "({})", join(values)),
            GoType::Unknown => write!(f, "<unknown>"),
        }
    }
}

fn join(types: &[GoType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A function or method signature. Parameter names are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub params: Vec<GoType>,
    pub results: Vec<GoType>,
    /// The last parameter is `...T`; it is stored as `[]T`.
    pub variadic: bool,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param {
                GoType::Slice(elem) if self.variadic && i + 1 == self.params.len() => {
                    write!(f, "...{}", elem)?
                }
                other => write!(f, "{}", other)?,
            }
        }
        write!(f, ")")?;
        match self.results.len() {
            0 => Ok(()),
            1 => write!(f, " {}", self.results[0]),
            _ => write!(f, " ({})", join(&self.results)),
        }
    }
}

/// Method set of an interface type, keyed by method name.
///
/// Keying by name makes the set free of duplicates and independent of
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceShape {
    pub methods: BTreeMap<String, Signature>,
    /// An embedded element could not be resolved (external or constraint
    /// type), so the method set above is only a lower bound.
    pub incomplete: bool,
}

impl InterfaceShape {
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn method(&self, name: &str) -> Option<&Signature> {
        self.methods.get(name)
    }
}

impl fmt::Display for InterfaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.methods.is_empty() && !self.incomplete {
            return write!(f, "interface{{}}");
        }
        write!(f, "interface{{")?;
        for (i, (name, sig)) in self.methods.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}{}", name, sig)?;
        }
        if self.incomplete {
            write!(f, "; ...")?;
        }
        write!(f, "}}")
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: GoType,
    pub embedded: bool,
}

/// Field list of a struct type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructShape {
    pub fields: Vec<StructField>,
}

impl StructShape {
    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_display() {
        let sig = Signature {
            params: vec![GoType::basic("string"), GoType::slice(GoType::empty_interface())],
            results: vec![GoType::Named(TypeName::error())],
            variadic: true,
        };
        assert_eq!(sig.to_string(), "(string, ...interface{}) error");

        let multi = Signature {
            params: vec![],
            results: vec![GoType::basic("string"), GoType::basic("bool")],
            variadic: false,
        };
        assert_eq!(multi.to_string(), "() (string, bool)");
    }

    #[test]
    fn test_type_display() {
        let ty = GoType::Map {
            key: Box::new(GoType::basic("string")),
            value: Box::new(GoType::Chan {
                dir: ChanDir::Recv,
                elem: Box::new(GoType::pointer(GoType::Named(TypeName::new("example.com/m", "T")))),
            }),
        };
        assert_eq!(ty.to_string(), "map[string]<-chan *example.com/m.T");
    }
}
