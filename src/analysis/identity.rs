//! Interface identity comparator and structural type equality.
//!
//! Two interfaces are identical when they have the same number of methods and
//! every method of one has a same-named method in the other with an identical
//! signature. Method order never matters; parameter and result order does.
//! Named types are compared by declaration identity, everything else
//! structurally. `Unknown` is identical to nothing.

use super::types::{GoType, InterfaceShape, Signature, StructShape};

/// Structural type identity.
pub fn identical(a: &GoType, b: &GoType) -> bool {
    match (a, b) {
        (GoType::Unknown, _) | (_, GoType::Unknown) => false,
        (GoType::Basic(x), GoType::Basic(y)) => basic_name(x) == basic_name(y),
        (GoType::Named(x), GoType::Named(y)) => x == y,
        (
            GoType::Instance { base: b1, args: a1 },
            GoType::Instance { base: b2, args: a2 },
        ) => b1 == b2 && all_identical(a1, a2),
        (GoType::TypeParam(x), GoType::TypeParam(y)) => x == y,
        (GoType::Pointer(x), GoType::Pointer(y)) => identical(x, y),
        (GoType::Slice(x), GoType::Slice(y)) => identical(x, y),
        (GoType::Array { len: l1, elem: e1 }, GoType::Array { len: l2, elem: e2 }) => {
            l1 == l2 && identical(e1, e2)
        }
        (GoType::Map { key: k1, value: v1 }, GoType::Map { key: k2, value: v2 }) => {
            identical(k1, k2) && identical(v1, v2)
        }
        (GoType::Chan { dir: d1, elem: e1 }, GoType::Chan { dir: d2, elem: e2 }) => {
            d1 == d2 && identical(e1, e2)
        }
        (GoType::Func(x), GoType::Func(y)) => identical_signatures(x, y),
        (GoType::Interface(x), GoType::Interface(y)) => identical_interfaces(x, y),
        (GoType::Struct(x), GoType::Struct(y)) => identical_structs(x, y),
        (GoType::Tuple(x), GoType::Tuple(y)) => all_identical(x, y),
        _ => false,
    }
}

/// `byte` and `rune` are aliases of `uint8` and `int32`.
fn basic_name(name: &str) -> &str {
    match name {
        "byte" => "uint8",
        "rune" => "int32",
        other => other,
    }
}

fn all_identical(a: &[GoType], b: &[GoType]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| identical(x, y))
}

/// Signature identity: same variadicity, pairwise identical params and results.
pub fn identical_signatures(a: &Signature, b: &Signature) -> bool {
    a.variadic == b.variadic && all_identical(&a.params, &b.params) && all_identical(&a.results, &b.results)
}

/// Interface identity by method set.
///
/// An interface whose method set is only partially known never compares
/// identical, since equal visible parts prove nothing about the rest.
pub fn identical_interfaces(a: &InterfaceShape, b: &InterfaceShape) -> bool {
    if a.incomplete || b.incomplete {
        return false;
    }
    if a.len() != b.len() {
        return false;
    }
    a.methods.iter().all(|(name, sig)| {
        b.method(name)
            .map(|other| identical_signatures(sig, other))
            .unwrap_or(false)
    })
}

fn identical_structs(a: &StructShape, b: &StructShape) -> bool {
    a.fields.len() == b.fields.len()
        && a.fields.iter().zip(&b.fields).all(|(x, y)| {
            x.name == y.name && x.embedded == y.embedded && identical(&x.ty, &y.ty)
        })
}

/// Whether `shape` declares `method` with exactly `sig`.
pub fn has_identical_method(shape: &InterfaceShape, method: &str, sig: &Signature) -> bool {
    shape
        .method(method)
        .map(|own| identical_signatures(own, sig))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{ChanDir, TypeName};
    use std::collections::BTreeMap;

    fn string() -> GoType {
        GoType::basic("string")
    }

    fn error() -> GoType {
        GoType::Named(TypeName::error())
    }

    fn sig(params: Vec<GoType>, results: Vec<GoType>) -> Signature {
        Signature {
            params,
            results,
            variadic: false,
        }
    }

    fn shape(methods: &[(&str, Signature)]) -> InterfaceShape {
        InterfaceShape {
            methods: methods
                .iter()
                .map(|(name, sig)| (name.to_string(), sig.clone()))
                .collect::<BTreeMap<_, _>>(),
            incomplete: false,
        }
    }

    #[test]
    fn test_identical_ignores_method_order() {
        let a = shape(&[
            ("Get", sig(vec![string()], vec![string(), error()])),
            ("Close", sig(vec![], vec![error()])),
        ]);
        let b = shape(&[
            ("Close", sig(vec![], vec![error()])),
            ("Get", sig(vec![string()], vec![string(), error()])),
        ]);
        assert!(identical_interfaces(&a, &b));
        assert!(identical_interfaces(&b, &a));
    }

    #[test]
    fn test_parameter_order_matters() {
        let a = shape(&[("Put", sig(vec![string(), GoType::basic("int")], vec![]))]);
        let b = shape(&[("Put", sig(vec![GoType::basic("int"), string()], vec![]))]);
        assert!(!identical_interfaces(&a, &b));
        assert!(!identical_interfaces(&b, &a));
    }

    #[test]
    fn test_different_method_counts() {
        let a = shape(&[("Process", sig(vec![string()], vec![error()]))]);
        let b = shape(&[
            ("Process", sig(vec![string()], vec![error()])),
            ("Extra", sig(vec![], vec![GoType::basic("bool")])),
        ]);
        assert!(!identical_interfaces(&a, &b));
        assert!(!identical_interfaces(&b, &a));
        assert!(has_identical_method(&b, "Process", &sig(vec![string()], vec![error()])));
    }

    #[test]
    fn test_same_name_different_signature() {
        let v1 = sig(vec![string()], vec![error()]);
        let v2 = sig(
            vec![
                string(),
                GoType::Map {
                    key: Box::new(string()),
                    value: Box::new(GoType::empty_interface()),
                },
            ],
            vec![error()],
        );
        assert!(!identical_signatures(&v1, &v2));
        assert!(!has_identical_method(&shape(&[("Process", v2)]), "Process", &v1));
    }

    #[test]
    fn test_unknown_is_never_identical() {
        assert!(!identical(&GoType::Unknown, &GoType::Unknown));
        let a = sig(vec![GoType::Unknown], vec![]);
        assert!(!identical_signatures(&a, &a.clone()));
    }

    #[test]
    fn test_incomplete_interfaces_never_identical() {
        let mut a = shape(&[("Read", sig(vec![], vec![]))]);
        a.incomplete = true;
        assert!(!identical_interfaces(&a, &a.clone()));
    }

    #[test]
    fn test_structural_types() {
        let recv = GoType::Chan {
            dir: ChanDir::Recv,
            elem: Box::new(string()),
        };
        let send = GoType::Chan {
            dir: ChanDir::Send,
            elem: Box::new(string()),
        };
        assert!(identical(&recv, &recv.clone()));
        assert!(!identical(&recv, &send));
        assert!(identical(&GoType::basic("byte"), &GoType::basic("uint8")));
        assert!(identical(&GoType::empty_interface(), &GoType::empty_interface()));
        assert!(!identical(
            &GoType::Named(TypeName::new("m/a", "T")),
            &GoType::Named(TypeName::new("m/b", "T"))
        ));
    }

    #[test]
    fn test_variadic_distinguished() {
        let plain = sig(vec![GoType::slice(string())], vec![]);
        let mut variadic = plain.clone();
        variadic.variadic = true;
        assert!(!identical_signatures(&plain, &variadic));
    }
}
