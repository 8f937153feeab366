//! Interface extraction.
//!
//! Finds every package-level interface declaration, splits generic ones off
//! as warnings and records the directly declared methods of the rest,
//! together with the oracle's resolved method set for identity checks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use streaming_iterator::StreamingIterator;
use tracing::{debug, warn};
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::syntax::{self, Span, GO_LANGUAGE};
use crate::analysis::{
    FileRef, GoOracle, GoType, InterfaceShape, Position, Project, Signature, TypeName, TypeOracle,
};
use crate::error::LoadError;

/// Tree-sitter query for interface type declarations.
const INTERFACE_QUERY: &str = r#"
(type_declaration
  (type_spec
    name: (type_identifier) @name
    type: (interface_type) @body
  ) @spec
)
"#;

/// Compound identity of an interface declaration.
///
/// Two interfaces with the same name in different packages are different
/// entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct InterfaceId {
    /// Import path of the declaring package.
    pub package: String,
    pub name: String,
    pub position: Position,
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// A method declared directly in an interface body.
#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    /// Resolved signature, compared structurally.
    pub signature: Signature,
    /// Signature as written, for reports.
    pub rendered: String,
    pub position: Position,
    /// Byte span of the method element in its file.
    pub span: Span,
}

/// A concrete (non-generic) interface and its declared methods.
#[derive(Debug, Clone)]
pub struct InterfaceDeclaration {
    pub id: InterfaceId,
    pub type_name: TypeName,
    pub file: FileRef,
    /// Declaring file relative to the module root.
    pub module_path: PathBuf,
    /// Declared inside a function body.
    pub local: bool,
    /// Resolved method set, including flattened embeddings.
    pub shape: InterfaceShape,
    pub methods: Vec<MethodEntry>,
}

/// An interface with type parameters, excluded from analysis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GenericInterfaceWarning {
    pub package: String,
    pub interface_name: String,
    /// Type parameter list as written, e.g. `[T any]`.
    pub type_params: String,
    pub position: Position,
    /// Number of named methods declared in the body.
    pub method_count: usize,
}

/// An embedded entry of an analyzed interface. Methods that arrive only
/// through embedding are not analyzed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EmbeddedNotice {
    pub interface: String,
    pub embedded: String,
    pub position: Position,
}

/// Interfaces sharing a name across packages. They stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NameCollision {
    pub name: String,
    pub packages: Vec<String>,
}

/// Index of one tracked method: interface, then method within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    pub interface: usize,
    pub method: usize,
}

/// Everything the extractor found.
#[derive(Debug, Default)]
pub struct Extraction {
    pub interfaces: Vec<InterfaceDeclaration>,
    pub generics: Vec<GenericInterfaceWarning>,
    pub embedded: Vec<EmbeddedNotice>,
    pub collisions: Vec<NameCollision>,
}

impl Extraction {
    /// Total number of tracked methods.
    pub fn method_count(&self) -> usize {
        self.interfaces.iter().map(|i| i.methods.len()).sum()
    }

    /// Every tracked method, in declaration order.
    pub fn method_refs(&self) -> Vec<MethodRef> {
        self.interfaces
            .iter()
            .enumerate()
            .flat_map(|(interface, decl)| {
                (0..decl.methods.len()).map(move |method| MethodRef { interface, method })
            })
            .collect()
    }

    pub fn method(&self, at: MethodRef) -> (&InterfaceDeclaration, &MethodEntry) {
        let decl = &self.interfaces[at.interface];
        (decl, &decl.methods[at.method])
    }
}

#[derive(Default)]
struct FileExtraction {
    interfaces: Vec<InterfaceDeclaration>,
    generics: Vec<GenericInterfaceWarning>,
    embedded: Vec<EmbeddedNotice>,
}

/// Extract interface declarations from every resolved unit.
pub fn extract(oracle: &GoOracle) -> Result<Extraction, LoadError> {
    let query = Query::new(&GO_LANGUAGE, INTERFACE_QUERY)?;
    let project = oracle.project();

    let files: Vec<FileRef> = project
        .files()
        .filter(|(at, _)| oracle.is_resolved(at.unit))
        .map(|(at, _)| at)
        .collect();

    let per_file: Vec<FileExtraction> = files
        .par_iter()
        .map(|at| extract_file(oracle, project, &query, *at))
        .collect();

    let mut extraction = Extraction::default();
    for found in per_file {
        extraction.interfaces.extend(found.interfaces);
        extraction.generics.extend(found.generics);
        extraction.embedded.extend(found.embedded);
    }
    extraction.interfaces.sort_by(|a, b| a.id.cmp(&b.id));
    extraction.generics.sort();
    extraction.embedded.sort();
    extraction.collisions = find_collisions(&extraction.interfaces);

    for generic in &extraction.generics {
        warn!(
            interface = %generic.interface_name,
            at = %generic.position,
            methods = generic.method_count,
            "skipping generic interface"
        );
    }
    for collision in &extraction.collisions {
        warn!(
            name = %collision.name,
            packages = %collision.packages.join(", "),
            "interface name declared in several packages; kept distinct"
        );
    }
    debug!(
        interfaces = extraction.interfaces.len(),
        methods = extraction.method_count(),
        generic = extraction.generics.len(),
        "extraction complete"
    );
    Ok(extraction)
}

fn extract_file(oracle: &GoOracle, project: &Project, query: &Query, at: FileRef) -> FileExtraction {
    let file = project.file(at);
    let unit = &project.units[at.unit];
    let mut found = FileExtraction::default();

    let name_idx = query.capture_index_for_name("name");
    let body_idx = query.capture_index_for_name("body");
    let spec_idx = query.capture_index_for_name("spec");

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, file.tree.root_node(), &file.source[..]);
    while let Some(m) = matches.next() {
        let capture = |idx: Option<u32>| {
            m.captures
                .iter()
                .find(|c| Some(c.index) == idx)
                .map(|c| c.node)
        };
        let (Some(name), Some(body), Some(spec)) =
            (capture(name_idx), capture(body_idx), capture(spec_idx))
        else {
            continue;
        };
        let name = file.node_text(name).to_string();
        let local = !is_package_level(spec);
        let position = project.position(at, spec);
        if let Some(params) = spec.child_by_field_name("type_parameters") {
            found.generics.push(GenericInterfaceWarning {
                package: unit.import_path.clone(),
                interface_name: name,
                type_params: syntax::squash_whitespace(file.node_text(params)),
                position,
                method_count: method_elems(body).len(),
            });
            continue;
        }

        // A local type is scoped to its block and resolves structurally, so
        // its name gets the declaring line to keep it apart from package
        // types and from other locals of the same name.
        let (type_name, resolved) = if local {
            let type_name = TypeName::new(
                unit.import_path.clone(),
                format!("{}@{}", name, position.line),
            );
            (type_name, oracle.resolve_type(at, body))
        } else {
            let type_name = TypeName::new(unit.import_path.clone(), name.clone());
            let resolved = oracle.underlying(&GoType::Named(type_name.clone()));
            (type_name, resolved)
        };
        let GoType::Interface(shape) = resolved else {
            continue;
        };
        if local {
            debug!(interface = %name, at = %position, "function-local interface");
        }

        let id = InterfaceId {
            package: unit.import_path.clone(),
            name,
            position,
        };

        let mut methods = Vec::new();
        for elem in method_elems(body) {
            let Some(method_name) = elem.child_by_field_name("name") else {
                continue;
            };
            let method_name = file.node_text(method_name).to_string();
            let signature = shape
                .method(&method_name)
                .cloned()
                .unwrap_or_default();
            methods.push(MethodEntry {
                rendered: render_signature(file.node_text(elem), &method_name, elem),
                name: method_name,
                signature,
                position: project.position(at, elem),
                span: Span::from_node(elem),
            });
        }

        for elem in syntax::named_children(body) {
            if matches!(elem.kind(), "type_elem" | "constraint_elem" | "interface_type_name") {
                found.embedded.push(EmbeddedNotice {
                    interface: id.to_string(),
                    embedded: syntax::squash_whitespace(file.node_text(elem)),
                    position: project.position(at, elem),
                });
            }
        }

        found.interfaces.push(InterfaceDeclaration {
            id,
            type_name,
            file: at,
            module_path: file.module_path.clone(),
            local,
            shape,
            methods,
        });
    }
    found
}

fn is_package_level(spec: Node) -> bool {
    spec.parent()
        .and_then(|decl| decl.parent())
        .map(|p| p.kind() == "source_file")
        .unwrap_or(false)
}

fn method_elems(body: Node) -> Vec<Node> {
    syntax::named_children(body)
        .into_iter()
        .filter(|n| matches!(n.kind(), "method_elem" | "method_spec"))
        .collect()
}

/// The signature part of a method element as written, whitespace
/// normalized: `Log(level string,\n args ...any) error` renders as
/// `(level string, args ...any) error`.
fn render_signature(elem_text: &str, name: &str, elem: Node) -> String {
    let params_offset = elem
        .child_by_field_name("parameters")
        .map(|p| p.start_byte() - elem.start_byte())
        .unwrap_or(name.len());
    let rest = elem_text.get(params_offset..).unwrap_or("");
    syntax::squash_whitespace(rest)
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(",)", ")")
}

fn find_collisions(interfaces: &[InterfaceDeclaration]) -> Vec<NameCollision> {
    let mut by_name: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for iface in interfaces.iter().filter(|i| !i.local) {
        by_name
            .entry(iface.id.name.as_str())
            .or_default()
            .insert(iface.id.package.as_str());
    }
    by_name
        .into_iter()
        .filter(|(_, packages)| packages.len() > 1)
        .map(|(name, packages)| NameCollision {
            name: name.to_string(),
            packages: packages.into_iter().map(str::to_string).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::load;
    use crate::config::IgnorePolicy;
    use tempfile::TempDir;

    fn extract_from(files: &[(&str, &str)]) -> Extraction {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/m\n").unwrap();
        for (rel, content) in files {
            let path = temp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let project = load(temp.path(), &IgnorePolicy::none()).unwrap();
        let oracle = GoOracle::new(&project);
        extract(&oracle).unwrap()
    }

    #[test]
    fn test_generic_interfaces_are_warnings_only() {
        let extraction = extract_from(&[(
            "repo.go",
            "package repo\n\ntype Repository[T any] interface {\n\tGet(id string) (T, error)\n\tSave(item T) error\n}\n",
        )]);
        assert!(extraction.interfaces.is_empty());
        assert_eq!(extraction.generics.len(), 1);
        let warning = &extraction.generics[0];
        assert_eq!(warning.interface_name, "Repository");
        assert_eq!(warning.method_count, 2);
        assert_eq!(warning.type_params, "[T any]");
        assert_eq!(warning.position.line, 3);
    }

    #[test]
    fn test_methods_and_rendering() {
        let extraction = extract_from(&[(
            "log.go",
            "package log\n\ntype Logger interface {\n\tLog(level string, args ...any) error\n\tDebug(args ...string)\n}\n",
        )]);
        assert_eq!(extraction.interfaces.len(), 1);
        let logger = &extraction.interfaces[0];
        assert_eq!(logger.id.to_string(), "example.com/m.Logger");
        let names: Vec<_> = logger.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Log", "Debug"]);
        assert_eq!(logger.methods[0].rendered, "(level string, args ...any) error");
        assert_eq!(logger.methods[1].rendered, "(args ...string)");
        assert!(logger.methods[0].signature.variadic);
        assert_eq!(logger.methods[1].position.line, 5);
    }

    #[test]
    fn test_embedded_entries_flattened_but_not_tracked() {
        let extraction = extract_from(&[(
            "rw.go",
            "package rw\n\ntype Reader interface {\n\tRead() string\n}\n\ntype ReadCloser interface {\n\tReader\n\tClose() error\n}\n",
        )]);
        let rc = extraction
            .interfaces
            .iter()
            .find(|i| i.id.name == "ReadCloser")
            .unwrap();
        assert_eq!(rc.methods.len(), 1);
        assert_eq!(rc.shape.len(), 2);
        assert!(!rc.shape.incomplete);
        assert_eq!(extraction.embedded.len(), 1);
        assert_eq!(extraction.embedded[0].embedded, "Reader");
    }

    #[test]
    fn test_collisions_and_local_interfaces() {
        let extraction = extract_from(&[
            ("a/a.go", "package a\n\ntype Store interface {\n\tGet() int\n}\n"),
            ("b/b.go", "package b\n\ntype Store interface {\n\tGet() int\n}\n\nfunc f() {\n\ttype local interface{ X() }\n}\n"),
        ]);
        assert_eq!(extraction.interfaces.len(), 3);
        let local = extraction
            .interfaces
            .iter()
            .find(|i| i.id.name == "local")
            .unwrap();
        assert!(local.local);
        assert_eq!(local.methods.len(), 1);
        assert_eq!(local.id.position.line, 8);
        assert_eq!(extraction.collisions.len(), 1);
        assert_eq!(
            extraction.collisions[0].packages,
            vec!["example.com/m/a".to_string(), "example.com/m/b".to_string()]
        );
    }
}
