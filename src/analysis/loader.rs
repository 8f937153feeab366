//! Project loading: walk the source tree, parse Go files, group them into
//! compilation units.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::syntax::{self, create_parser};
use super::traits::{FileRef, ParsedFile};
use crate::config::{normalize, IgnorePolicy};
use crate::error::LoadError;

lazy_static! {
    static ref MODULE_LINE: Regex = Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).unwrap();
}

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["vendor", "testdata"];

/// A Go package: every file in one directory sharing one package clause.
pub struct CompilationUnit {
    /// Name from the package clause.
    pub name: String,
    /// Import path used to qualify type names declared here.
    pub import_path: String,
    /// Directory relative to the module root.
    pub dir: PathBuf,
    pub files: Vec<ParsedFile>,
}

impl CompilationUnit {
    /// Black-box test package (`package foo_test`).
    pub fn is_external_test(&self) -> bool {
        self.name.ends_with("_test")
    }
}

/// A source location as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Position {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Everything loaded from one analyzed root.
pub struct Project {
    /// The analyzed directory.
    pub root: PathBuf,
    /// Directory holding `go.mod`, or the analyzed root without one.
    pub module_root: PathBuf,
    /// Module path declared in `go.mod`.
    pub module_path: Option<String>,
    pub units: Vec<CompilationUnit>,
    /// Every non-ignored Go source relative to the module root, including
    /// files that failed to parse.
    pub sources: Vec<PathBuf>,
}

impl Project {
    pub fn file(&self, at: FileRef) -> &ParsedFile {
        &self.units[at.unit].files[at.file]
    }

    /// Every file with its reference, in load order.
    pub fn files(&self) -> impl Iterator<Item = (FileRef, &ParsedFile)> {
        self.units.iter().enumerate().flat_map(|(unit, u)| {
            u.files
                .iter()
                .enumerate()
                .map(move |(file, parsed)| (FileRef { unit, file }, parsed))
        })
    }

    /// Index of the unit with the given import path, ignoring external
    /// test packages.
    pub fn unit_by_import_path(&self, import_path: &str) -> Option<usize> {
        self.units
            .iter()
            .position(|u| u.import_path == import_path && !u.is_external_test())
    }

    pub fn position(&self, at: FileRef, node: tree_sitter::Node) -> Position {
        let file = self.file(at);
        Position {
            file: file.display_path.clone(),
            line: file.line_of(node),
        }
    }
}

/// Load every non-ignored Go file under `root`.
///
/// Unreadable or unparsable files are skipped with a warning. Only failure
/// to enumerate the tree at all is an error.
pub fn load(root: &Path, policy: &IgnorePolicy) -> Result<Project, LoadError> {
    let canonical = fs::canonicalize(root).map_err(|source| LoadError::RootNotFound {
        path: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(LoadError::RootNotFound {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        });
    }

    let (module_root, module_path) = find_module(&canonical);
    debug!(
        root = %canonical.display(),
        module = module_path.as_deref().unwrap_or("<none>"),
        "loading project"
    );

    let relative = collect_files(&canonical, policy)?;
    create_parser()?;

    let parsed: Vec<(PathBuf, Option<(String, ParsedFile)>)> = relative
        .par_iter()
        .map_init(
            || create_parser().ok(),
            |parser, rel| {
                let result = parser
                    .as_mut()
                    .and_then(|p| parse_file(p, root, &canonical, &module_root, rel));
                (rel.clone(), result)
            },
        )
        .collect();

    let mut sources = Vec::new();
    let mut groups: BTreeMap<(PathBuf, String), Vec<ParsedFile>> = BTreeMap::new();
    for (rel, result) in parsed {
        sources.push(module_relative(&canonical, &module_root, &rel));
        if let Some((package, file)) = result {
            let dir = file
                .module_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            groups.entry((dir, package)).or_default().push(file);
        }
    }

    let units = groups
        .into_iter()
        .map(|((dir, name), files)| {
            let import_path = import_path_for(module_path.as_deref(), &dir, &name);
            trace!(import_path = %import_path, files = files.len(), "compilation unit");
            CompilationUnit {
                name,
                import_path,
                dir,
                files,
            }
        })
        .collect::<Vec<_>>();
    debug!(units = units.len(), files = sources.len(), "project loaded");

    Ok(Project {
        root: canonical,
        module_root,
        module_path,
        units,
        sources,
    })
}

/// Walk the tree and return root-relative paths of non-ignored `.go` files.
fn collect_files(root: &Path, policy: &IgnorePolicy) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
            return true;
        }
        let name = e.file_name().to_string_lossy();
        !(name.starts_with('.') || name.starts_with('_') || SKIPPED_DIRS.contains(&name.as_ref()))
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.path().extension().map_or(true, |e| e != "go") {
            continue;
        }
        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        if policy.should_ignore(&rel) {
            trace!(file = %normalize(&rel), "ignored");
            continue;
        }
        files.push(rel);
    }
    files.sort();
    Ok(files)
}

fn parse_file(
    parser: &mut tree_sitter::Parser,
    user_root: &Path,
    root: &Path,
    module_root: &Path,
    rel: &Path,
) -> Option<(String, ParsedFile)> {
    let path = root.join(rel);
    let display_path = display_path(user_root, rel);
    let source = match fs::read(&path) {
        Ok(source) => source,
        Err(err) => {
            warn!(file = %display_path, error = %err, "cannot read file, skipping");
            return None;
        }
    };
    let tree = match parser.parse(&source, None) {
        Some(tree) => tree,
        None => {
            warn!(file = %display_path, "parser gave up, skipping");
            return None;
        }
    };
    if tree.root_node().has_error() {
        warn!(file = %display_path, "syntax errors, skipping");
        return None;
    }

    let package = syntax::named_children(tree.root_node())
        .into_iter()
        .find(|n| n.kind() == "package_clause")
        .and_then(|clause| syntax::named_children(clause).into_iter().next())
        .map(|name| syntax::text(name, &source).to_string());
    let Some(package) = package else {
        warn!(file = %display_path, "no package clause, skipping");
        return None;
    };

    Some((
        package,
        ParsedFile {
            tree,
            source,
            module_path: module_relative(root, module_root, rel),
            display_path,
        },
    ))
}

/// Find the nearest enclosing `go.mod` and its module path.
fn find_module(root: &Path) -> (PathBuf, Option<String>) {
    for dir in root.ancestors() {
        let go_mod = dir.join("go.mod");
        if let Ok(content) = fs::read_to_string(&go_mod) {
            let module = MODULE_LINE
                .captures(&content)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
            return (dir.to_path_buf(), module);
        }
    }
    (root.to_path_buf(), None)
}

fn module_relative(root: &Path, module_root: &Path, rel: &Path) -> PathBuf {
    root.join(rel)
        .strip_prefix(module_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| rel.to_path_buf())
}

/// Path of a root-relative file as the user would write it.
fn display_path(user_root: &Path, rel: &Path) -> String {
    let rel = normalize(rel);
    let base = user_root.to_string_lossy().replace('\\', "/");
    let base = base.trim_end_matches('/');
    if base.is_empty() || base == "." {
        rel
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Import path of a package directory.
fn import_path_for(module_path: Option<&str>, dir: &Path, package: &str) -> String {
    let dir = normalize(dir);
    let base = match (module_path, dir.is_empty()) {
        (Some(module), true) => module.to_string(),
        (Some(module), false) => format!("{}/{}", module, dir),
        (None, false) => dir,
        (None, true) => package.trim_end_matches("_test").to_string(),
    };
    if package.ends_with("_test") && !base.ends_with("_test") {
        format!("{}_test", base)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_groups_by_package_and_module_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "go.mod", "module example.com/app\n\ngo 1.21\n");
        write(root, "main.go", "package main\n\nfunc main() {}\n");
        write(root, "store/a.go", "package store\n\ntype A int\n");
        write(root, "store/b.go", "package store\n\ntype B int\n");
        write(root, "store/x_test.go", "package store_test\n");
        write(root, "vendor/dep/dep.go", "package dep\n");
        write(root, ".hidden/h.go", "package hidden\n");

        let policy = IgnorePolicy::none();
        let project = load(root, &policy).unwrap();

        assert_eq!(project.module_path.as_deref(), Some("example.com/app"));
        let paths: Vec<_> = project.units.iter().map(|u| u.import_path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["example.com/app", "example.com/app/store", "example.com/app/store_test"]
        );
        let store = project.unit_by_import_path("example.com/app/store").unwrap();
        assert_eq!(project.units[store].files.len(), 2);
        assert_eq!(project.sources.len(), 4);
    }

    #[test]
    fn test_ignore_policy_and_parse_failures() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "ok.go", "package p\n\ntype T int\n");
        write(root, "broken.go", "package p\n\nfunc {{{\n");
        write(root, "mock/m.go", "package mock\n");

        let policy = IgnorePolicy::new(&["**/mock/**"]).unwrap();
        let project = load(root, &policy).unwrap();

        assert_eq!(project.units.len(), 1);
        assert_eq!(project.units[0].files.len(), 1);
        assert_eq!(project.units[0].import_path, "p");
        // Broken files stay part of the tree copied for verification.
        assert_eq!(project.sources.len(), 2);
    }

    #[test]
    fn test_missing_root() {
        let err = load(Path::new("/nonexistent/dir"), &IgnorePolicy::none()).err().unwrap();
        assert!(matches!(err, LoadError::RootNotFound { .. }));
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("."), Path::new("a/b.go")), "a/b.go");
        assert_eq!(display_path(Path::new("./src/"), Path::new("b.go")), "./src/b.go");
    }
}
