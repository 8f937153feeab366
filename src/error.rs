//! Error taxonomy for the analysis pipeline.
//!
//! Configuration and elimination infrastructure failures are fatal. Per-file
//! parse failures and per-unit resolution failures never surface here; the
//! loader and oracle report them as diagnostics and carry on.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating or reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid ignore pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Errors that prevent the source tree from being enumerated at all.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot access {path}: {source}")]
    RootNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot initialize Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("cannot compile syntax query: {0}")]
    Query(#[from] tree_sitter::QueryError),
}

/// Reasons a compilation unit cannot be resolved. The unit is skipped and
/// analysis continues.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{name} redeclared in package {package}")]
    Redeclared { package: String, name: String },
}

/// Infrastructure failures of the confirmatory elimination pass.
///
/// None of these mean "the method is used"; they mean no verdict can be
/// trusted, so the whole pass is abandoned.
#[derive(Debug, Error)]
pub enum EliminationError {
    #[error("cannot create scratch workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("cannot copy {path} into workspace: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write mutated {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("method {method} not found in interface {interface} of {path}")]
    MethodNotFound {
        path: PathBuf,
        interface: String,
        method: String,
    },

    #[error("cannot run checker {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checker {program:?} failed with {status}: {output}")]
    CheckerFailed {
        program: String,
        status: String,
        output: String,
    },

    #[error("checker reports {} finding(s) on the unmodified tree, first: {}", .findings.len(), .findings.first().map(String::as_str).unwrap_or(""))]
    BaselineNotClean { findings: Vec<String> },

    #[error("checker {checker:?} timed out on the unmodified tree")]
    BaselineTimedOut { checker: String },

    #[error("cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Failures of a whole analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("elimination pass aborted: {0}")]
    Elimination(#[from] EliminationError),
}
