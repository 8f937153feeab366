//! unused-interface-methods - find Go interface methods nothing calls.
//!
//! For every method declared on a concrete interface, decides whether any
//! call site reaches it through that interface, and reports the ones that
//! are declared but never used.
//!
//! # Architecture
//!
//! The pipeline is strictly sequential:
//!
//! - `analysis`: loads Go sources with tree-sitter and answers type queries
//!   through the `TypeOracle` trait; also holds the interface identity
//!   comparator
//! - `extract`: finds interface declarations, skips generic ones
//! - `scan`: proves usage from call sites, method values, fields, reflection
//! - `eliminate`: removes each unproven method from a scratch copy and asks
//!   an external checker whether the copy is still clean
//! - `pipeline`: wires the stages together
//! - `report`: output formatting (text, JSON)
//! - `config`: YAML config and ignore patterns

pub mod analysis;
pub mod cli;
pub mod config;
pub mod eliminate;
pub mod error;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod scan;

pub use analysis::{load, GoOracle, Project, TypeOracle};
pub use config::{Config, IgnorePolicy};
pub use eliminate::{CommandOracle, Verdict, VerificationOracle};
pub use error::{AnalysisError, ConfigError, EliminationError, LoadError};
pub use pipeline::{run, Analysis, MethodReport, MethodStatus, Mode};
