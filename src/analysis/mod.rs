//! Syntax and type information for Go projects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Tree     │────▶│ Loader       │────▶│ Project       │
//! └─────────────────┘     │ (tree-sitter)│     │ (units, trees)│
//!                         └──────────────┘     └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ identity     │◀────│ GoOracle      │
//!                         │ comparator   │     │ (TypeOracle)  │
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! The loader owns every syntax tree. The oracle borrows the project and
//! answers type queries against it. Stages only ever see types through the
//! [`TypeOracle`] trait.

pub mod identity;
pub mod loader;
pub mod oracle;
pub mod syntax;
mod traits;
pub mod types;

pub use identity::{has_identical_method, identical, identical_interfaces, identical_signatures};
pub use loader::{load, CompilationUnit, Position, Project};
pub use oracle::GoOracle;
pub use traits::{Binding, FileRef, Member, ParsedFile, TypeOracle};
pub use types::{ChanDir, GoType, InterfaceShape, Signature, StructField, StructShape, TypeName};
