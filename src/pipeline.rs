//! The end-to-end analysis: load, extract, scan, eliminate.
//!
//! Stages run strictly in sequence and each consumes the previous stage's
//! output. Two modes produce the same report shape:
//!
//! - [`Mode::Verified`] sends every method without strong evidence through
//!   the elimination pass and reports only confirmed ones.
//! - [`Mode::Fast`] skips elimination and reports every method with no
//!   evidence at all, weak evidence included. Cheaper, less safe.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::{load, GoOracle, Position};
use crate::config::IgnorePolicy;
use crate::eliminate::{eliminate, EliminationOptions, Outcome, VerificationOracle};
use crate::error::AnalysisError;
use crate::extract::{extract, EmbeddedNotice, GenericInterfaceWarning, InterfaceId, NameCollision};
use crate::scan::{scan, UsageEvidence};

/// How unused candidates are confirmed.
#[derive(Clone, Copy)]
pub enum Mode<'a> {
    /// Confirm every candidate with the verification oracle.
    Verified(&'a dyn VerificationOracle),
    /// Trust scanner silence.
    Fast,
}

impl Mode<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Verified(_) => "verified",
            Mode::Fast => "fast",
        }
    }
}

/// Final classification of one interface method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    /// Direct evidence proves a use.
    Used,
    /// No evidence and, in verified mode, confirmed by elimination.
    Unused,
    /// No strong evidence, but elimination did not confirm it unused.
    Retained,
}

/// Everything known about one tracked method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub interface: InterfaceId,
    pub method: String,
    /// Signature as written, e.g. `(level string, args ...any) error`.
    pub signature: String,
    pub position: Position,
    pub status: MethodStatus,
    pub evidence: Vec<UsageEvidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl MethodReport {
    /// `<package>.<Interface>.<Method><signature>`
    pub fn qualified(&self) -> String {
        format!("{}.{}{}", self.interface, self.method, self.signature)
    }
}

/// Result of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub mode: &'static str,
    pub methods: Vec<MethodReport>,
    pub generics: Vec<GenericInterfaceWarning>,
    pub embedded: Vec<EmbeddedNotice>,
    pub collisions: Vec<NameCollision>,
}

impl Analysis {
    pub fn unused(&self) -> impl Iterator<Item = &MethodReport> {
        self.methods
            .iter()
            .filter(|m| m.status == MethodStatus::Unused)
    }

    pub fn has_unused(&self) -> bool {
        self.unused().next().is_some()
    }

    pub fn skipped_generic_methods(&self) -> usize {
        self.generics.iter().map(|g| g.method_count).sum()
    }
}

/// Analyze the Go module rooted at (or containing) `root`.
pub fn run(
    root: &Path,
    policy: &IgnorePolicy,
    mode: Mode<'_>,
    options: &EliminationOptions,
) -> Result<Analysis, AnalysisError> {
    let project = load(root, policy)?;
    let oracle = GoOracle::new(&project);
    let extraction = extract(&oracle)?;
    let scanned = scan(&project, &oracle, &extraction);

    let elimination = match mode {
        Mode::Verified(verifier) => {
            let candidates = scanned.unproven(&extraction);
            info!(
                candidates = candidates.len(),
                checker = verifier.name(),
                "confirming candidates"
            );
            Some(eliminate(&project, &extraction, &candidates, verifier, options)?)
        }
        Mode::Fast => None,
    };

    let mut methods = Vec::with_capacity(extraction.method_count());
    for at in extraction.method_refs() {
        let (decl, entry) = extraction.method(at);
        let evidence = scanned.evidence_for(at).to_vec();
        let outcome = elimination
            .as_ref()
            .and_then(|e| e.outcome(at))
            .cloned();

        let status = match (&elimination, scanned.is_used(at)) {
            (_, true) => MethodStatus::Used,
            (Some(_), false) => match &outcome {
                Some(Outcome::ConfirmedUnused) => MethodStatus::Unused,
                _ => MethodStatus::Retained,
            },
            (None, false) if scanned.has_any(at) => MethodStatus::Retained,
            (None, false) => MethodStatus::Unused,
        };

        methods.push(MethodReport {
            interface: decl.id.clone(),
            method: entry.name.clone(),
            signature: entry.rendered.clone(),
            position: entry.position.clone(),
            status,
            evidence,
            outcome,
        });
    }
    methods.sort_by(|a, b| {
        (&a.interface.package, &a.interface.name, &a.position)
            .cmp(&(&b.interface.package, &b.interface.name, &b.position))
    });

    debug!(
        mode = mode.name(),
        methods = methods.len(),
        unused = methods.iter().filter(|m| m.status == MethodStatus::Unused).count(),
        "analysis complete"
    );
    Ok(Analysis {
        mode: mode.name(),
        methods,
        generics: extraction.generics,
        embedded: extraction.embedded,
        collisions: extraction.collisions,
    })
}
