//! Confirmatory elimination.
//!
//! For every method without direct evidence: copy the module into a fresh
//! scratch workspace, delete exactly that method from its interface, and
//! ask the verification oracle whether the tree is still clean. A clean
//! verdict confirms the method unused. Findings mean something depended on
//! it; a timeout proves nothing. Either way the method is not reported.
//!
//! Each candidate gets its own workspace, so candidates from the same file
//! never see each other's edits and verification runs concurrently up to
//! the configured job count.

mod mutate;
mod verifier;
mod workspace;

pub use mutate::remove_method;
pub use verifier::{
    parse_findings, CommandOracle, Verdict, VerificationOracle, DEFAULT_CHECKER, DEFAULT_TIMEOUT,
};
pub use workspace::Workspace;

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use crate::analysis::Project;
use crate::error::EliminationError;
use crate::extract::{Extraction, MethodRef};

/// Result of verifying one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The tree stayed clean without the method.
    ConfirmedUnused,
    /// Removing the method produced findings.
    StillUsed { findings: Vec<String> },
    /// The checker timed out; not confirmed.
    TimedOut,
}

impl Outcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::ConfirmedUnused)
    }
}

/// Controls for the elimination pass.
#[derive(Debug, Clone)]
pub struct EliminationOptions {
    /// Maximum concurrent checker runs.
    pub jobs: usize,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for EliminationOptions {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            progress: false,
        }
    }
}

/// Verdicts for every candidate, keyed by method.
#[derive(Debug, Default)]
pub struct Elimination {
    pub outcomes: BTreeMap<MethodRef, Outcome>,
}

impl Elimination {
    pub fn outcome(&self, method: MethodRef) -> Option<&Outcome> {
        self.outcomes.get(&method)
    }
}

/// Run the elimination pass over `candidates`.
///
/// Any infrastructure failure aborts the whole pass: once a workspace or
/// checker run cannot be trusted no verdict can be.
pub fn eliminate(
    project: &Project,
    extraction: &Extraction,
    candidates: &[MethodRef],
    oracle: &dyn VerificationOracle,
    options: &EliminationOptions,
) -> Result<Elimination, EliminationError> {
    if candidates.is_empty() {
        return Ok(Elimination::default());
    }
    let runtime = tokio::runtime::Runtime::new().map_err(EliminationError::Runtime)?;
    runtime.block_on(eliminate_async(project, extraction, candidates, oracle, options))
}

async fn eliminate_async(
    project: &Project,
    extraction: &Extraction,
    candidates: &[MethodRef],
    oracle: &dyn VerificationOracle,
    options: &EliminationOptions,
) -> Result<Elimination, EliminationError> {
    verify_baseline(project, oracle).await?;

    let progress = progress_bar(candidates.len() as u64, options.progress);
    let outcomes: BTreeMap<MethodRef, Outcome> = stream::iter(candidates.iter().copied())
        .map(|method| {
            let progress = &progress;
            async move {
                let outcome = try_candidate(project, extraction, oracle, method).await?;
                progress.inc(1);
                Ok::<_, EliminationError>((method, outcome))
            }
        })
        .buffer_unordered(options.jobs.max(1))
        .try_collect()
        .await?;
    progress.finish_and_clear();

    info!(
        candidates = candidates.len(),
        confirmed = outcomes.values().filter(|o| o.is_confirmed()).count(),
        "elimination complete"
    );
    Ok(Elimination { outcomes })
}

/// The unmodified tree must verify clean, or no verdict means anything.
async fn verify_baseline(
    project: &Project,
    oracle: &dyn VerificationOracle,
) -> Result<(), EliminationError> {
    let workspace = Workspace::create(project)?;
    match oracle.verify(workspace.path()).await? {
        Verdict::Clean => {
            debug!(checker = oracle.name(), "baseline clean");
            Ok(())
        }
        Verdict::Findings(findings) => Err(EliminationError::BaselineNotClean { findings }),
        Verdict::TimedOut => Err(EliminationError::BaselineTimedOut {
            checker: oracle.name().to_string(),
        }),
    }
}

/// Clone, mutate, verify, discard.
async fn try_candidate(
    project: &Project,
    extraction: &Extraction,
    oracle: &dyn VerificationOracle,
    method: MethodRef,
) -> Result<Outcome, EliminationError> {
    let (decl, entry) = extraction.method(method);
    let source = &project.file(decl.file).source;
    let mutated = remove_method(source, decl, entry)?;

    let workspace = Workspace::create(project)?;
    workspace.write(&decl.module_path, &mutated)?;

    let outcome = match oracle.verify(workspace.path()).await? {
        Verdict::Clean => Outcome::ConfirmedUnused,
        Verdict::Findings(findings) => Outcome::StillUsed { findings },
        Verdict::TimedOut => Outcome::TimedOut,
    };
    debug!(
        interface = %decl.id,
        method = %entry.name,
        outcome = ?outcome,
        "candidate verified"
    );
    Ok(outcome)
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("{spinner} verifying {pos}/{len} {wide_bar} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
