//! Direct-evidence scanning.
//!
//! Walks every non-test syntax tree and proves, through the type oracle,
//! which tracked interface methods are reached by some call site. Files are
//! scanned in parallel against the read-only oracle; per-file findings are
//! merged afterwards.

mod shapes;

pub use shapes::{classify, CandidateIndex, EvidenceKind, Resolver, Shape};

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace};

use crate::analysis::{FileRef, Position, Project, TypeOracle};
use crate::extract::{Extraction, MethodRef};

/// One piece of evidence that a method is used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UsageEvidence {
    #[serde(skip)]
    pub method: MethodRef,
    pub kind: EvidenceKind,
    pub position: Position,
}

impl UsageEvidence {
    pub fn is_weak(&self) -> bool {
        self.kind.is_weak()
    }
}

/// Evidence found for each tracked method. Methods without an entry have
/// none at all.
#[derive(Debug, Default)]
pub struct ScanResult {
    evidence: BTreeMap<MethodRef, Vec<UsageEvidence>>,
}

impl ScanResult {
    pub fn evidence_for(&self, method: MethodRef) -> &[UsageEvidence] {
        self.evidence
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First strong evidence for a method, if any.
    pub fn strong(&self, method: MethodRef) -> Option<&UsageEvidence> {
        self.evidence_for(method).iter().find(|e| !e.is_weak())
    }

    /// Proven used: at least one strong piece of evidence.
    pub fn is_used(&self, method: MethodRef) -> bool {
        self.strong(method).is_some()
    }

    /// Any evidence at all, weak included.
    pub fn has_any(&self, method: MethodRef) -> bool {
        !self.evidence_for(method).is_empty()
    }

    /// Methods with no strong evidence, in declaration order.
    pub fn unproven(&self, extraction: &Extraction) -> Vec<MethodRef> {
        extraction
            .method_refs()
            .into_iter()
            .filter(|m| !self.is_used(*m))
            .collect()
    }

    fn merge(&mut self, found: Vec<UsageEvidence>) {
        for evidence in found {
            self.evidence.entry(evidence.method).or_default().push(evidence);
        }
    }
}

/// Scan all non-test files for evidence of the extracted methods.
pub fn scan(project: &Project, oracle: &dyn TypeOracle, extraction: &Extraction) -> ScanResult {
    let index = CandidateIndex::new(extraction);
    let mut result = ScanResult::default();
    if index.is_empty() {
        return result;
    }

    let files: Vec<FileRef> = project
        .files()
        .filter(|(at, file)| !file.is_test_file() && !project.units[at.unit].is_external_test())
        .map(|(at, _)| at)
        .collect();

    let resolver = Resolver {
        oracle,
        index: &index,
    };
    let total = extraction.method_count();
    let per_file: Vec<Vec<UsageEvidence>> = files
        .par_iter()
        .map(|at| scan_file(project, &resolver, *at, total))
        .collect();

    for found in per_file {
        result.merge(found);
    }
    for evidence in result.evidence.values_mut() {
        evidence.sort();
    }

    debug!(
        files = files.len(),
        proven = extraction
            .method_refs()
            .iter()
            .filter(|m| result.is_used(**m))
            .count(),
        total,
        "scan complete"
    );
    result
}

fn scan_file(project: &Project, resolver: &Resolver, at: FileRef, total: usize) -> Vec<UsageEvidence> {
    let file = project.file(at);
    let mut found = Vec::new();
    // One strong hit per method is enough; weak hits are kept once each.
    let mut proven: HashSet<MethodRef> = HashSet::new();
    let mut weak: HashSet<MethodRef> = HashSet::new();

    let mut cursor = file.tree.walk();
    'walk: loop {
        let node = cursor.node();
        for shape in classify(node, file) {
            for (method, kind) in resolver.resolve(at, &shape) {
                if proven.contains(&method) {
                    continue;
                }
                if kind.is_weak() {
                    if !weak.insert(method) {
                        continue;
                    }
                } else {
                    proven.insert(method);
                }
                trace!(
                    method = method.method,
                    interface = method.interface,
                    kind = kind.as_str(),
                    at = %project.position(at, node),
                    "evidence"
                );
                found.push(UsageEvidence {
                    method,
                    kind,
                    position: project.position(at, node),
                });
            }
        }
        if proven.len() == total {
            break;
        }

        if cursor.goto_first_child() || cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                break 'walk;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
    found
}
