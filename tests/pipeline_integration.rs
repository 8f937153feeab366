//! Integration tests for the full analysis pipeline.
//!
//! These tests run the pipeline over the Go fixtures in `testdata/`. The
//! verification oracle is replaced by an in-process fake so no Go toolchain
//! is needed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::future::BoxFuture;
use walkdir::WalkDir;

use unused_interface_methods::eliminate::{EliminationOptions, Outcome};
use unused_interface_methods::error::{AnalysisError, EliminationError};
use unused_interface_methods::scan::EvidenceKind;
use unused_interface_methods::{
    run, Analysis, Config, IgnorePolicy, MethodStatus, Mode, Verdict, VerificationOracle,
};

fn testdata_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

fn default_policy() -> IgnorePolicy {
    Config::default().ignore_policy().expect("defaults compile")
}

fn options() -> EliminationOptions {
    EliminationOptions {
        jobs: 2,
        progress: false,
    }
}

/// Stands in for a real checker.
///
/// Reports a finding whenever one of the `required` snippets is missing from
/// the workspace's Go sources, i.e. when a method some hidden code depends
/// on was removed. Records the sources of every verified workspace.
struct FakeChecker {
    required: Vec<&'static str>,
    verdict_override: Option<Verdict>,
    seen: Mutex<Vec<String>>,
}

impl FakeChecker {
    fn clean() -> Self {
        Self::requiring(Vec::new())
    }

    fn requiring(required: Vec<&'static str>) -> Self {
        Self {
            required,
            verdict_override: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn always(verdict: Verdict) -> Self {
        Self {
            verdict_override: Some(verdict),
            ..Self::clean()
        }
    }

    fn runs(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

fn go_sources(dir: &Path) -> String {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|e| e == "go").unwrap_or(false))
        .collect();
    files.sort();
    files
        .iter()
        .map(|p| std::fs::read_to_string(p).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

impl VerificationOracle for FakeChecker {
    fn name(&self) -> &str {
        "fake"
    }

    fn verify<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, Result<Verdict, EliminationError>> {
        Box::pin(async move {
            let sources = go_sources(dir);
            self.seen.lock().unwrap().push(sources.clone());
            if let Some(verdict) = &self.verdict_override {
                return Ok(verdict.clone());
            }
            let missing: Vec<String> = self
                .required
                .iter()
                .filter(|snippet| !sources.contains(**snippet))
                .map(|snippet| format!("x.go:1:1: missing {}", snippet))
                .collect();
            if missing.is_empty() {
                Ok(Verdict::Clean)
            } else {
                Ok(Verdict::Findings(missing))
            }
        })
    }
}

fn names(analysis: &Analysis, status: MethodStatus) -> BTreeSet<String> {
    analysis
        .methods
        .iter()
        .filter(|m| m.status == status)
        .map(|m| format!("{}.{}", m.interface.name, m.method))
        .collect()
}

#[test]
fn test_logger_debug_is_unused() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("logger"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .expect("analysis should succeed");

    assert_eq!(names(&analysis, MethodStatus::Unused), ["Logger.Debug".to_string()].into());
    assert_eq!(names(&analysis, MethodStatus::Used), ["Logger.Log".to_string()].into());

    let debug = analysis.unused().next().unwrap();
    assert_eq!(debug.qualified(), "example.com/logger.Logger.Debug(args ...string)");
    assert!(debug.position.file.ends_with("testdata/logger/logger.go"));
    assert_eq!(debug.position.line, 8);

    // Baseline plus the single candidate.
    assert_eq!(checker.runs(), 2);
}

#[test]
fn test_each_verification_removes_exactly_one_method() {
    let checker = FakeChecker::clean();
    run(
        &testdata_path("logger"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    let seen = checker.seen.lock().unwrap();
    let original = go_sources(&testdata_path("logger"));
    assert_eq!(seen[0], original, "baseline must be the unmodified tree");
    let mutated = &seen[1];
    assert!(!mutated.contains("\tDebug(args ...string)\n"));
    assert!(mutated.contains("\tLog(level string, args ...any) error\n"));
    assert!(mutated.contains("func (stdLogger) Debug(args ...string) {}"));
    assert_eq!(original.len() - mutated.len(), "\tDebug(args ...string)\n".len());
}

#[test]
fn test_checker_findings_keep_method() {
    let checker = FakeChecker::requiring(vec!["Debug(args ...string)\n}"]);
    let analysis = run(
        &testdata_path("logger"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert!(!analysis.has_unused());
    let debug = analysis.methods.iter().find(|m| m.method == "Debug").unwrap();
    assert_eq!(debug.status, MethodStatus::Retained);
    assert!(matches!(debug.outcome, Some(Outcome::StillUsed { .. })));
}

#[test]
fn test_generic_interfaces_are_skipped() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("generic"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert!(analysis.methods.is_empty());
    assert_eq!(analysis.generics.len(), 1);
    assert_eq!(analysis.generics[0].interface_name, "Repository");
    assert_eq!(analysis.generics[0].method_count, 2);
    assert_eq!(analysis.skipped_generic_methods(), 2);
    // Nothing to confirm, so the checker never runs.
    assert_eq!(checker.runs(), 0);
}

#[test]
fn test_same_method_name_different_signature() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("processors"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert_eq!(
        names(&analysis, MethodStatus::Used),
        ["ProcessorV1.Process".to_string()].into()
    );
    assert_eq!(
        names(&analysis, MethodStatus::Unused),
        ["ProcessorV2.Process".to_string()].into()
    );
}

#[test]
fn test_ignored_files_are_not_reported() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("ignored"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert!(analysis.methods.iter().all(|m| m.interface.name != "Clock"));
    assert_eq!(names(&analysis, MethodStatus::Used), ["Pinger.Ping".to_string()].into());
    assert!(!analysis.has_unused());

    // The ignored package is not copied into workspaces either.
    let seen = checker.seen.lock().unwrap();
    assert!(seen.iter().all(|sources| !sources.contains("type Clock interface")));
}

#[test]
fn test_ignored_files_without_policy_are_analyzed() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("ignored"),
        &IgnorePolicy::none(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert_eq!(
        names(&analysis, MethodStatus::Unused),
        ["Clock.Now".to_string(), "Clock.Sleep".to_string()].into()
    );
}

#[test]
fn test_call_site_shapes() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("shapes"),
        &IgnorePolicy::none(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    let kind_of = |method: &str| {
        analysis
            .methods
            .iter()
            .find(|m| m.method == method)
            .and_then(|m| m.evidence.iter().find(|e| !e.is_weak()))
            .map(|e| e.kind)
    };
    assert_eq!(kind_of("Get"), Some(EvidenceKind::DirectCall));
    assert_eq!(kind_of("Compact"), Some(EvidenceKind::GoroutineCall));
    assert_eq!(kind_of("Close"), Some(EvidenceKind::DeferredCall));
    assert_eq!(kind_of("Put"), Some(EvidenceKind::MethodValue));
    assert_eq!(kind_of("Delete"), Some(EvidenceKind::DirectCall));
    assert_eq!(kind_of("Watch"), Some(EvidenceKind::DirectCall));
    assert_eq!(kind_of("Init"), Some(EvidenceKind::Reflection));

    // Calls from test files are not evidence; weak field evidence does not
    // stop confirmation.
    assert_eq!(
        names(&analysis, MethodStatus::Unused),
        [
            "Plugin.Shutdown".to_string(),
            "Store.Snapshot".to_string(),
            "Store.Stats".to_string(),
            "Watcher.Stop".to_string(),
        ]
        .into()
    );
}

#[test]
fn test_fast_mode_trusts_weak_evidence() {
    let analysis = run(
        &testdata_path("shapes"),
        &IgnorePolicy::none(),
        Mode::Fast,
        &options(),
    )
    .unwrap();

    assert_eq!(analysis.mode, "fast");
    assert_eq!(
        names(&analysis, MethodStatus::Unused),
        [
            "Plugin.Shutdown".to_string(),
            "Store.Snapshot".to_string(),
            "Store.Stats".to_string(),
        ]
        .into()
    );
    let stop = analysis.methods.iter().find(|m| m.method == "Stop").unwrap();
    assert_eq!(stop.status, MethodStatus::Retained);
    assert_eq!(stop.evidence[0].kind, EvidenceKind::FieldDeclaration);
    assert!(stop.outcome.is_none());
}

#[test]
fn test_used_methods_never_reported() {
    let checker = FakeChecker::clean();
    let analysis = run(
        &testdata_path("shapes"),
        &IgnorePolicy::none(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    for method in &analysis.methods {
        if method.evidence.iter().any(|e| !e.is_weak()) {
            assert_eq!(method.status, MethodStatus::Used, "{}", method.qualified());
            assert!(method.outcome.is_none());
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let first = run(
        &testdata_path("shapes"),
        &IgnorePolicy::none(),
        Mode::Verified(&FakeChecker::clean()),
        &options(),
    )
    .unwrap();
    let second = run(
        &testdata_path("shapes"),
        &IgnorePolicy::none(),
        Mode::Verified(&FakeChecker::clean()),
        &options(),
    )
    .unwrap();

    let unused = |a: &Analysis| a.unused().map(|m| m.qualified()).collect::<Vec<_>>();
    assert_eq!(unused(&first), unused(&second));
}

#[test]
fn test_timeout_is_not_confirmation() {
    // Clean baseline, then every candidate times out.
    struct SlowAfterBaseline(Mutex<usize>);
    impl VerificationOracle for SlowAfterBaseline {
        fn name(&self) -> &str {
            "slow"
        }
        fn verify<'a>(&'a self, _dir: &'a Path) -> BoxFuture<'a, Result<Verdict, EliminationError>> {
            Box::pin(async move {
                let mut calls = self.0.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Ok(Verdict::Clean)
                } else {
                    Ok(Verdict::TimedOut)
                }
            })
        }
    }

    let checker = SlowAfterBaseline(Mutex::new(0));
    let analysis = run(
        &testdata_path("logger"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap();

    assert!(!analysis.has_unused());
    let debug = analysis.methods.iter().find(|m| m.method == "Debug").unwrap();
    assert_eq!(debug.status, MethodStatus::Retained);
    assert_eq!(debug.outcome, Some(Outcome::TimedOut));
}

#[test]
fn test_dirty_baseline_aborts() {
    let checker = FakeChecker::always(Verdict::Findings(vec!["main.go:1:1: broken".to_string()]));
    let err = run(
        &testdata_path("logger"),
        &default_policy(),
        Mode::Verified(&checker),
        &options(),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        AnalysisError::Elimination(EliminationError::BaselineNotClean { .. })
    ));
    assert_eq!(checker.runs(), 1);
}

#[test]
fn test_missing_root_is_load_error() {
    let err = run(
        &testdata_path("does-not-exist"),
        &default_policy(),
        Mode::Fast,
        &options(),
    )
    .unwrap_err();
    assert!(matches!(err, AnalysisError::Load(_)));
}
