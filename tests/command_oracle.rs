//! Tests for the subprocess verification oracle.
//!
//! POSIX utilities stand in for a real checker: `true` is a clean run,
//! `false` a run with findings, `sleep` a run that never finishes in time.
#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use unused_interface_methods::eliminate::{CommandOracle, EliminationOptions, Verdict, VerificationOracle};
use unused_interface_methods::error::EliminationError;
use unused_interface_methods::{run, Config, MethodStatus, Mode};

fn oracle(command: &str, timeout: Duration) -> CommandOracle {
    CommandOracle::from_command_line(command, timeout).expect("non-empty command")
}

#[tokio::test]
async fn test_success_is_clean() {
    let dir = TempDir::new().unwrap();
    let verdict = oracle("true", Duration::from_secs(10))
        .verify(dir.path())
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::Clean);
}

#[tokio::test]
async fn test_finding_status_collects_output() {
    let dir = TempDir::new().unwrap();
    let checker = CommandOracle::new(
        "sh",
        vec![
            "-c".to_string(),
            "echo 'store.go:4:2: Debug is unused (U1000)'; exit 1".to_string(),
        ],
        Duration::from_secs(10),
    );
    let verdict = checker.verify(dir.path()).await.unwrap();
    assert_eq!(
        verdict,
        Verdict::Findings(vec!["store.go:4:2: Debug is unused (U1000)".to_string()])
    );

    let silent = oracle("false", Duration::from_secs(10))
        .verify(dir.path())
        .await
        .unwrap();
    assert!(matches!(silent, Verdict::Findings(f) if f.len() == 1));
}

#[tokio::test]
async fn test_runs_inside_workspace() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("marker.go"), "package m\n").unwrap();
    let checker = oracle("test -f marker.go", Duration::from_secs(10));
    assert_eq!(checker.verify(dir.path()).await.unwrap(), Verdict::Clean);
}

#[tokio::test]
async fn test_timeout_is_a_verdict() {
    let dir = TempDir::new().unwrap();
    let verdict = oracle("sleep 5", Duration::from_millis(100))
        .verify(dir.path())
        .await
        .unwrap();
    assert_eq!(verdict, Verdict::TimedOut);
}

#[tokio::test]
async fn test_unexpected_status_is_error() {
    let dir = TempDir::new().unwrap();
    let checker = CommandOracle::new(
        "sh",
        vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()],
        Duration::from_secs(10),
    );
    let err = checker.verify(dir.path()).await.unwrap_err();
    match err {
        EliminationError::CheckerFailed { output, .. } => assert_eq!(output, "boom"),
        other => panic!("unexpected error: {other}"),
    }

    // Exit 3 can be declared a findings status.
    let checker = checker.with_finding_codes(vec![1, 3]);
    assert!(matches!(
        checker.verify(dir.path()).await.unwrap(),
        Verdict::Findings(_)
    ));
}

#[tokio::test]
async fn test_missing_binary_is_spawn_error() {
    let dir = TempDir::new().unwrap();
    let err = oracle("definitely-not-a-checker-binary", Duration::from_secs(10))
        .verify(dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, EliminationError::Spawn { .. }));
}

#[test]
fn test_pipeline_with_subprocess_checker() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/logger");
    let policy = Config::default().ignore_policy().unwrap();
    let checker = oracle("true", Duration::from_secs(10));
    let analysis = run(
        &root,
        &policy,
        Mode::Verified(&checker),
        &EliminationOptions {
            jobs: 1,
            progress: false,
        },
    )
    .unwrap();

    let unused: Vec<String> = analysis.unused().map(|m| m.qualified()).collect();
    assert_eq!(unused, vec!["example.com/logger.Logger.Debug(args ...string)".to_string()]);
    assert!(analysis
        .methods
        .iter()
        .any(|m| m.method == "Log" && m.status == MethodStatus::Used));
}
