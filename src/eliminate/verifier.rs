//! The verification oracle: an independent whole-program checker run over a
//! workspace directory.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::EliminationError;

/// Default checker invocation.
pub const DEFAULT_CHECKER: &str = "staticcheck ./...";

/// Default bound on a single checker run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

lazy_static! {
    /// `path/file.go:12:5: message`
    static ref FINDING_LINE: Regex = Regex::new(r"^(\S+?):(\d+):(\d+): (.*)$").unwrap();
}

/// Outcome of verifying one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// No findings.
    Clean,
    /// The checker reported problems, one entry per finding.
    Findings(Vec<String>),
    /// The checker did not finish in time. Proves nothing.
    TimedOut,
}

/// Checks a source tree as a whole.
pub trait VerificationOracle: Send + Sync {
    /// Short name for diagnostics.
    fn name(&self) -> &str;

    /// Verify the tree rooted at `dir`. Findings are a verdict; only failure
    /// to run the checker at all is an error.
    fn verify<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, Result<Verdict, EliminationError>>;
}

/// Runs an external checker as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    finding_codes: Vec<i32>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            finding_codes: vec![1],
        }
    }

    /// Build from a whitespace-separated command line. `None` when empty.
    pub fn from_command_line(command: &str, timeout: Duration) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self::new(program, words.collect(), timeout))
    }

    /// Exit codes that mean "findings reported" rather than "checker broke".
    pub fn with_finding_codes(mut self, codes: Vec<i32>) -> Self {
        self.finding_codes = codes;
        self
    }

    async fn run(&self, dir: &Path) -> Result<Verdict, EliminationError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output.map_err(|source| EliminationError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                warn!(
                    checker = %self.program,
                    seconds = self.timeout.as_secs(),
                    dir = %dir.display(),
                    "checker timed out"
                );
                return Ok(Verdict::TimedOut);
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            return Ok(Verdict::Clean);
        }
        match output.status.code() {
            Some(code) if self.finding_codes.contains(&code) => {
                let findings = parse_findings(&text);
                debug!(checker = %self.program, findings = findings.len(), "checker reported findings");
                Ok(Verdict::Findings(findings))
            }
            _ => Err(EliminationError::CheckerFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                output: text.trim().to_string(),
            }),
        }
    }
}

impl VerificationOracle for CommandOracle {
    fn name(&self) -> &str {
        &self.program
    }

    fn verify<'a>(&'a self, dir: &'a Path) -> BoxFuture<'a, Result<Verdict, EliminationError>> {
        Box::pin(self.run(dir))
    }
}

/// Finding lines of checker output. Falls back to every non-empty line when
/// nothing looks like `file:line:col: message`, so a failing run is never
/// mistaken for a clean one.
pub fn parse_findings(output: &str) -> Vec<String> {
    let matched: Vec<String> = output
        .lines()
        .filter(|line| FINDING_LINE.is_match(line))
        .map(str::to_string)
        .collect();
    if !matched.is_empty() {
        return matched;
    }
    let all: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if all.is_empty() {
        vec!["checker exited with findings status and no output".to_string()]
    } else {
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_findings_prefers_positioned_lines() {
        let output = "-: some preamble\nstore/store.go:12:2: undefined: Debug (compile)\nmain.go:3:1: x is unused (U1000)\n";
        assert_eq!(
            parse_findings(output),
            vec![
                "store/store.go:12:2: undefined: Debug (compile)".to_string(),
                "main.go:3:1: x is unused (U1000)".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_findings_falls_back_to_raw_output() {
        assert_eq!(
            parse_findings("\nsomething broke\n\n"),
            vec!["something broke".to_string()]
        );
        assert_eq!(parse_findings("").len(), 1);
    }

    #[test]
    fn test_command_line_split() {
        let oracle = CommandOracle::from_command_line("  go vet ./... ", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(oracle.program, "go");
        assert_eq!(oracle.args, vec!["vet".to_string(), "./...".to_string()]);
        assert!(CommandOracle::from_command_line("   ", DEFAULT_TIMEOUT).is_none());
    }
}
