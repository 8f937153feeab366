//! Command-line interface.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use crate::config::Config;
use crate::eliminate::{CommandOracle, EliminationOptions, DEFAULT_CHECKER};
use crate::logging;
use crate::pipeline::{self, Mode};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_UNUSED: i32 = 1;
pub const EXIT_ERROR: i32 = 1;

/// Find Go interface methods that are declared but never used.
///
/// Every method with no call site provably reaching it through its
/// interface is removed from a scratch copy of the module, one at a time,
/// and the copy is re-checked. Methods whose removal keeps the module clean
/// are reported as unused.
#[derive(Parser, Debug)]
#[command(name = "unused-interface-methods")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Show used methods, skipped generic interfaces and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report methods with no evidence without running the checker
    #[arg(long)]
    pub fast: bool,

    /// Checker command run in each scratch copy
    #[arg(long, default_value = DEFAULT_CHECKER)]
    pub checker: String,

    /// Seconds before a checker run is abandoned
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Concurrent checker runs (default: available cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Run the analysis and print the report. Returns the process exit code.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    logging::init(cli.verbose);

    if cli.format != "text" && cli.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'text' or 'json'", cli.format);
        return Ok(EXIT_ERROR);
    }

    let config = Config::load(cli.config.as_deref())?;
    let policy = config.ignore_policy()?;
    debug!(patterns = ?policy.patterns(), "ignore policy");

    let checker = if cli.fast {
        None
    } else {
        match CommandOracle::from_command_line(&cli.checker, Duration::from_secs(cli.timeout)) {
            Some(checker) => Some(checker),
            None => {
                eprintln!("Error: empty checker command");
                return Ok(EXIT_ERROR);
            }
        }
    };
    let mode = match &checker {
        Some(checker) => Mode::Verified(checker),
        None => Mode::Fast,
    };

    let mut options = EliminationOptions {
        progress: !cli.verbose && io::stderr().is_terminal(),
        ..Default::default()
    };
    if let Some(jobs) = cli.jobs {
        options.jobs = jobs.max(1);
    }

    let analysis = pipeline::run(&cli.path, &policy, mode, &options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.format == "json" {
        report::write_json(&mut out, &cli.path.to_string_lossy(), &analysis)?;
    } else {
        report::write_text(&mut out, &analysis, cli.verbose)?;
    }
    out.flush()?;

    if analysis.has_unused() {
        Ok(EXIT_UNUSED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["unused-interface-methods"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.checker, DEFAULT_CHECKER);
        assert_eq!(cli.timeout, 120);
        assert!(!cli.fast && !cli.verbose);
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "unused-interface-methods",
            "-v",
            "--fast",
            "--checker",
            "go vet ./...",
            "--jobs",
            "2",
            "./svc",
        ])
        .unwrap();
        assert!(cli.verbose && cli.fast);
        assert_eq!(cli.checker, "go vet ./...");
        assert_eq!(cli.jobs, Some(2));
        assert_eq!(cli.path, PathBuf::from("./svc"));
    }

    #[test]
    fn test_help_is_not_a_parse_failure() {
        let err = Cli::try_parse_from(["unused-interface-methods", "-h"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
