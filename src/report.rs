//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Text: one `UNUSED:` line per finding, plus verbose detail
//! - JSON: structured output for programmatic consumption

use std::io::{self, Write};

use colored::*;
use serde::Serialize;

use crate::eliminate::Outcome;
use crate::pipeline::{Analysis, MethodReport, MethodStatus};

// =============================================================================
// Text Format
// =============================================================================

/// Write the line-oriented report.
///
/// `UNUSED:` lines are always written and never colored. Verbose mode adds
/// an `OK:` line per retained method, the generic interfaces that were
/// skipped, embedded entries that were not analyzed, and name collisions.
/// Without verbose only a one-line generics summary is added.
pub fn write_text<W: Write>(out: &mut W, analysis: &Analysis, verbose: bool) -> io::Result<()> {
    for method in &analysis.methods {
        match method.status {
            MethodStatus::Unused => writeln!(
                out,
                "UNUSED: {} ({})",
                method.qualified(),
                method.position
            )?,
            _ if verbose => writeln!(
                out,
                "{} {} ({}) {}",
                "OK:".green(),
                method.qualified(),
                method.position,
                rationale(method).dimmed()
            )?,
            _ => {}
        }
    }

    if verbose {
        write_generic_details(out, analysis)?;
        for notice in &analysis.embedded {
            writeln!(
                out,
                "{} {} embeds {} at {}; methods reached only through it are not analyzed",
                "NOTE:".blue(),
                notice.interface,
                notice.embedded,
                notice.position
            )?;
        }
        for collision in &analysis.collisions {
            writeln!(
                out,
                "{} interface name {} is declared in {} packages ({}); each is analyzed separately",
                "NOTE:".blue(),
                collision.name,
                collision.packages.len(),
                collision.packages.join(", ")
            )?;
        }
    } else if !analysis.generics.is_empty() {
        writeln!(
            out,
            "{} {} generic interface(s) skipped ({} methods not analyzed)",
            "WARNING:".yellow(),
            analysis.generics.len(),
            analysis.skipped_generic_methods()
        )?;
    }
    Ok(())
}

fn write_generic_details<W: Write>(out: &mut W, analysis: &Analysis) -> io::Result<()> {
    if analysis.generics.is_empty() {
        return Ok(());
    }
    writeln!(
        out,
        "{} skipped {} generic interface(s), type parameters are not analyzed:",
        "WARNING:".yellow(),
        analysis.generics.len()
    )?;
    for generic in &analysis.generics {
        writeln!(
            out,
            "  - '{}{}' at {} ({} methods skipped)",
            generic.interface_name, generic.type_params, generic.position, generic.method_count
        )?;
    }
    Ok(())
}

/// Why a method was kept.
fn rationale(method: &MethodReport) -> String {
    if let Some(evidence) = method.evidence.iter().find(|e| !e.is_weak()) {
        return format!("{} at {}", evidence.kind.as_str(), evidence.position);
    }
    match &method.outcome {
        Some(Outcome::StillUsed { findings }) => match findings.first() {
            Some(first) => format!("checker objects to removal: {}", first),
            None => "checker objects to removal".to_string(),
        },
        Some(Outcome::TimedOut) => "checker timed out, not confirmed".to_string(),
        _ => match method.evidence.first() {
            Some(weak) => format!("{} at {}", weak.kind.as_str(), weak.position),
            None => "not confirmed".to_string(),
        },
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// JSON report structure.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    pub path: &'a str,
    pub unused_count: usize,
    #[serde(flatten)]
    pub analysis: &'a Analysis,
}

/// Write results in JSON format.
pub fn write_json<W: Write>(out: &mut W, path: &str, analysis: &Analysis) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        path,
        unused_count: analysis.unused().count(),
        analysis,
    };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
}
