//! Diagnostic logging using **tracing**.
//!
//! Diagnostics go to stderr so stdout carries only report lines.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Otherwise verbose mode enables debug output
/// for this crate and quiet mode shows errors only.
pub fn init(verbose: bool) {
    let default_directive = if verbose {
        "unused_interface_methods=debug"
    } else {
        "error"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
