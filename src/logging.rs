//! Logging configuration for the portal.
//!
//! Logs always go to stderr so stdout carries only query results.

use tracing_subscriber::EnvFilter;

/// Returns the default filter directive for the given verbosity.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Builds the filter from `RUST_LOG`, falling back to the verbosity default.
fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Initializes logging to stderr.
///
/// `RUST_LOG` wins over `verbose` when set.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}
