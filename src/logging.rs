//! Log output setup
//!
//! Logs go to stderr so stdout stays clean for the summary and `--json`.
//! `RUST_LOG` wins over the command line flags.

use tracing_subscriber::EnvFilter;

fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)))
}

/// Install the global subscriber; later calls are no-ops
pub fn init(verbose: bool, quiet: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
