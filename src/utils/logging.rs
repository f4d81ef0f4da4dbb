//! Tracing setup

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "vidgrab=warn";

/// Install the stderr subscriber; `RUST_LOG` overrides the default filter.
/// `verbose` raises the default to debug.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("vidgrab=debug")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
