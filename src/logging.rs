//! Tracing subscriber setup.
//!
//! Logs go to stderr so command output on stdout (including `--json`)
//! stays machine-readable. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(verbose: bool) {
    let default = if verbose { "repodoc=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding in another binary) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
