//! Logging init: stderr, filtered by `RUST_LOG` or the `-v` count.

use tracing_subscriber::EnvFilter;

/// Default directive for a given number of `-v` flags.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Initialize structured logging to stderr. `RUST_LOG` takes precedence over
/// the verbosity flag.
pub fn init_logging(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
