//! Diagnostic logging for the command-line tool.
//!
//! Library code only emits `tracing` events; installing a subscriber is up
//! to the binary. `NATIVE_PATCHER_LOG` takes `EnvFilter` directives and wins
//! over `-v` flags.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "NATIVE_PATCHER_LOG";

/// Filter directive for a count of `-v` flags.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber, writing to stderr.
///
/// A second call is a no-op.
pub fn init(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbosity))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
