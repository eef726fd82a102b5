//! Tracing setup for the okusuri binary.
//!
//! Diagnostics always go to stderr so that stdout stays machine-readable
//! for `--json` output. `RUST_LOG` overrides whatever level is chosen here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when neither `RUST_LOG` nor `-v` is given
pub const DEFAULT_LEVEL: &str = "warn";

/// Default level for a repeated `-v` flag count
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => DEFAULT_LEVEL,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init() {
    init_with_level(DEFAULT_LEVEL)
}

/// Install the global subscriber with `default_level` unless `RUST_LOG` is set
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Route logs through the test harness
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
