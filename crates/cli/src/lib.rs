pub mod commands;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a `tracing` filter directive (e.g. `debug`).
pub const LOG_ENV: &str = "PATCHGUARD_LOG";

/// Install the stderr logger.
///
/// Stdout carries the verdict lines a wrapping harness reads, so log output
/// never goes there. `verbose` forces `debug` regardless of the environment.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A second install (tests calling into the library twice) is harmless.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

/// Parse a file offset given as decimal or `0x`-prefixed hex.
pub fn parse_offset(raw: &str) -> Result<u64> {
    let trimmed = raw.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };
    parsed.with_context(|| format!("Invalid offset '{raw}'"))
}
