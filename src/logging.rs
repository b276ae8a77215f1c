// src/logging.rs

//! Subscriber installation for the `loadgraph` binary.
//!
//! The filter is taken from, in order:
//! 1. `--log-level`
//! 2. `LOADGRAPH_LOG`, which accepts any `EnvFilter` directive string such
//!    as `debug` or `warn,loadgraph::engine=debug`
//! 3. `info`
//!
//! Logs go to stderr; progress lines and the run summary use stdout.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "LOADGRAPH_LOG";

/// Install the global subscriber. Fails if one is already installed or the
/// directives in `LOADGRAPH_LOG` do not parse.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Resolve the filter from the CLI flag and the raw `LOADGRAPH_LOG` value.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(level.as_str()));
    }

    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid {LOG_ENV} value '{directives}'")),
        None => Ok(EnvFilter::new("info")),
    }
}
