// src/logging.rs

//! Logging setup for `dicy` using `tracing` + `tracing-subscriber`.
//!
//! The filter is resolved in this order:
//! 1. `--log-level` CLI flag, applied to every target
//! 2. `DICY_LOG`, a full filter directive (e.g. `info,dicy::engine=debug`)
//! 3. `info`
//!
//! Logs go to STDERR. Tool diagnostics re-emitted by the `log` command travel
//! through the same subscriber under the `dicy::diagnostics` target.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

const ENV_VAR: &str = "DICY_LOG";

/// Initialise the global subscriber. Call once, from `main`.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let directive = filter_directive(cli_level, std::env::var(ENV_VAR).ok().as_deref());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter `{directive}`"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialised: {e}"))?;

    Ok(())
}

/// The filter directive for the given flag and environment value.
fn filter_directive(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    if let Some(level) = cli_level {
        return level_name(level).to_string();
    }
    match env.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_lowercase().replace("warning", "warn"),
        _ => "info".to_string(),
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_environment() {
        assert_eq!(
            filter_directive(Some(LogLevel::Debug), Some("error")),
            "debug"
        );
    }

    #[test]
    fn environment_directives_pass_through() {
        assert_eq!(
            filter_directive(None, Some(" Warning,dicy::engine=trace ")),
            "warn,dicy::engine=trace"
        );
        assert_eq!(filter_directive(None, Some("")), "info");
        assert_eq!(filter_directive(None, None), "info");
    }
}
