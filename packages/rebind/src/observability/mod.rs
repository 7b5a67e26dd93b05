// packages/rebind/src/observability/mod.rs
//! Diagnostics for the preloaded shim
//!
//! All events are emitted through `tracing`. Inside a preloaded process no
//! subscriber exists unless the crate was built with the `diagnostics`
//! feature, in which case the bind hook installs one on first use:
//!
//! - Output goes to stderr so it never mixes with the host's stdout
//! - `REBIND_LOG` holds an `EnvFilter` directive (default `rebind=trace`)
//! - `REBIND_LOG_FORMAT=json` switches to one JSON object per line

use crate::utils::errors::{RebindError, Result};
use crate::BuildInfo;
use tracing_subscriber::EnvFilter;

/// Filter directive variable
pub const LOG_FILTER_VAR: &str = "REBIND_LOG";

/// Output format variable
pub const LOG_FORMAT_VAR: &str = "REBIND_LOG_FORMAT";

const DEFAULT_FILTER: &str = "rebind=trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_VAR).ok().as_deref())
    }
}

/// Filter built from `REBIND_LOG`, falling back to the default directive
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the stderr subscriber and log which shim build is loaded.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter());

    let result = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    result.map_err(|e| RebindError::Observability(e.to_string()))?;

    tracing::info!("{} loaded into pid {}", BuildInfo::current(), std::process::id());
    Ok(())
}

/// Install the subscriber once per process, ignoring failures
#[cfg(feature = "diagnostics")]
pub fn ensure_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();

    INIT.call_once(|| {
        // The host may already own the global subscriber; then its
        // configuration wins.
        let _ = init_tracing();
    });
}
