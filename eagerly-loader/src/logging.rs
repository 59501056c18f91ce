//! Logging setup.
//!
//! The loader emits `tracing` events: `debug` for resolved trees and batched
//! fetches, `trace` for each resolved path segment. Nothing is printed unless
//! a subscriber is installed, either by the application or by [`init`].
//!
//! # Environment Variables
//!
//! - `EAGERLY_DEBUG=true|1|yes` - Enable debug logging
//! - `EAGERLY_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `EAGERLY_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! [`init`] installs a subscriber only with the `tracing-subscriber` feature.
//!
//! ```rust,no_run
//! use eagerly_loader::logging;
//!
//! logging::init();
//! ```

use std::fmt;
use std::sync::Once;

use crate::config::{EnvSource, StdEnvSource};

/// Variable enabling debug logging.
pub const DEBUG_VAR: &str = "EAGERLY_DEBUG";
/// Variable selecting the log level.
pub const LOG_LEVEL_VAR: &str = "EAGERLY_LOG_LEVEL";
/// Variable selecting the output format.
pub const LOG_FORMAT_VAR: &str = "EAGERLY_LOG_FORMAT";

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Level directive applied to the eagerly crates.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from an environment source.
    ///
    /// Returns `None` when neither debug logging nor a level was requested.
    pub fn from_env_source<S: EnvSource>(env: &S) -> Option<Self> {
        let debug = is_debug_enabled_in(env);
        if !debug && !env.contains(LOG_LEVEL_VAR) {
            return None;
        }

        let fallback = if debug { "debug" } else { "warn" };
        let level = env
            .get(LOG_LEVEL_VAR)
            .map(|raw| match raw.to_lowercase().as_str() {
                "trace" => "trace",
                "debug" => "debug",
                "info" => "info",
                "warn" => "warn",
                "error" => "error",
                _ => fallback,
            })
            .unwrap_or(fallback);
        let format = env
            .get(LOG_FORMAT_VAR)
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();

        Some(Self { level, format })
    }

    /// Filter directive for the eagerly crates.
    pub fn directive(&self) -> String {
        format!("eagerly={},eagerly_loader={}", self.level, self.level)
    }
}

/// Check if `EAGERLY_DEBUG` is set to "true", "1" or "yes" (case-insensitive).
pub fn is_debug_enabled() -> bool {
    is_debug_enabled_in(&StdEnvSource)
}

fn is_debug_enabled_in<S: EnvSource>(env: &S) -> bool {
    env.get(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Initialize logging from the process environment.
///
/// Subsequent calls are no-ops.
pub fn init() {
    if let Some(settings) = LogSettings::from_env_source(&StdEnvSource) {
        init_with(settings);
    }
}

/// Initialize logging with explicit settings.
///
/// Subsequent calls, including [`init`], are no-ops.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| install(&settings));
}

#[cfg(feature = "tracing-subscriber")]
fn install(settings: &LogSettings) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_new(settings.directive()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            level = settings.level,
            format = %settings.format,
            "Eagerly logging initialized"
        );
    }
}

#[cfg(not(feature = "tracing-subscriber"))]
fn install(_settings: &LogSettings) {}
