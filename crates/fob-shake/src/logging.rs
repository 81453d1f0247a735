//! Subscriber setup for binaries embedding fob-shake.
//!
//! Only compiled with the `logging` feature. Library users install their own subscriber;
//! the passes only emit `tracing` events (`info` for run summaries, `debug` per module).

use std::sync::Once;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Verbosity of the shaking passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    /// Run summaries and skipped modules.
    #[default]
    Info,
    /// Every removed module, export and dropped edge.
    Debug,
    Trace,
}

impl LogLevel {
    fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Unrecognised log level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid log level `{0}` (expected silent, error, warn, info, debug or trace)")]
pub struct ParseLogLevelError(String);

impl std::str::FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ParseLogLevelError(other.to_string())),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_level_filter())
    }
}

/// Install a compact stderr subscriber at `level`, still honouring `RUST_LOG` directives.
///
/// Only the first call in a process takes effect.
///
/// ```rust,no_run
/// use fob_shake::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level.as_level_filter().into())
            .from_env_lossy();
        install(filter);
    });
}

/// Like [`init_logging`], but the level comes from `RUST_LOG` alone (`info` when unset).
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
        });
        install(filter);
    });
}

fn install(filter: EnvFilter) {
    // Timestamps are left to the embedding application.
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    if tracing_subscriber::registry().with(filter).with(layer).try_init().is_err() {
        tracing::debug!("[fob-shake] a global subscriber is already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" off ".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!(
            "loud".parse::<LogLevel>().unwrap_err(),
            ParseLogLevelError("loud".to_string())
        );
    }

    #[test]
    fn displays_as_filter_directive() {
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Silent.to_string(), "off");
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert!(LogLevel::Debug > LogLevel::Warn);
    }
}
