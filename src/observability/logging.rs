//! Log subscriber setup for binaries.
//!
//! # Responsibilities
//! - Build an `EnvFilter` from `RUST_LOG`, falling back to the configured level
//! - Choose between human-readable and JSON output
//!
//! Library code only emits `tracing` events; calling [`init`] is left to `main`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Builds the filter used by [`init`].
///
/// `RUST_LOG` wins when set and parseable; otherwise `navigation_engine` logs at `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("navigation_engine={level}")))
}

/// Installs the global subscriber, writing to stderr. Returns false if one was already installed.
pub fn init(level: &str, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(level));
    let result = match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let w: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(w.format, LogFormat::Json);
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }

    #[test]
    fn test_init_twice_reports_second_failure() {
        let first = init("debug", LogFormat::Pretty);
        let second = init("debug", LogFormat::Json);
        // Another test may have installed a subscriber first.
        assert!(!(first && second));
        assert!(!second);
    }
}
