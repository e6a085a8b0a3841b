//! Logging setup for binaries.
//!
//! The library logs through the `log` facade; this installs a `tracing`
//! subscriber and forwards `log` records into it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::TelemetryError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

/// `RUST_LOG` when set, otherwise `default_level` (e.g. `info` or
/// `docusearch=debug`).
pub fn build_filter(default_level: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_level)?),
    }
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(format: LogFormat, default_level: &str) -> Result<(), TelemetryError> {
    let filter = build_filter(default_level)?;
    LogTracer::init()?;

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_writer(std::io::stderr),
                )
                .with(filter),
        )?,
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter),
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Text ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(TelemetryError::UnknownFormat(_))
        ));
    }

    #[test]
    #[serial]
    fn test_build_filter() {
        std::env::remove_var("RUST_LOG");
        assert!(build_filter("docusearch=debug,info").is_ok());
        assert!(matches!(
            build_filter("docusearch=loud"),
            Err(TelemetryError::Filter(_))
        ));
    }
}
