//! Structured logging configuration.

use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Default filter directive when no environment override is set.
pub const DEFAULT_FILTER: &str = "srcorigin=info";

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directives.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds the configuration from the environment.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `SRCORIGIN_LOG` | filter directives (wins over `RUST_LOG`) |
    /// | `RUST_LOG` | filter directives |
    /// | `SRCORIGIN_LOG_FORMAT` | `pretty` or `json` |
    /// | `SRCORIGIN_LOG_FILE` | log file path |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(filter) = ["SRCORIGIN_LOG", "RUST_LOG"]
            .iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
        {
            config.filter = filter;
        }
        if let Some(format) = std::env::var("SRCORIGIN_LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.format = format;
        }
        if let Ok(file) = std::env::var("SRCORIGIN_LOG_FILE") {
            config.file = Some(PathBuf::from(file));
        }
        config
    }

    /// Sets the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the directives do not parse.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| Error::Configuration(format!("invalid log filter '{}': {e}", self.filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", LogFormat::Json)]
    #[test_case("JSON", LogFormat::Json)]
    #[test_case("pretty", LogFormat::Pretty)]
    #[test_case("text", LogFormat::Pretty)]
    fn test_parse_format(input: &str, expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>(), Ok(expected));
    }

    #[test]
    fn test_parse_unknown_format() {
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_bad_filter_is_configuration_error() {
        let config = LoggingConfig::default().with_filter("srcorigin=notalevel");
        assert!(matches!(config.env_filter(), Err(Error::Configuration(_))));
        assert!(LoggingConfig::default().env_filter().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = LoggingConfig::default()
            .with_filter("srcorigin=debug")
            .with_format(LogFormat::Json);
        assert_eq!(config.filter, "srcorigin=debug");
        assert_eq!(config.format, LogFormat::Json);
    }
}
