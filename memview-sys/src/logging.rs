//! Logging setup on top of `tracing-subscriber`.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter, takes precedence when set
//! - `MEMVIEW_LOG_LEVEL`: `error`, `warn`, `info`, `debug` or `trace` (default `info`)
//! - `MEMVIEW_LOG_FORMAT`: `human` or `json` (default `human`)

use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "MEMVIEW_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "MEMVIEW_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, LoggingError> {
        let level = match std::env::var(LOG_LEVEL_ENV) {
            Ok(level) => level.parse()?,
            Err(_) => LogLevel::default(),
        };
        let format = match std::env::var(LOG_FORMAT_ENV) {
            Ok(format) => format.parse()?,
            Err(_) => LogFormat::default(),
        };
        Ok(Self { level, format })
    }
}

/// Installs the global subscriber from the environment. Idempotent.
pub fn init_logging() -> Result<(), LoggingError> {
    init_with_config(&LoggingConfig::from_env()?)
}

/// Installs the global subscriber. Only the first successful call has an effect.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    TRACING_INITIALIZED
        .get_or_try_init(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));
            let registry = tracing_subscriber::registry().with(filter);
            let res = match config.format {
                LogFormat::Human => registry.with(fmt::layer().with_target(true)).try_init(),
                LogFormat::Json => registry
                    .with(fmt::layer().json().with_target(false))
                    .try_init(),
            };
            res.map_err(|e| LoggingError::Init(e.to_string()))
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::{init_with_config, LogFormat, LogLevel, LoggingConfig, LoggingError};

    #[test]
    fn parse_levels() {
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!(matches!(
            "loud".parse::<LogLevel>(),
            Err(LoggingError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn parse_formats() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_is_idempotent() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Human,
        };
        init_with_config(&config).unwrap();
        init_with_config(&config).unwrap();
        tracing::debug!("logging initialised");
    }
}
