//! Custom error types for the sentinel

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Exchange connection failed: {exchange} - {message}")]
    ExchangeConnection {
        exchange: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("Exchange call timed out: {exchange} after {timeout:?}")]
    Timeout {
        exchange: String,
        timeout: Duration,
    },

    #[error("Invalid order on {exchange}: {reason}")]
    InvalidOrder {
        exchange: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Health monitor failure: {message}")]
    Monitor {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    pub fn connection(exchange: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExchangeConnection {
            exchange: exchange.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Connectivity problems are worth another attempt; everything else
    /// is a caller or configuration mistake.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SentinelError::ExchangeConnection { .. } | SentinelError::Timeout { .. }
        )
    }
}

pub type SentinelResult<T> = Result<T, SentinelError>;
