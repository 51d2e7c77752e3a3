//! Error types for the SOL/USD price pollers

use crate::types::TradingStatus;
use thiserror::Error;

/// Errors that can occur when fetching a price from a source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("HTTP {status}")]
    Http { status: u16 },

    /// HTTP 429 from the source
    #[error("HTTP 429 (rate limited)")]
    RateLimitExceeded,

    /// Upstream returned an error object (e.g. JSON-RPC error)
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,

    /// Invalid response body from the source
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Account data did not match the expected layout
    #[error("Decode error: {0}")]
    Decode(String),

    /// Account, feed or quote is missing
    #[error("{0}")]
    Unavailable(String),

    /// Oracle has not published a currently valid price
    #[error("price not ready (status: {0})")]
    NotTrading(TradingStatus),

    /// Price is older than the configured bound
    #[error("price too old (age: {age_secs}s, max: {max_age_secs}s)")]
    Stale { age_secs: u64, max_age_secs: u64 },

    /// The source panicked while fetching
    #[error("source panicked: {0}")]
    Panicked(String),
}

/// Failure classification used to pick the report status.
///
/// Every kind ends the current poll cycle and is reported; none of them stops
/// the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Resource, account or feed not found, or not tradable
    Unavailable,
    /// Data present but outside the freshness bound
    Stale,
    /// Network, HTTP or upstream API failure
    Transport,
    /// Malformed response body or account layout
    Decode,
    /// Bug inside a source
    Internal,
}

impl SourceError {
    /// Creates an Unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a Decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Maps a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimitExceeded
        } else {
            Self::Http {
                status: status.as_u16(),
            }
        }
    }

    /// Classifies the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::Unavailable(_) | SourceError::NotTrading(_) => ErrorKind::Unavailable,
            SourceError::Stale { .. } => ErrorKind::Stale,
            SourceError::NetworkError(e) if e.is_decode() => ErrorKind::Decode,
            SourceError::NetworkError(_)
            | SourceError::Http { .. }
            | SourceError::RateLimitExceeded
            | SourceError::ApiError(_)
            | SourceError::Timeout => ErrorKind::Transport,
            SourceError::InvalidResponse(_) | SourceError::Decode(_) => ErrorKind::Decode,
            SourceError::Panicked(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised while building configuration at start-up
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("{var} must be set")]
    Missing { var: &'static str },

    /// A variable is set but cannot be used
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    /// An env file exists but cannot be read or parsed
    #[error("cannot load {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

impl ConfigError {
    /// Creates an Invalid error
    pub fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}
