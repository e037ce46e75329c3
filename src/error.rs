//! Provider error types and failure classification
//!
//! `BackendError` is what a provider adapter returns. `ModelClient` maps it onto
//! an [`ErrorClass`], which decides whether an attempt is retried on the same
//! provider, escalated to the next provider in the fallback chain, or dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during a single provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in milliseconds)
    TimeoutError { millis: u64 },

    /// Rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// Invalid or malformed request rejected by the provider
    InvalidRequest { message: String },

    /// Configuration error (missing API keys, unknown provider, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { millis } => {
                write!(f, "Request timed out after {} ms", millis)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidRequest { message } => {
                write!(f, "Invalid request: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// Maps this error onto the retry taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            BackendError::RateLimitError { .. } => ErrorClass::RateLimited,
            BackendError::TimeoutError { .. } => ErrorClass::Timeout,
            BackendError::NetworkError { .. } => ErrorClass::TransientNetwork,
            BackendError::AuthenticationError { .. }
            | BackendError::InvalidRequest { .. }
            | BackendError::ConfigurationError { .. } => ErrorClass::Unrecoverable,
            BackendError::ApiError {
                message,
                status_code: Some(code),
            } => classify_status(*code).unwrap_or_else(|| classify_message(message)),
            BackendError::ApiError { message, .. } | BackendError::Other { message } => {
                classify_message(message)
            }
        }
    }
}

/// Failure classes that drive retry and fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Provider throttled us; retry the same provider with backoff
    RateLimited,
    /// Connection reset, DNS failure, 5xx; retry once then fall back
    TransientNetwork,
    /// No answer within the per-call timeout; retry once then fall back
    Timeout,
    /// Bad request or credentials; never retried
    Unrecoverable,
}

impl ErrorClass {
    /// Whether the next provider in the fallback chain should be tried
    pub fn escalates(self) -> bool {
        !matches!(self, ErrorClass::Unrecoverable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::TransientNetwork => "transient_network",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Unrecoverable => "unrecoverable",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a provider call after the retry budget is spent
#[derive(Debug, Clone, Error)]
#[error("{provider} failed after {attempts} attempt(s) [{class}]: {message}")]
pub struct ClassifiedError {
    pub class: ErrorClass,
    pub provider: String,
    pub attempts: u32,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(
        class: ErrorClass,
        provider: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            class,
            provider: provider.into(),
            attempts,
            message: message.into(),
        }
    }
}

fn classify_status(code: u16) -> Option<ErrorClass> {
    match code {
        429 => Some(ErrorClass::RateLimited),
        408 | 504 => Some(ErrorClass::Timeout),
        500..=599 => Some(ErrorClass::TransientNetwork),
        400..=499 => Some(ErrorClass::Unrecoverable),
        _ => None,
    }
}

/// Classifies a free-form provider error message.
///
/// Provider SDKs rarely surface structured status codes, so this looks for the
/// code or a telltale phrase in the text. Anything unrecognised is treated as
/// transient: one retry and a fallback are cheaper than losing the task.
pub fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        return ErrorClass::RateLimited;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return ErrorClass::Timeout;
    }
    if lower.contains("400 ")
        || lower.contains("401")
        || lower.contains("403")
        || lower.contains("404")
        || lower.contains("bad request")
        || lower.contains("unauthorized")
        || lower.contains("invalid api key")
        || lower.contains("model not found")
    {
        return ErrorClass::Unrecoverable;
    }

    ErrorClass::TransientNetwork
}
