//! Error types for SpotAlert

use thiserror::Error;

/// Result type alias using SpotAlert's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for SpotAlert startup and wiring
///
/// Nothing inside a poll cycle returns these; price and delivery failures are
/// carried as [`UnavailableReason`](crate::models::UnavailableReason) and
/// [`SinkError`](crate::alerting::SinkError) instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing credentials, unreadable config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the process was started with unusable settings
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_flagged() {
        assert!(Error::config("missing TwilioAccount").is_configuration());
        assert!(Error::validation("threshold must be positive").is_configuration());
    }

    #[tokio::test]
    async fn test_http_errors_are_not_configuration() {
        let err: Error = reqwest::get("not a url").await.unwrap_err().into();
        assert!(!err.is_configuration());
        assert!(err.to_string().starts_with("HTTP client error"));
    }

    #[test]
    fn test_error_display() {
        let err = Error::config("ToNumber value not found");
        assert_eq!(err.to_string(), "Configuration error: ToNumber value not found");
    }
}
