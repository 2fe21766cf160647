//! Error types module
//!
//! All pipeline failures are unified under [`CaptionError`]. The variants follow
//! how the pipeline reacts to them: parse and schema errors are retried, provider
//! failures route to the fallback provider, and a fallback failure is fatal.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like invalid requests
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - lets upstream handlers map errors without
/// matching on message strings.
pub trait ErrorMetadata {
    /// HTTP status code an upstream handler should return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PARSE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (never exposes provider internals)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to parse provider output: {0}")]
    Parse(String),

    #[error("Provider call failed: {0}")]
    Provider(String),

    #[error("Result failed schema validation: {0}")]
    Schema(String),

    #[error("Fallback provider failed: {0}")]
    Fallback(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl CaptionError {
    /// Parse and schema errors are retried inside the generate/rank loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptionError::Parse(_) | CaptionError::Schema(_))
    }
}

impl From<serde_json::Error> for CaptionError {
    fn from(err: serde_json::Error) -> Self {
        CaptionError::Parse(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for CaptionError {
    fn from(err: validator::ValidationErrors) -> Self {
        CaptionError::InvalidRequest(format!("Validation error: {}", err))
    }
}

impl ErrorMetadata for CaptionError {
    fn http_status_code(&self) -> u16 {
        match self {
            CaptionError::InvalidRequest(_) => 400,
            CaptionError::Cancelled => 499,
            CaptionError::Fallback(_) => 502,
            CaptionError::Parse(_) | CaptionError::Schema(_) | CaptionError::Provider(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CaptionError::InvalidRequest(_) => "INVALID_REQUEST",
            CaptionError::Parse(_) => "PARSE_ERROR",
            CaptionError::Provider(_) => "PROVIDER_ERROR",
            CaptionError::Schema(_) => "SCHEMA_ERROR",
            CaptionError::Fallback(_) => "FALLBACK_FAILED",
            CaptionError::Cancelled => "CANCELLED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, CaptionError::InvalidRequest(_))
    }

    fn client_message(&self) -> String {
        match self {
            CaptionError::InvalidRequest(ref msg) => msg.clone(),
            CaptionError::Cancelled => "Caption generation was cancelled".to_string(),
            _ => "Caption generation is temporarily unavailable".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            CaptionError::InvalidRequest(_) | CaptionError::Cancelled => LogLevel::Debug,
            CaptionError::Parse(_) | CaptionError::Schema(_) | CaptionError::Provider(_) => {
                LogLevel::Warn
            }
            CaptionError::Fallback(_) => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_fallback() {
        let err = CaptionError::Fallback("OpenAI returned 500".to_string());
        assert_eq!(err.http_status_code(), 502);
        assert_eq!(err.error_code(), "FALLBACK_FAILED");
        assert!(!err.client_message().contains("OpenAI"));
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_invalid_request() {
        let err = CaptionError::InvalidRequest("existing caption is required".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "existing caption is required");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CaptionError::Parse("bad json".to_string()).is_retryable());
        assert!(CaptionError::Schema("empty hashtags".to_string()).is_retryable());
        assert!(!CaptionError::Provider("timeout".to_string()).is_retryable());
        assert!(!CaptionError::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: CaptionError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, CaptionError::Parse(_)));
    }
}
