use std::time::Duration;

use thiserror::Error;

/// Error type for provider calls.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::RequestFailed(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::RequestFailed(err.to_string())
        }
    }
}
