//! Racing provider calls against cancellation and the configured timeout.

use captionkit_core::CaptionError;
use captionkit_providers::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why a guarded provider call produced no value.
#[derive(Debug)]
pub(crate) enum CallFailure {
    Cancelled,
    Provider(ProviderError),
}

impl CallFailure {
    /// Classification used for primary provider calls.
    ///
    /// A provider-level parse failure is retryable like a malformed batch;
    /// everything else, timeouts included, is a hard failure that routes to
    /// the fallback.
    pub(crate) fn into_primary_error(self, provider: &str) -> CaptionError {
        match self {
            CallFailure::Cancelled => CaptionError::Cancelled,
            CallFailure::Provider(ProviderError::Parse(msg)) => CaptionError::Parse(msg),
            CallFailure::Provider(err) => CaptionError::Provider(format!("{}: {}", provider, err)),
        }
    }

    /// Classification used for fallback calls, where only cancellation is
    /// distinguishable from a fatal failure.
    pub(crate) fn into_fallback_error(self, provider: &str) -> CaptionError {
        match self {
            CallFailure::Cancelled => CaptionError::Cancelled,
            CallFailure::Provider(err) => CaptionError::Fallback(format!("{}: {}", provider, err)),
        }
    }
}

/// Await `call` unless the token fires or the timeout elapses first.
///
/// On cancellation the in-flight future is dropped, which aborts the
/// underlying HTTP request.
pub(crate) async fn guarded<T, F>(
    call: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, CallFailure>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CallFailure::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(result) => result.map_err(CallFailure::Provider),
            Err(_) => Err(CallFailure::Provider(ProviderError::Timeout(timeout))),
        },
    }
}
