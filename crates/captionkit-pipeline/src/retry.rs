//! Retry Controller: bounded generate → rank → validate cycles.

use captionkit_core::{
    CaptionError, GenerationMode, GenerationRequest, PipelineSettings, RankedResult, VariantBatch,
};
use tokio_util::sync::CancellationToken;

use crate::entities::KeyEntity;
use crate::generator::VariantGenerator;
use crate::ranker::Ranker;
use crate::validators::{run_validators, ValidationContext, ValidatorKind, Verdict};

/// Controller state between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Attempt(u32),
    Success,
    /// Retries ran out; the last complete result is kept anyway.
    BestEffort,
    FallbackRequired,
}

/// Why the primary provider could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// Capability check reported the primary provider unavailable.
    NotConfigured,
    /// A primary call failed, retries ran out on parse errors, or the
    /// assembled result failed schema validation.
    PrimaryFailed(String),
}

/// Terminal outcome of a controller run.
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    /// All validators passed.
    Accepted {
        batch: VariantBatch,
        ranked: RankedResult,
        attempts: u32,
    },
    /// Validators still failed after the last attempt; the last result is
    /// kept anyway.
    BestEffort {
        batch: VariantBatch,
        ranked: RankedResult,
        attempts: u32,
        failed: ValidatorKind,
    },
    FallbackRequired(FallbackCause),
}

impl RetryOutcome {
    /// Terminal controller state this outcome corresponds to.
    pub fn state(&self) -> AttemptState {
        match self {
            RetryOutcome::Accepted { .. } => AttemptState::Success,
            RetryOutcome::BestEffort { .. } => AttemptState::BestEffort,
            RetryOutcome::FallbackRequired(_) => AttemptState::FallbackRequired,
        }
    }
}

/// One rewrite/image/text run's inputs, shared by every attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptInput<'a> {
    pub request: &'a GenerationRequest,
    pub mode: GenerationMode,
    pub entities: &'a [KeyEntity],
    /// Steering every attempt starts from; length-growth hints extend it.
    pub base_hint: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    generator: VariantGenerator,
    ranker: Ranker,
    settings: PipelineSettings,
}

impl RetryController {
    pub fn new(generator: VariantGenerator, ranker: Ranker, settings: PipelineSettings) -> Self {
        Self {
            generator,
            ranker,
            settings,
        }
    }

    /// Drive attempts until success, best-effort acceptance or fallback.
    ///
    /// Only cancellation is returned as an error; every other failure is
    /// folded into the outcome.
    pub async fn run(
        &self,
        input: AttemptInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, CaptionError> {
        let max_retries = self.settings.max_retries;
        let ctx = ValidationContext {
            request: input.request,
            mode: input.mode,
            entities: input.entities,
            settings: &self.settings,
        };

        let mut steering: Option<String> = input.base_hint.map(str::to_string);
        let mut best_effort: Option<(VariantBatch, RankedResult, ValidatorKind)> = None;
        let mut attempt: u32 = 0;

        let outcome = loop {
            tracing::debug!(state = ?AttemptState::Attempt(attempt), "Starting caption attempt");
            let is_last = attempt >= max_retries;

            let (batch, ranked) = match self.cycle(input, steering.as_deref(), cancel).await {
                Ok(pair) => pair,
                Err(CaptionError::Cancelled) => return Err(CaptionError::Cancelled),
                Err(err) if err.is_retryable() && !is_last => {
                    tracing::warn!(attempt, error = %err, "Primary output could not be parsed");
                    attempt += 1;
                    continue;
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, error = %err, "Primary output could not be parsed");
                    // A complete batch that only failed validation outranks the
                    // fallback, even when the final attempt produced garbage.
                    break match best_effort.take() {
                        Some((batch, ranked, failed)) => RetryOutcome::BestEffort {
                            batch,
                            ranked,
                            attempts: attempt + 1,
                            failed,
                        },
                        None => RetryOutcome::FallbackRequired(FallbackCause::PrimaryFailed(
                            err.to_string(),
                        )),
                    };
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "Primary provider call failed");
                    break RetryOutcome::FallbackRequired(FallbackCause::PrimaryFailed(
                        err.to_string(),
                    ));
                }
            };

            match run_validators(&ctx, &batch, &ranked) {
                Verdict::Pass => {
                    tracing::info!(
                        attempt,
                        winner_index = ranked.winner_index,
                        "Caption batch accepted"
                    );
                    break RetryOutcome::Accepted {
                        batch,
                        ranked,
                        attempts: attempt + 1,
                    };
                }
                Verdict::Fail { validator, hint } => {
                    tracing::warn!(
                        attempt,
                        validator = %validator,
                        hint_chars = hint.len(),
                        "Caption batch failed validation"
                    );
                    if is_last {
                        break RetryOutcome::BestEffort {
                            batch,
                            ranked,
                            attempts: attempt + 1,
                            failed: validator,
                        };
                    }
                    steering = Some(validator.composition().compose(input.base_hint, &hint));
                    best_effort = Some((batch, ranked, validator));
                    attempt += 1;
                }
            }
        };

        tracing::debug!(state = ?outcome.state(), "Retry controller finished");
        Ok(outcome)
    }

    async fn cycle(
        &self,
        input: AttemptInput<'_>,
        steering: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(VariantBatch, RankedResult), CaptionError> {
        let batch = self
            .generator
            .generate(input.request, input.mode, input.entities, steering, cancel)
            .await?;
        let ranked = self.ranker.rank(input.request, &batch, cancel).await?;
        Ok((batch, ranked))
    }
}
