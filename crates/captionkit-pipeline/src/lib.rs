//! Captionkit Pipeline
//!
//! Turns a caption request into a single validated [`GenerationResult`]:
//! a primary provider generates a batch of variants and ranks them,
//! validators decide whether to retry with an escalated hint, and a fallback
//! provider takes over when the primary is unavailable or fails.
//!
//! [`GenerationResult`]: captionkit_core::GenerationResult

mod call;
pub mod entities;
pub mod fallback;
pub mod finalize;
pub mod generator;
pub mod hint;
pub mod normalize;
pub mod pipeline;
pub mod ranker;
pub mod retry;
pub mod rewrite;
pub mod titles;
pub mod validators;

pub use entities::{extract_key_entities, EntityKind, KeyEntity};
pub use fallback::FallbackAdapter;
pub use generator::VariantGenerator;
pub use hint::serialize_hint;
pub use pipeline::CaptionPipeline;
pub use ranker::Ranker;
pub use retry::{AttemptState, FallbackCause, RetryController, RetryOutcome};
pub use rewrite::enforce_rewrite_invariants;
pub use titles::derive_titles;
pub use validators::{HintComposition, ValidatorKind, Verdict};
