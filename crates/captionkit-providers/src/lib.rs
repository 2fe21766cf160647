//! Captionkit provider adapters
//!
//! Trait abstractions over the generative services the caption pipeline
//! drives (primary text provider, vision fact extractor, fallback provider),
//! plus the Gemini and OpenAI HTTP implementations. Pipelines receive these as
//! constructor-injected `Arc<dyn ...>` handles.

mod error;
mod gemini;
mod json;
mod openai;
mod provider;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use json::extract_json_text;
pub use openai::OpenAiFallbackProvider;
pub use provider::{
    prompt_text, FactExtractor, FallbackInput, FallbackProvider, PrimaryProvider, PromptBlock,
};
