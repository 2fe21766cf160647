//! Captionkit Core Library
//!
//! This crate provides the domain models, error types, configuration, and result
//! schema validation shared by the provider adapters, the caption pipeline, and
//! the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{CaptionConfig, PipelineSettings};
pub use error::{CaptionError, ErrorMetadata, LogLevel};
pub use models::{
    GenerationMode, GenerationRequest, GenerationResult, ImageFacts, Platform, ProviderKind,
    RankedResult, RawVariant, SafetyLevel, Variant, VariantBatch,
};
pub use validation::validate_generation_result;
