//! Domain models for caption generation

pub mod facts;
pub mod platform;
pub mod request;
pub mod result;
pub mod variant;

pub use facts::ImageFacts;
pub use platform::Platform;
pub use request::{GenerationMode, GenerationRequest};
pub use result::{GenerationResult, ProviderKind, RankedResult};
pub use variant::{RawVariant, SafetyLevel, Variant, VariantBatch};
