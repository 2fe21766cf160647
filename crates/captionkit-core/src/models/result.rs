use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Variant;

/// Which provider produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Primary,
    Fallback,
}

/// Outcome of ranking one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Index into the batch that produced this ranking
    pub winner_index: usize,
    /// One score per variant, same order as the batch
    pub scores: Vec<f64>,
    pub reason: String,
    #[serde(rename = "final")]
    pub final_variant: Variant,
}

/// Public output of every pipeline entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub provider: ProviderKind,
    #[serde(rename = "final")]
    pub final_variant: Variant,
    pub titles: Vec<String>,
    pub ranked: RankedResult,
    pub generated_at: DateTime<Utc>,
}
