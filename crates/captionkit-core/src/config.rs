//! Configuration module
//!
//! [`CaptionConfig`] is read from the environment (and `.env`) by binaries.
//! The pipeline itself only consumes the plain [`PipelineSettings`] value so
//! tests can build it directly.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_DUPLICATE_PREFIX_CHARS, DEFAULT_HINT_MAX_CHARS,
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_ALT_CHARS, DEFAULT_MIN_FACT_COVERAGE,
    DEFAULT_PROVIDER_TIMEOUT_SECS, MAX_BATCH_SIZE, MAX_RETRIES_LIMIT,
};

const GEMINI_MODEL: &str = "gemini-1.5-flash";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_MODEL: &str = "gpt-4o-mini";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Tunables for one pipeline instance.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    /// Variants requested per generation call
    pub batch_size: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Salient facts that must be referenced in image mode
    pub min_fact_coverage: usize,
    pub hint_max_chars: usize,
    pub duplicate_prefix_chars: usize,
    pub min_alt_chars: usize,
    /// Budget for a single provider call
    pub provider_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            min_fact_coverage: DEFAULT_MIN_FACT_COVERAGE,
            hint_max_chars: DEFAULT_HINT_MAX_CHARS,
            duplicate_prefix_chars: DEFAULT_DUPLICATE_PREFIX_CHARS,
            min_alt_chars: DEFAULT_MIN_ALT_CHARS,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(anyhow::anyhow!(
                "CAPTION_BATCH_SIZE must be between 1 and {}",
                MAX_BATCH_SIZE
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(anyhow::anyhow!(
                "CAPTION_MAX_RETRIES must not exceed {}",
                MAX_RETRIES_LIMIT
            ));
        }
        if self.hint_max_chars < 32 {
            return Err(anyhow::anyhow!(
                "CAPTION_HINT_MAX_CHARS must be at least 32"
            ));
        }
        if self.duplicate_prefix_chars == 0 {
            return Err(anyhow::anyhow!(
                "CAPTION_DUPLICATE_PREFIX_CHARS must be greater than 0"
            ));
        }
        Ok(())
    }
}

/// Application configuration: provider credentials plus pipeline tunables.
#[derive(Clone, Debug)]
pub struct CaptionConfig {
    pub environment: String,
    // Primary provider (Gemini)
    pub gemini_enabled: bool,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    // Fallback provider (OpenAI)
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub pipeline: PipelineSettings,
}

impl CaptionConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let provider_timeout_secs = env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_PROVIDER_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS);

        let pipeline = PipelineSettings {
            batch_size: env::var("CAPTION_BATCH_SIZE")
                .unwrap_or_else(|_| DEFAULT_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_BATCH_SIZE),
            max_retries: env::var("CAPTION_MAX_RETRIES")
                .unwrap_or_else(|_| DEFAULT_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(DEFAULT_MAX_RETRIES),
            min_fact_coverage: env::var("CAPTION_MIN_FACT_COVERAGE")
                .unwrap_or_else(|_| DEFAULT_MIN_FACT_COVERAGE.to_string())
                .parse()
                .unwrap_or(DEFAULT_MIN_FACT_COVERAGE),
            hint_max_chars: env::var("CAPTION_HINT_MAX_CHARS")
                .unwrap_or_else(|_| DEFAULT_HINT_MAX_CHARS.to_string())
                .parse()
                .unwrap_or(DEFAULT_HINT_MAX_CHARS),
            duplicate_prefix_chars: env::var("CAPTION_DUPLICATE_PREFIX_CHARS")
                .unwrap_or_else(|_| DEFAULT_DUPLICATE_PREFIX_CHARS.to_string())
                .parse()
                .unwrap_or(DEFAULT_DUPLICATE_PREFIX_CHARS),
            min_alt_chars: env::var("CAPTION_MIN_ALT_CHARS")
                .unwrap_or_else(|_| DEFAULT_MIN_ALT_CHARS.to_string())
                .parse()
                .unwrap_or(DEFAULT_MIN_ALT_CHARS),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
        };

        let config = CaptionConfig {
            environment,
            gemini_enabled: env::var("GEMINI_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| GEMINI_MODEL.to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| GEMINI_BASE_URL.to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|s| !s.trim().is_empty()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| OPENAI_MODEL.to_string()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| OPENAI_BASE_URL.to_string()),
            pipeline,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// The primary provider is usable only when enabled and keyed.
    pub fn gemini_configured(&self) -> bool {
        self.gemini_enabled && self.gemini_api_key.is_some()
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.pipeline.validate()?;

        // Without a fallback there is no degradation path at all.
        if self.openai_api_key.is_none() && self.is_production() {
            return Err(anyhow::anyhow!(
                "OPENAI_API_KEY must be set in production: it backs the fallback provider"
            ));
        }

        for (name, url) in [
            ("GEMINI_BASE_URL", &self.gemini_base_url),
            ("OPENAI_BASE_URL", &self.openai_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("{} must be an http(s) URL", name));
            }
        }

        Ok(())
    }
}
