//! Pipeline defaults shared across crates.

/// Number of candidate captions requested per generation call.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Retries after the first generate/rank cycle (two cycles in total).
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Salient image facts a caption (or its alt text) must mention.
pub const DEFAULT_MIN_FACT_COVERAGE: usize = 2;

/// Ceiling for any hint spliced into a provider instruction.
pub const DEFAULT_HINT_MAX_CHARS: usize = 400;

/// Caption prefix length compared by the duplicate check.
pub const DEFAULT_DUPLICATE_PREFIX_CHARS: usize = 40;

/// Minimum accessibility text length exposed to callers.
pub const DEFAULT_MIN_ALT_CHARS: usize = 20;

pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Upper bounds accepted by configuration validation.
pub const MAX_BATCH_SIZE: usize = 10;
pub const MAX_RETRIES_LIMIT: u32 = 3;

/// Backfill used when a provider returns a variant without hashtags.
pub const DEFAULT_HASHTAGS: [&str; 3] = ["#creator", "#newpost", "#contentcreator"];

pub const DEFAULT_MOOD: &str = "neutral";
pub const DEFAULT_STYLE: &str = "authentic";

/// Title of last resort when nothing usable can be derived from a caption.
pub const DEFAULT_TITLE: &str = "New post";
pub const MAX_TITLE_CHARS: usize = 80;
pub const MAX_TITLES: usize = 3;
