//! Ranker: a second primary provider call that picks the winning variant.

use captionkit_core::{
    CaptionError, GenerationRequest, PipelineSettings, RankedResult, RawVariant, SafetyLevel,
    Variant, VariantBatch,
};
use captionkit_providers::{extract_json_text, PrimaryProvider, PromptBlock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::call::guarded;
use crate::hint::serialize_hint;

/// Ranking object as the provider returns it.
#[derive(Debug, Deserialize)]
struct RankingResponse {
    #[serde(alias = "winnerIndex", alias = "winner")]
    winner_index: i64,
    #[serde(default)]
    scores: Vec<f64>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default, rename = "final")]
    final_variant: Option<RawVariant>,
}

#[derive(Serialize)]
struct Candidate<'a> {
    index: usize,
    caption: &'a str,
    hashtags: &'a [String],
    cta: &'a str,
    mood: &'a str,
    style: &'a str,
    safety_level: &'a str,
}

#[derive(Debug, Clone)]
pub struct Ranker {
    primary: Arc<dyn PrimaryProvider>,
    settings: PipelineSettings,
}

impl Ranker {
    pub fn new(primary: Arc<dyn PrimaryProvider>, settings: PipelineSettings) -> Self {
        Self { primary, settings }
    }

    pub fn build_prompt(&self, request: &GenerationRequest, batch: &VariantBatch) -> Vec<PromptBlock> {
        let candidates: Vec<Candidate<'_>> = batch
            .iter()
            .enumerate()
            .map(|(index, v)| Candidate {
                index,
                caption: &v.caption,
                hashtags: &v.hashtags,
                cta: &v.cta,
                mood: &v.mood,
                style: &v.style,
                safety_level: v.safety_level.as_str(),
            })
            .collect();

        let text = [
            format!(
                "Rank these {} caption candidates for {} written in a {} voice.",
                batch.len(),
                request.platform.display_name(),
                serialize_hint(&request.voice, self.settings.hint_max_chars, true)
            ),
            format!(
                "Candidates (JSON): {}",
                serde_json::to_string(&candidates).unwrap_or_default()
            ),
            "Score each candidate from 0 to 10 for hook strength, clarity, platform fit and voice match.".to_string(),
            "Respond with a JSON object: {\"winner_index\": integer, \"scores\": [one number per candidate, in order], \"reason\": string, \"final\": the winning candidate object}.".to_string(),
        ]
        .join("\n");

        vec![PromptBlock::Text(text)]
    }

    pub async fn rank(
        &self,
        request: &GenerationRequest,
        batch: &VariantBatch,
        cancel: &CancellationToken,
    ) -> Result<RankedResult, CaptionError> {
        let blocks = self.build_prompt(request, batch);
        tracing::debug!(
            provider = self.primary.name(),
            candidates = batch.len(),
            "Requesting ranking"
        );

        let text = guarded(
            self.primary.complete(&blocks),
            self.settings.provider_timeout,
            cancel,
        )
        .await
        .map_err(|failure| failure.into_primary_error(self.primary.name()))?;

        self.parse_ranking(&text, batch)
    }

    /// Parse and reconcile a ranking response against its batch.
    ///
    /// The batch entry at `winner_index` is authoritative; a diverging
    /// `final` object from the provider is logged and discarded.
    pub fn parse_ranking(&self, text: &str, batch: &VariantBatch) -> Result<RankedResult, CaptionError> {
        let response: RankingResponse = serde_json::from_str(extract_json_text(text))?;

        let winner_index = usize::try_from(response.winner_index)
            .ok()
            .filter(|&i| i < batch.len())
            .ok_or_else(|| {
                CaptionError::Parse(format!(
                    "winner_index {} is outside 0..{}",
                    response.winner_index,
                    batch.len()
                ))
            })?;

        if response.scores.len() != batch.len() {
            return Err(CaptionError::Parse(format!(
                "expected {} scores, got {}",
                batch.len(),
                response.scores.len()
            )));
        }
        if response.scores.iter().any(|s| !s.is_finite()) {
            return Err(CaptionError::Parse("scores must be finite".to_string()));
        }

        let winner = batch
            .get(winner_index)
            .cloned()
            .ok_or_else(|| CaptionError::Parse("winner missing from batch".to_string()))?;

        if let Some(claimed) = response.final_variant {
            let fields = diverging_fields(&claimed, &winner);
            if !fields.is_empty() {
                tracing::warn!(
                    winner_index,
                    fields = ?fields,
                    "Ranker final diverged from the batch entry; using the batch entry"
                );
            }
        }

        let reason = response
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| format!("Candidate {} scored highest", winner_index));

        Ok(RankedResult {
            winner_index,
            scores: response.scores,
            reason,
            final_variant: winner,
        })
    }
}

/// Fields of the ranker's echoed `final` that differ from the batch entry.
///
/// Fields the provider left out of the echo are not compared.
fn diverging_fields(claimed: &RawVariant, winner: &Variant) -> Vec<&'static str> {
    fn differs(claimed: &Option<String>, actual: &str) -> bool {
        claimed.as_deref().is_some_and(|c| c.trim() != actual.trim())
    }
    fn tag_key(tag: &str) -> String {
        tag.trim().trim_start_matches('#').to_lowercase()
    }

    let mut fields = Vec::new();
    if differs(&claimed.caption, &winner.caption) {
        fields.push("caption");
    }
    if let Some(tags) = &claimed.hashtags {
        let claimed_tags: Vec<String> = tags.iter().map(|t| tag_key(t)).collect();
        let winner_tags: Vec<String> = winner.hashtags.iter().map(|t| tag_key(t)).collect();
        if claimed_tags != winner_tags {
            fields.push("hashtags");
        }
    }
    if claimed
        .safety_level
        .as_deref()
        .is_some_and(|level| SafetyLevel::normalize(level) != winner.safety_level)
    {
        fields.push("safety_level");
    }
    if differs(&claimed.mood, &winner.mood) {
        fields.push("mood");
    }
    if differs(&claimed.style, &winner.style) {
        fields.push("style");
    }
    if differs(&claimed.cta, &winner.cta) {
        fields.push("cta");
    }
    if differs(&claimed.alt, &winner.alt) {
        fields.push("alt");
    }
    if claimed.nsfw.is_some_and(|nsfw| nsfw != winner.nsfw) {
        fields.push("nsfw");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionkit_core::Platform;
    use captionkit_providers::fake::ScriptedPrimary;
    use captionkit_providers::prompt_text;

    fn variant(caption: &str) -> Variant {
        Variant {
            caption: caption.to_string(),
            hashtags: vec!["#one".to_string()],
            safety_level: SafetyLevel::Normal,
            mood: "happy".to_string(),
            style: "casual".to_string(),
            cta: "Follow for more".to_string(),
            alt: "A bright photo of a sunny street".to_string(),
            nsfw: false,
            titles: Vec::new(),
        }
    }

    fn batch() -> VariantBatch {
        VariantBatch::new(vec![variant("Alpha"), variant("Beta"), variant("Gamma")])
    }

    fn ranker() -> Ranker {
        Ranker::new(Arc::new(ScriptedPrimary::new()), PipelineSettings::default())
    }

    #[test]
    fn test_prompt_lists_candidates() {
        let request = GenerationRequest::new(Platform::Reddit, "dry");
        let text = prompt_text(&ranker().build_prompt(&request, &batch()));
        assert!(text.contains("Rank these 3"));
        assert!(text.contains(r#""index":1,"caption":"Beta""#));
        assert!(text.contains("Reddit"));
    }

    #[test]
    fn test_parse_ranking() {
        let ranked = ranker()
            .parse_ranking(
                r#"{"winner_index": 1, "scores": [6, 9.5, 7], "reason": "Best hook", "final": {"caption": "Beta"}}"#,
                &batch(),
            )
            .unwrap();
        assert_eq!(ranked.winner_index, 1);
        assert_eq!(ranked.scores, vec![6.0, 9.5, 7.0]);
        assert_eq!(ranked.reason, "Best hook");
        assert_eq!(ranked.final_variant.caption, "Beta");
    }

    #[test]
    fn test_divergent_final_trusts_winner_index() {
        let ranked = ranker()
            .parse_ranking(
                r#"{"winner_index": 2, "scores": [1, 2, 3], "final": {"caption": "Gamma, but rewritten"}}"#,
                &batch(),
            )
            .unwrap();
        assert_eq!(ranked.final_variant, variant("Gamma"));
        assert_eq!(ranked.reason, "Candidate 2 scored highest");
    }

    #[test]
    fn test_diverging_fields_beyond_caption() {
        let claimed: RawVariant = serde_json::from_str(
            r##"{"caption": "Gamma", "hashtags": ["#one", "#extra"], "alt": "Something else entirely", "mood": "happy"}"##,
        )
        .unwrap();
        assert_eq!(
            diverging_fields(&claimed, &variant("Gamma")),
            vec!["hashtags", "alt"]
        );

        let echo: RawVariant = serde_json::from_str(
            r#"{"caption": " Gamma ", "hashtags": ["One"], "safety_level": "normal", "nsfw": false}"#,
        )
        .unwrap();
        assert!(diverging_fields(&echo, &variant("Gamma")).is_empty());
    }

    #[test]
    fn test_out_of_range_winner_is_parse_error() {
        for text in [
            r#"{"winner_index": 3, "scores": [1, 2, 3]}"#,
            r#"{"winner_index": -1, "scores": [1, 2, 3]}"#,
        ] {
            let err = ranker().parse_ranking(text, &batch()).unwrap_err();
            assert!(err.is_retryable(), "{}", text);
        }
    }

    #[test]
    fn test_score_count_mismatch_is_parse_error() {
        let err = ranker()
            .parse_ranking(r#"{"winner_index": 0, "scores": [1, 2]}"#, &batch())
            .unwrap_err();
        assert!(matches!(err, CaptionError::Parse(_)));
    }
}
