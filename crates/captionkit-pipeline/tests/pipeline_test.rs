use captionkit_core::{
    validate_generation_result, CaptionError, GenerationRequest, ImageFacts, PipelineSettings,
    Platform, ProviderKind, RawVariant,
};
use captionkit_pipeline::validators::normalized_prefix;
use captionkit_pipeline::{extract_key_entities, CaptionPipeline};
use captionkit_providers::fake::{ScriptedPrimary, StaticFactExtractor, StaticFallback};
use captionkit_providers::ProviderError;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LAUNCH: &str = "Launch day! RSVP at https://example.com/launch with @LaunchHQ on 12/25 for the \"Mega Launch\" by MegaCorp™ #LaunchDay";

struct Harness {
    primary: Arc<ScriptedPrimary>,
    vision: Arc<StaticFactExtractor>,
    fallback: Arc<StaticFallback>,
    pipeline: CaptionPipeline,
}

fn harness_with(
    primary: ScriptedPrimary,
    vision: StaticFactExtractor,
    fallback: StaticFallback,
    settings: PipelineSettings,
) -> Harness {
    let primary = Arc::new(primary);
    let vision = Arc::new(vision);
    let fallback = Arc::new(fallback);
    let pipeline = CaptionPipeline::new(primary.clone(), vision.clone(), fallback.clone(), settings);
    Harness {
        primary,
        vision,
        fallback,
        pipeline,
    }
}

fn harness(primary: ScriptedPrimary) -> Harness {
    harness_with(
        primary,
        StaticFactExtractor::new(ImageFacts::new(json!({}))),
        StaticFallback::new(fallback_variant()),
        PipelineSettings::default(),
    )
}

fn fallback_variant() -> RawVariant {
    RawVariant {
        caption: Some("Fresh drop from the studio today".to_string()),
        hashtags: Some(vec!["#studio".to_string(), "#newdrop".to_string()]),
        safety_level: Some("normal".to_string()),
        alt: Some("A creator holding a new product in a bright studio".to_string()),
        ..RawVariant::default()
    }
}

fn batch_json(captions: &[&str]) -> String {
    let items: Vec<_> = captions
        .iter()
        .map(|caption| {
            json!({
                "caption": caption,
                "hashtags": ["#coffee", "#morning", "#ritual"],
                "safety_level": "normal",
                "mood": "cozy",
                "style": "warm",
                "cta": "Tell me your order",
                "alt": "A cheerful photo shared by the creator this morning",
                "nsfw": false
            })
        })
        .collect();
    serde_json::to_string(&items).unwrap()
}

fn ranking_json(winner: usize) -> String {
    json!({
        "winner_index": winner,
        "scores": [7.5, 8, 6, 9, 5],
        "reason": "Strongest hook for the platform"
    })
    .to_string()
}

const UNIQUE: [&str; 5] = [
    "First sip, then everything else",
    "Foam art is my love language",
    "Monday fuel in a ceramic cup",
    "Slow mornings taste better",
    "Espresso and good intentions",
];

fn text_request() -> GenerationRequest {
    GenerationRequest::new(Platform::Instagram, "playful")
        .with_theme("morning coffee")
        .with_hint("mention \"oat milk\"\nif it fits")
}

#[tokio::test]
async fn test_duplicate_batch_triggers_one_retry() {
    let same = ["Coffee first, always"; 5];
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&same))
            .with_response(ranking_json(0))
            .with_response(batch_json(&UNIQUE))
            .with_response(ranking_json(3)),
    );

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();

    let prompts = h.primary.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(!prompts[0].contains("You already wrote"));
    assert!(prompts[2].contains("You already wrote"));
    // the user hint is quoted data on every attempt
    assert!(prompts[2].contains(r#"Creator hint: "mention \"oat milk\" / if it fits""#));

    assert_eq!(result.provider, ProviderKind::Primary);
    assert_eq!(result.final_variant.caption, "Slow mornings taste better");
    assert_eq!(result.ranked.winner_index, 3);
    assert_eq!(h.fallback.call_count(), 0);
    validate_generation_result(&result, 20).unwrap();
}

/// Captions of the batch handed to the ranker, read back from its prompt.
fn ranked_captions(prompt: &str) -> Vec<String> {
    let line = prompt
        .lines()
        .find_map(|l| l.strip_prefix("Candidates (JSON): "))
        .unwrap();
    let candidates: Vec<serde_json::Value> = serde_json::from_str(line).unwrap();
    candidates
        .iter()
        .map(|c| c["caption"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_accepted_batch_has_unique_prefixes() {
    // same opening once case and punctuation are ignored
    let near_duplicates = [
        "Coffee first, always!",
        "coffee FIRST... always",
        "Foam art is my love language",
        "Monday fuel in a ceramic cup",
        "Slow mornings taste better",
    ];
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&near_duplicates))
            .with_response(ranking_json(0))
            .with_response(batch_json(&UNIQUE))
            .with_response(ranking_json(1)),
    );
    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();

    let prompts = h.primary.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[2].contains("You already wrote"));

    let prefix_chars = PipelineSettings::default().duplicate_prefix_chars;
    let prefixes = |captions: &[String]| -> HashSet<String> {
        captions
            .iter()
            .map(|c| normalized_prefix(c, prefix_chars))
            .collect()
    };

    let rejected = ranked_captions(&prompts[1]);
    assert!(prefixes(&rejected).len() < rejected.len());

    let accepted = ranked_captions(&prompts[3]);
    assert_eq!(accepted.len(), 5);
    assert_eq!(prefixes(&accepted).len(), accepted.len());
    assert_eq!(result.final_variant.caption, accepted[1]);
    assert!(!result.titles.is_empty());
    assert_eq!(result.final_variant.titles, result.titles);
}

#[tokio::test]
async fn test_disabled_primary_uses_fallback() {
    let h = harness(ScriptedPrimary::not_configured());

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Fallback);
    assert_eq!(
        result.ranked.reason,
        "OpenAI fallback selected because Gemini API is not configured"
    );
    assert_eq!(h.primary.call_count(), 0);
    assert_eq!(h.fallback.call_count(), 1);
    assert!(!result.titles.is_empty());
    validate_generation_result(&result, 20).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["provider"], "fallback");
}

#[tokio::test]
async fn test_provider_error_routes_to_fallback() {
    let h = harness(ScriptedPrimary::new().with_error(ProviderError::ApiError {
        status: 503,
        message: "model overloaded, internal trace id 1234".to_string(),
    }));

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Fallback);
    assert_eq!(
        result.ranked.reason,
        "OpenAI fallback: Gemini variants unavailable"
    );
    assert!(!result.ranked.reason.contains("1234"));
    validate_generation_result(&result, 20).unwrap();
}

#[tokio::test]
async fn test_ranker_failure_routes_to_fallback() {
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&UNIQUE))
            .with_error(ProviderError::RequestFailed("connection reset".to_string())),
    );

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.provider, ProviderKind::Fallback);
    assert_eq!(h.primary.call_count(), 2);
}

#[tokio::test]
async fn test_rewrite_retries_with_growth_hint() {
    let original = "Basic caption here";
    let first = [
        "Basic caption here",
        "Short one",
        "Tiny",
        "Nope",
        "Meh",
    ];
    let second = [
        "Basic caption here, now with a real hook and a reason to stay",
        "A longer take that opens differently",
        "Third attempt with more words",
        "Fourth variant that grows too",
        "Fifth and final longer option",
    ];
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&first))
            .with_response(ranking_json(0))
            .with_response(batch_json(&second))
            .with_response(ranking_json(0)),
    );

    let request = GenerationRequest::new(Platform::Instagram, "friendly").with_existing_caption(original);
    let result = h
        .pipeline
        .rewrite_existing(request, &CancellationToken::new())
        .await
        .unwrap();

    let prompts = h.primary.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(!prompts[0].contains("20% longer"));
    assert!(prompts[2].contains("20% longer"));
    // growth hint extends the base rewrite hint
    assert!(prompts[2].contains("Rewrite the existing caption for Instagram"));

    assert_eq!(result.provider, ProviderKind::Primary);
    assert_eq!(result.final_variant.caption, second[0]);
    assert!(result.final_variant.caption.chars().count() > original.chars().count());
    assert!(!result.ranked.reason.contains("best effort"));
}

#[tokio::test]
async fn test_rewrite_best_effort_still_grows() {
    let original = "Basic caption here";
    let same_length = ["Basic caption here", "Other text", "Another", "Fourth", "Fifth"];
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&same_length))
            .with_response(ranking_json(0))
            .with_response(batch_json(&same_length))
            .with_response(ranking_json(0)),
    );

    let request = GenerationRequest::new(Platform::Instagram, "friendly").with_existing_caption(original);
    let result = h
        .pipeline
        .rewrite_existing(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Primary);
    assert!(result.ranked.reason.contains("best effort after 2 attempts"));
    assert!(result.ranked.reason.contains("length_growth"));
    assert!(result.final_variant.caption.chars().count() > original.chars().count());
    assert_eq!(result.ranked.final_variant.caption, result.final_variant.caption);
}

#[tokio::test]
async fn test_rewrite_keeps_key_entities() {
    let dropped = [
        "Launch day is here! Come celebrate the Mega Launch with MegaCorp and friends tonight",
        "Second variant about the launch party",
        "Third variant with other words",
        "Fourth variant is also here",
        "Fifth variant closes the batch",
    ];
    let kept = [
        "It's Launch day! RSVP at https://example.com/launch with @LaunchHQ on 12/25 for the \"Mega Launch\" by MegaCorp™ and bring a friend #LaunchDay",
        "Second variant about the launch party",
        "Third variant with other words",
        "Fourth variant is also here",
        "Fifth variant closes the batch",
    ];
    let h = harness(
        ScriptedPrimary::new()
            .with_response(batch_json(&dropped))
            .with_response(ranking_json(0))
            .with_response(batch_json(&kept))
            .with_response(ranking_json(0)),
    );

    let request = GenerationRequest::new(Platform::Instagram, "hype").with_existing_caption(LAUNCH);
    let result = h
        .pipeline
        .rewrite_existing(request, &CancellationToken::new())
        .await
        .unwrap();

    let prompts = h.primary.prompts();
    assert!(prompts[2].contains("ABSOLUTE RULE"));
    for entity in extract_key_entities(LAUNCH) {
        assert!(
            result.final_variant.caption.contains(&entity.text),
            "missing {}",
            entity.text
        );
    }
    assert!(result.final_variant.caption.chars().count() > LAUNCH.chars().count());
}

#[tokio::test]
async fn test_rewrite_fallback_keeps_invariants() {
    let h = harness(ScriptedPrimary::not_configured());
    let request = GenerationRequest::new(Platform::X, "hype").with_existing_caption(LAUNCH);

    let result = h
        .pipeline
        .rewrite_existing(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Fallback);
    for entity in extract_key_entities(LAUNCH) {
        assert!(result.final_variant.caption.contains(&entity.text));
    }
    assert!(result.final_variant.caption.chars().count() > LAUNCH.chars().count());
    assert_eq!(
        h.fallback.inputs()[0].existing_caption.as_deref(),
        Some(LAUNCH)
    );
}

#[tokio::test]
async fn test_image_pipeline_enforces_fact_coverage() {
    let facts = ImageFacts::new(json!({
        "objects": ["latte", "croissant"],
        "setting": "cafe terrace",
    }));
    let vague = [
        "Living my best life",
        "Good vibes only today",
        "Weekend mode activated",
        "Nothing but smiles",
        "Happy place found",
    ];
    let grounded = [
        "A latte and a warm croissant on the cafe terrace",
        "Good vibes only today",
        "Weekend mode activated",
        "Nothing but smiles",
        "Happy place found",
    ];
    let h = harness_with(
        ScriptedPrimary::new()
            .with_response(batch_json(&vague))
            .with_response(ranking_json(0))
            .with_response(batch_json(&grounded))
            .with_response(ranking_json(0)),
        StaticFactExtractor::new(facts),
        StaticFallback::new(fallback_variant()),
        PipelineSettings::default(),
    );

    let request = GenerationRequest::new(Platform::Instagram, "cozy");
    let result = h
        .pipeline
        .generate_from_image(
            "https://cdn.example.com/brunch.jpg",
            request,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        h.vision.image_urls(),
        vec!["https://cdn.example.com/brunch.jpg".to_string()]
    );
    let calls = h.primary.calls();
    assert!(matches!(
        &calls[0][0],
        captionkit_providers::PromptBlock::ImageUrl(url) if url == "https://cdn.example.com/brunch.jpg"
    ));
    let prompts = h.primary.prompts();
    assert!(prompts[0].contains("croissant"));
    assert!(prompts[2].contains("Mention at least 2"));
    assert_eq!(result.final_variant.caption, grounded[0]);
}

#[tokio::test]
async fn test_image_pipeline_survives_vision_failure() {
    let h = harness_with(
        ScriptedPrimary::new()
            .with_response(batch_json(&UNIQUE))
            .with_response(ranking_json(2)),
        StaticFactExtractor::failing(ProviderError::ApiError {
            status: 500,
            message: "vision down".to_string(),
        }),
        StaticFallback::new(fallback_variant()),
        PipelineSettings::default(),
    );

    let result = h
        .pipeline
        .generate_from_image(
            "https://cdn.example.com/a.jpg",
            GenerationRequest::new(Platform::Instagram, "cozy"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Primary);
    assert_eq!(result.final_variant.caption, UNIQUE[2]);
    assert!(!h.primary.prompts()[0].contains("Visible image facts"));
}

#[tokio::test]
async fn test_parse_errors_exhaust_into_fallback() {
    let h = harness(
        ScriptedPrimary::new()
            .with_response("Sorry, I cannot help with that.")
            .with_response(batch_json(&UNIQUE[..2])),
    );

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.provider, ProviderKind::Fallback);
    assert_eq!(h.primary.call_count(), 2);
    assert!(result.ranked.reason.contains("variants unavailable"));
}

#[tokio::test]
async fn test_timeout_routes_to_fallback() {
    let settings = PipelineSettings {
        provider_timeout: Duration::from_millis(20),
        ..PipelineSettings::default()
    };
    let h = harness_with(
        ScriptedPrimary::new()
            .with_delay(Duration::from_secs(5))
            .with_response(batch_json(&UNIQUE)),
        StaticFactExtractor::new(ImageFacts::new(json!({}))),
        StaticFallback::new(fallback_variant()),
        settings,
    );

    let result = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.provider, ProviderKind::Fallback);
}

#[tokio::test]
async fn test_cancellation_stops_in_flight_call() {
    let h = harness(
        ScriptedPrimary::new()
            .with_delay(Duration::from_secs(5))
            .with_response(batch_json(&UNIQUE)),
    );
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = h
        .pipeline
        .generate_from_text(text_request(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionError::Cancelled));
    assert_eq!(h.primary.call_count(), 1);
    assert_eq!(h.fallback.call_count(), 0);
}

#[tokio::test]
async fn test_fallback_failure_is_propagated() {
    let h = harness_with(
        ScriptedPrimary::not_configured(),
        StaticFactExtractor::new(ImageFacts::new(json!({}))),
        StaticFallback::failing(ProviderError::ApiError {
            status: 401,
            message: "Incorrect API key provided".to_string(),
        }),
        PipelineSettings::default(),
    );

    let err = h
        .pipeline
        .generate_from_text(text_request(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CaptionError::Fallback(_)));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_any_call() {
    let h = harness(ScriptedPrimary::new());
    let token = CancellationToken::new();

    let err = h
        .pipeline
        .rewrite_existing(GenerationRequest::new(Platform::X, "dry"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptionError::InvalidRequest(_)));

    let err = h
        .pipeline
        .generate_from_text(GenerationRequest::new(Platform::X, "dry"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptionError::InvalidRequest(_)));

    let err = h
        .pipeline
        .generate_from_image("not a url", GenerationRequest::new(Platform::X, "dry"), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptionError::InvalidRequest(_)));

    assert_eq!(h.primary.call_count(), 0);
    assert_eq!(h.fallback.call_count(), 0);
}
