//! Captionkit CLI: generate, ground and rewrite social media captions.
//!
//! Reads provider keys from the environment (or `.env`): GEMINI_API_KEY for
//! the primary provider and OPENAI_API_KEY for the fallback.

mod telemetry;

use anyhow::Context;
use captionkit_core::{CaptionConfig, GenerationRequest, GenerationResult, ImageFacts, Platform};
use captionkit_pipeline::CaptionPipeline;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "captionkit", about = "Social media caption generator")]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Caption an image, grounded in what the image shows
    Image {
        /// Public URL of the image
        #[arg(long)]
        image_url: String,
        /// Path to a JSON file with precomputed image facts
        #[arg(long)]
        facts: Option<std::path::PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Caption from a theme and optional context
    Text {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        context: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rewrite an existing caption, keeping its key entities
    Rewrite {
        /// Caption to rewrite
        #[arg(long)]
        caption: String,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// instagram, x, reddit, tiktok, facebook, onlyfans, fansly
    #[arg(long, default_value = "instagram")]
    platform: Platform,
    /// Tone of voice, e.g. playful or professional
    #[arg(long, default_value = "friendly")]
    voice: String,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    mood: Option<String>,
    /// Free-text steering passed to the model as data
    #[arg(long)]
    hint: Option<String>,
}

impl CommonArgs {
    fn into_request(self) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.platform, self.voice);
        if let Some(style) = self.style {
            request = request.with_style(style);
        }
        if let Some(mood) = self.mood {
            request = request.with_mood(mood);
        }
        if let Some(hint) = self.hint {
            request = request.with_hint(hint);
        }
        request
    }
}

fn load_facts(path: &std::path::Path) -> anyhow::Result<ImageFacts> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts file {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).context("Facts file is not valid JSON")?;
    Ok(ImageFacts::new(value))
}

fn print_json(result: &GenerationResult) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(result).context("Serialize result")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.json_logs);

    let config = CaptionConfig::from_env().context("Failed to load configuration")?;
    if !config.gemini_configured() {
        tracing::warn!("Gemini is not configured; captions will come from the fallback provider");
    }
    let pipeline = CaptionPipeline::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Image {
            image_url,
            facts,
            common,
        } => {
            let mut request = common.into_request();
            if let Some(path) = facts {
                request = request.with_facts(load_facts(&path)?);
            }
            pipeline
                .generate_from_image(&image_url, request, &cancel)
                .await?
        }
        Commands::Text {
            theme,
            context,
            common,
        } => {
            let mut request = common.into_request();
            if let Some(theme) = theme {
                request = request.with_theme(theme);
            }
            if let Some(context) = context {
                request = request.with_context(context);
            }
            pipeline.generate_from_text(request, &cancel).await?
        }
        Commands::Rewrite { caption, common } => {
            let request = common.into_request().with_existing_caption(caption);
            pipeline.rewrite_existing(request, &cancel).await?
        }
    };

    print_json(&result)
}
