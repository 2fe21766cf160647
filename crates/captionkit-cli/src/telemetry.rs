use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI.
///
/// Logs go to stderr so stdout carries only the JSON result. `RUST_LOG`
/// overrides the default filter.
pub fn init_telemetry(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "captionkit=info,captionkit_pipeline=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
