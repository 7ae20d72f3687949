//! PDF Eye-Saver - Entry point
//!
//! An MCP server that recolors PDF backgrounds.

use pdf_eye_saver::{run_server_with_config, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_eye_saver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        resource_dirs = ?config.resource_dirs,
        max_input_bytes = config.max_input_bytes,
        timeout_secs = config.transform_timeout.as_secs(),
        "Starting PDF Eye-Saver"
    );

    run_server_with_config(config).await
}
