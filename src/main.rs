//! PDF Form Server - Entry point
//!
//! HTTP service for extracting and filling PDF form fields.

use pdf_form_server::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_form_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting PDF Form Server");

    run_server(config).await
}
