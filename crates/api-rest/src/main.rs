//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development when `.env` loading is handled elsewhere. The workspace's main
//! `stack-run` binary runs the same server after loading `.env`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use stack_core::CoreConfig;

/// Main entry point for the stack REST API server
///
/// # Environment Variables
/// - `STACK_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `API_KEY`: when set, generation requests must carry it in `x-api-key`
/// - everything read by [`CoreConfig::from_env`]
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the core configuration or reference data is invalid,
/// - the database cannot be opened, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("stack_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("STACK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = CoreConfig::from_env()?;
    let state = AppState::from_config(&cfg, std::env::var("API_KEY").ok())?;

    tracing::info!("-- Starting stack REST API on {}", addr);
    api_rest::serve(&addr, state).await
}
