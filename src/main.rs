use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use stack_core::CoreConfig;

/// Main entry point for the stack service
///
/// Loads `.env`, resolves the core configuration once and runs the REST server.
///
/// # Environment Variables
/// - `STACK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `STACK_DATABASE_PATH`: SQLite database file (default: "stack_data/stacks.db")
/// - `GENERATION_API_KEY`: generative backend credential (required to generate)
/// - `GENERATION_BASE_URL`, `GENERATION_MODELS`, `GENERATION_TIMEOUT_SECS`: backend settings
/// - `STACK_EVIDENCE_INDEX`, `STACK_LINK_CATALOG`: reference data overrides
/// - `STACK_MIN_WORDS`, `STACK_MIN_TABLE_ROWS`, `STACK_MIN_CITATIONS`: validator policy
/// - `API_KEY`: when set, generation requests must carry it in `x-api-key`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stack_run=info".parse()?)
                .add_directive("stack_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("STACK_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CoreConfig::from_env()?;
    tracing::info!(
        "++ Using database {} with models {}",
        cfg.database_path().display(),
        cfg.generation()
            .models()
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if cfg.generation().api_key().is_none() {
        tracing::warn!("GENERATION_API_KEY is not set; generation requests will fail");
    }

    let state = AppState::from_config(&cfg, std::env::var("API_KEY").ok())?;

    tracing::info!("++ Starting stack REST on {}", rest_addr);
    api_rest::serve(&rest_addr, state).await
}
