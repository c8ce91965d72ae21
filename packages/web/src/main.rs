use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use api::auth::MemoryTokenService;
use api::db::MemoryUserStore;
use api::settings::Settings;
use api::AppState;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,api=debug,tower_http=info")),
        )
        .init();

    let settings = Settings::new().context("Failed to load settings")?;

    let tokens = Arc::new(MemoryTokenService::new());
    let users = Arc::new(MemoryUserStore::new());
    let state = AppState::new(&settings, tokens.clone(), users)
        .with_configured_providers(&settings)
        .context("Failed to configure OAuth providers")?;
    if state.providers.is_empty() {
        tracing::warn!("No OAuth provider configured, only password login is available");
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            tokens.purge_expired().await;
        }
    });

    let router = api::router(state).layer(TraceLayer::new_for_http());

    let addr = settings.app.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        environment = ?settings.app.environment,
        "Server listening on {}",
        addr
    );

    axum::serve(listener, router.into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}
