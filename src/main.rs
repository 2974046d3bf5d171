// Prop assistant entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config
// 3. Load matchup rank table
// 4. Build Sportradar provider and stats cache
// 5. Build the rating engine
// 6. Serve WebSocket requests until Ctrl+C

use prop_assistant::config;
use prop_assistant::rating;
use prop_assistant::stats;
use prop_assistant::ws_server;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Prop assistant starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: {} teams mapped, freshness {}s, ws port {}",
        config.upstream.teams.len(),
        config.cache.freshness_secs,
        config.ws_port
    );

    // 3. Load matchup rank table
    let matchups = rating::matchups::load_matchups(Path::new(&config.data_paths.matchups))
        .context("failed to load matchup ranks")?;
    info!("Loaded matchup ranks for {} teams", matchups.len());

    // 4. Build Sportradar provider and stats cache
    let provider = stats::provider::SportradarProvider::from_config(&config)
        .context("failed to build stats provider")?;
    if !provider.has_api_key() {
        warn!("No Sportradar API key configured; roster refreshes will fail until one is set");
    }
    let cache = Arc::new(stats::cache::PlayerStatsCache::from_config(
        Arc::new(provider),
        &config,
    ));

    // 5. Build the rating engine
    let engine = Arc::new(rating::engine::RatingEngine::new(
        cache,
        matchups,
        config.rating.clone(),
    ));

    // 6. Serve WebSocket requests until Ctrl+C
    let ws_port = config.ws_port;
    info!("Application ready. WebSocket server listening on 127.0.0.1:{ws_port}");
    tokio::select! {
        result = ws_server::run(ws_port, engine) => {
            result.context("WebSocket server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    info!("Prop assistant shut down cleanly");
    Ok(())
}

/// Initialize tracing with an env-filter, defaulting to info for this crate.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prop_assistant=info,warn")),
        )
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
