use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil::config::Config;
use vigil::engine::{Aggregator, LifecycleManager, Scheduler, Tracker};
use vigil::source::{BinanceFuturesClient, PriceSource};
use vigil::store::{SignalRepository, SqliteStore};
use vigil::types::StatPeriod;
use vigil::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Vigil server on {}:{}", config.host, config.port);

    // Storage and price source
    let store: Arc<dyn SignalRepository> =
        Arc::new(SqliteStore::new(&config.database_path).map_err(|e| anyhow::anyhow!("{e}"))?);
    let source: Arc<dyn PriceSource> = Arc::new(BinanceFuturesClient::new(
        config.binance_futures_url.clone(),
        Duration::from_secs(config.source_timeout_secs),
    ));

    // Engine components
    let lifecycle = LifecycleManager::new(store.clone(), config.lifecycle.clone());
    let tracker = Tracker::new(
        store.clone(),
        source.clone(),
        lifecycle.clone(),
        config.kline_interval,
        Duration::from_secs(config.tick_interval_secs),
        config.tick_concurrency,
    );
    let aggregator = Aggregator::new(store.clone());

    // Repair pass: a crash between closure and resolution must not leave
    // CLOSED signals without an outcome.
    match lifecycle.repair_missing_outcomes() {
        Ok(0) => {}
        Ok(n) => info!("repaired {} closed signals missing outcomes", n),
        Err(e) => tracing::warn!("outcome repair sweep failed: {}", e),
    }

    // Background loops
    let mut scheduler = Scheduler::new();
    scheduler.spawn_tracking(
        tracker.clone(),
        Duration::from_secs(config.tick_interval_secs),
    );
    scheduler.spawn_aggregation(
        aggregator.clone(),
        vec![
            StatPeriod::Day,
            StatPeriod::Week,
            StatPeriod::Month,
            StatPeriod::Quarter,
            StatPeriod::All,
        ],
        Duration::from_secs(config.aggregation_interval_secs),
    );

    // Create application state
    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        aggregator: aggregator.clone(),
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = vigil::api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Vigil server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Let in-flight ticks finish or abort within the grace period.
    scheduler
        .shutdown(Duration::from_secs(config.shutdown_grace_secs))
        .await;

    Ok(())
}
