//! EaseCrypt Service - fiat-to-crypto on-ramp API
//!
//! This is the main entry point for the easecrypt service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easecrypt_service::{
    create_router, AppState, CoinGeckoFeed, PriceFeed, RelayerTransfer, ServiceConfig,
    SimulatedTransfer, StaticFeed, TransferExecutor, TransferWorker,
};
use easecrypt_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,easecrypt=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EaseCrypt Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        environment = ?config.environment,
        payment_provider = %config.payment_provider,
        webhook_secret_configured = config.webhook_secret().is_some(),
        price_feed_configured = config.price_feed_url.is_some(),
        relayer_configured = config.transfer_relayer_url.is_some(),
        manual_confirm_enabled = config.manual_confirm_enabled,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    let feed = build_feed(&config)?;
    let executor = build_executor(&config)?;

    // Build app state and background tasks
    let (state, jobs) = AppState::new(config.clone(), store, feed);
    let worker = TransferWorker::new(jobs, executor, state.ledger.clone()).start();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = state.sweeper().start(shutdown_rx);

    // Create the router; it owns the only handle to the transfer queue.
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, finishing background work");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Sweeper task failed");
    }
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Transfer worker task failed");
    }

    tracing::info!("EaseCrypt Service stopped");
    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(easecrypt_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("RocksDB backend not compiled in - using in-memory store");
    Ok(Arc::new(easecrypt_store::InMemoryStore::new()))
}

fn build_feed(config: &ServiceConfig) -> Result<Arc<dyn PriceFeed>, Box<dyn std::error::Error>> {
    match &config.price_feed_url {
        Some(url) => {
            tracing::info!(price_feed_url = %url, "CoinGecko price feed enabled");
            Ok(Arc::new(CoinGeckoFeed::new(url, config.coingecko_api_key.clone())?))
        }
        None => {
            tracing::warn!("Price feed not configured - serving seed rates");
            Ok(Arc::new(StaticFeed::new(config.seed_rates.iter().copied())))
        }
    }
}

fn build_executor(
    config: &ServiceConfig,
) -> Result<Arc<dyn TransferExecutor>, Box<dyn std::error::Error>> {
    match &config.transfer_relayer_url {
        Some(url) => {
            tracing::info!(relayer_url = %url, "Custody relayer enabled");
            Ok(Arc::new(RelayerTransfer::new(url, config.transfer_relayer_key.clone())?))
        }
        None => {
            tracing::warn!(
                settlement_ms = config.simulated_settlement_ms,
                "Transfer relayer not configured - transfers are simulated"
            );
            Ok(Arc::new(SimulatedTransfer::new(Duration::from_millis(
                config.simulated_settlement_ms,
            ))))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
