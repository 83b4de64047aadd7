use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use cashu_wallet_manager::{
    http_connector_factory, FileStore, KvStore, ManagerConfig, WalletManager,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::handlers;
use crate::config::ServiceConfig;

/// Configure CORS from a comma-separated origin list
/// 
/// Set ALLOWED_ORIGINS="https://your-app.example,https://preview.your-app.example" for production.
/// If not set, allows any origin (development mode).
pub fn cors_layer(allowed_origins: Option<&str>) -> anyhow::Result<CorsLayer> {
    match allowed_origins {
        Some(origins) if !origins.is_empty() => {
            log::info!("CORS configured for origins: {}", origins);
            let origin_list = origins
                .split(',')
                .map(|s| s.trim().parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
            Ok(CorsLayer::new()
                .allow_origin(origin_list)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        _ => {
            log::warn!("CORS: Allowing all origins (development mode). Set ALLOWED_ORIGINS env var for production.");
            Ok(CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any))
        }
    }
}

pub fn create_router(manager: Arc<WalletManager>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        // Wallet routes
        .route("/api/wallets", get(handlers::list_wallets_handler))
        .route("/api/mints", post(handlers::add_mint_handler))
        .route("/api/active", put(handlers::set_active_handler))
        .route("/api/balance", get(handlers::get_balance_handler))
        // Invoice routes
        .route("/api/invoice", post(handlers::create_invoice_handler))
        .route("/api/quotes/pending", get(handlers::pending_quotes_handler))
        .route(
            "/api/quotes/:quote/check",
            post(handlers::check_quote_handler),
        )
        // Service control
        .route("/api/log-level", put(handlers::set_log_level_handler))
        .layer(cors)
        .with_state(manager)
}

/// Build and load the wallet manager over the configured data directory
pub async fn create_manager(config: &ServiceConfig) -> anyhow::Result<Arc<WalletManager>> {
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new_with_base_dir(config.data_dir.clone()));
    let manager = Arc::new(WalletManager::with_connector_factory(
        store,
        http_connector_factory(),
        ManagerConfig::default().with_default_unit(config.default_unit.clone()),
    ));

    manager.load().await?;
    log::info!(
        "Wallet manager ready: {} wallets, active unit {}",
        manager.wallets().len(),
        manager.active_unit()
    );
    Ok(manager)
}

pub async fn start_server(config: ServiceConfig) -> anyhow::Result<()> {
    if let Some(level) = config.log_level {
        level.apply();
    }

    let manager = create_manager(&config).await?;
    let poller = config.quote_poll_interval.map(|interval| {
        log::info!("Polling pending quotes every {:?}", interval);
        manager.spawn_quote_poller(interval)
    });

    let app = create_router(manager, cors_layer(config.allowed_origins.as_deref())?);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Server listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            log::info!("Received SIGTERM signal");
        },
    }

    log::info!("Shutdown signal received, exiting gracefully...");
    // Wallet state is written through to the file store on every change
}
