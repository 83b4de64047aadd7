/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::mint::MockMint;

pub fn create_router(mint: Arc<MockMint>) -> Router {
    // Configure CORS to allow requests from wallet frontend/tests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        
        // Mint info and keys
        .route("/v1/info", get(get_info))
        .route("/v1/keys", get(get_keys))
        .route("/v1/keys/:keyset_id", get(get_keyset_keys))
        .route("/v1/keysets", get(get_keysets))
        
        // Minting
        .route("/v1/mint/quote/bolt11", post(create_mint_quote))
        .route("/v1/mint/quote/bolt11/:quote_id", get(get_mint_quote))
        .route("/v1/mint/bolt11", post(mint_tokens))
        
        // Regtest helper endpoints
        .route("/regtest/pay/:quote_id", post(pay_quote))
        
        // Shared state
        .with_state(mint)
        
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already bound listener (tests bind port 0)
pub async fn serve(listener: tokio::net::TcpListener, mint: Arc<MockMint>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(mint)).await?;
    Ok(())
}

pub async fn run_server(mint: Arc<MockMint>, host: String, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    
    log::info!("🚀 Mock mint listening on http://{}", addr);
    log::info!("💸 Regtest payment endpoint: POST /regtest/pay/:quote_id");
    
    serve(listener, mint).await
}
