/// Axum HTTP handlers for the Cashu mint API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cashu_wallet_manager::nuts::{
    ErrorResponse, KeysResponse, KeysetResponse, MintInfo, MintQuoteRequest, MintQuoteResponse,
    MintRequest, MintResponse,
};
use std::sync::Arc;

use crate::mint::{MintError, MockMint};

/// Shared application state
pub type AppState = Arc<MockMint>;

/// Mint errors are returned as 400 with a Cashu error body
pub struct ApiError(MintError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            MintError::UnknownQuote(_) | MintError::UnknownKeyset(_) => StatusCode::NOT_FOUND,
            MintError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = ErrorResponse {
            code: Some(self.0.code()),
            detail: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        log::warn!("Request failed: {}", err);
        ApiError(err)
    }
}

/// GET /v1/info
pub async fn get_info(State(mint): State<AppState>) -> Json<MintInfo> {
    Json(mint.info())
}

/// GET /v1/keysets
pub async fn get_keysets(State(mint): State<AppState>) -> Json<KeysetResponse> {
    Json(KeysetResponse {
        keysets: mint.keysets(),
    })
}

/// GET /v1/keys
/// Keys of all active keysets
pub async fn get_keys(State(mint): State<AppState>) -> Json<KeysResponse> {
    Json(KeysResponse {
        keysets: mint.all_keys(),
    })
}

/// GET /v1/keys/{keyset_id}
pub async fn get_keyset_keys(
    State(mint): State<AppState>,
    Path(keyset_id): Path<String>,
) -> Result<Json<KeysResponse>, ApiError> {
    let keys = mint.keys(&keyset_id)?;
    Ok(Json(KeysResponse {
        keysets: vec![keys],
    }))
}

/// POST /v1/mint/quote/bolt11
pub async fn create_mint_quote(
    State(mint): State<AppState>,
    Json(req): Json<MintQuoteRequest>,
) -> Result<Json<MintQuoteResponse>, ApiError> {
    Ok(Json(mint.create_quote(req)?))
}

/// GET /v1/mint/quote/bolt11/{quote_id}
pub async fn get_mint_quote(
    State(mint): State<AppState>,
    Path(quote_id): Path<String>,
) -> Result<Json<MintQuoteResponse>, ApiError> {
    Ok(Json(mint.quote(&quote_id)?))
}

/// POST /v1/mint/bolt11
/// Signs the blinded outputs of a paid quote
pub async fn mint_tokens(
    State(mint): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<MintResponse>, ApiError> {
    let signatures = mint.mint(&req.quote, &req.outputs)?;
    Ok(Json(MintResponse { signatures }))
}

// ============================================================================
// REGTEST HELPER ENDPOINTS (not part of the Cashu API)
// ============================================================================

/// POST /regtest/pay/{quote_id}
/// Simulate payment of the quote's lightning invoice
pub async fn pay_quote(
    State(mint): State<AppState>,
    Path(quote_id): Path<String>,
) -> Result<Json<MintQuoteResponse>, ApiError> {
    Ok(Json(mint.pay(&quote_id)?))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
