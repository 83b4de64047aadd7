use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cashu_wallet_manager::CashuError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Cashu(#[from] CashuError),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Wallet manager is still loading")]
    NotReady,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cashu(e) if e.is_mint_unreachable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Cashu(e) => match e {
                CashuError::WalletNotFound { .. } | CashuError::QuoteNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CashuError::NoActiveWallet
                | CashuError::QuoteNotPending(_)
                | CashuError::NoKeysetsForUnits { .. }
                | CashuError::InvalidInvoice(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
