/// Cashu Wallet HTTP API
/// 
/// Exposes a `WalletManager` over a small JSON API: add mints, pick the
/// active wallet, request lightning invoices and settle them into ecash.

pub mod api;
pub mod config;
pub mod error;

pub use config::ServiceConfig;
pub use error::ApiError;
