//! Error types for wallet manager operations
//!
//! Covers storage failures, unknown wallets and quotes, mint-side errors
//! and blind-signature failures when talking to a Cashu mint.

use thiserror::Error;

/// Core error type for wallet and manager operations
#[derive(Error, Debug)]
pub enum CashuError {
    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No wallet registered for the mint/unit pair
    #[error("No wallet found for {mint_url} and {unit}")]
    WalletNotFound { mint_url: String, unit: String },

    /// No active wallet has been selected yet
    #[error("No active wallet set")]
    NoActiveWallet,

    /// Quote id not present in the invoice history
    #[error("No pending transaction for quote {0}")]
    QuoteNotFound(String),

    /// Quote exists in history but was already settled
    #[error("Transaction for quote {0} is not pending")]
    QuoteNotPending(String),

    /// Mint offers none of the requested units
    #[error("Mint {mint_url} has no keysets for units [{units}]")]
    NoKeysetsForUnits { mint_url: String, units: String },

    /// Wallet holds no active keyset with loaded keys
    #[error("No active keyset for {0}")]
    NoActiveKeyset(String),

    /// Keyset lacks a public key for the requested denomination
    #[error("Keyset {keyset_id} has no key for amount {amount}")]
    MissingKey { keyset_id: String, amount: u64 },

    /// Mint answered with an error body
    #[error("Mint error{}: {detail}", .code.map(|c| format!(" {}", c)).unwrap_or_default())]
    Mint { code: Option<u64>, detail: String },

    /// Transport failure talking to the mint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Blind signature arithmetic failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Bolt11 invoice could not be decoded
    #[error("Invalid invoice: {0}")]
    InvalidInvoice(String),

    /// Mint response did not match what was requested
    #[error("Invalid mint response: {0}")]
    InvalidMintResponse(String),
}

impl From<secp256k1::Error> for CashuError {
    fn from(err: secp256k1::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl CashuError {
    /// Create a wallet-not-found error
    pub fn wallet_not_found(mint_url: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::WalletNotFound {
            mint_url: mint_url.into(),
            unit: unit.into(),
        }
    }

    /// True when the failure came from reaching the mint rather than from local state
    pub fn is_mint_unreachable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Key {0} not found in storage")]
    KeyNotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, CashuError>;
