//! Cashu Wallet Manager: multi-mint, multi-unit Cashu ecash wallets
//!
//! This crate keeps one wallet per (mint, unit) pair on top of a pluggable
//! key-value store, issues lightning invoices through NUT-04 mint quotes and
//! mints ecash proofs once those invoices are paid.
//!
//! # Architecture
//!
//! - **WalletManager**: Loads, adds and selects wallets, polls pending quotes
//! - **CashuWallet**: One unit at one mint; quotes, minting, balance
//! - **Storage**: Typed schema keys over memory or file-system backends
//! - **MintConnector**: Mint v1 REST API, swappable for tests
//!
//! # Example
//!
//! ```ignore
//! use cashu_wallet_manager::{FileStore, WalletManager};
//! use std::sync::Arc;
//!
//! let manager = WalletManager::new(Arc::new(FileStore::new()));
//! manager.load().await?;
//! manager.add_wallet("https://mint.example", &["sat".to_string()]).await?;
//!
//! let wallet = manager.active_wallet().expect("wallet added");
//! let invoice = wallet.generate_invoice(1000, None).await?;
//! println!("Pay {}", invoice.invoice);
//! ```

// Public modules
pub mod client;
pub mod config;
pub mod dhke;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod nuts;
pub mod proofs;
pub mod storage;
pub mod types;
pub mod util;
pub mod views;
pub mod wallet;

// Re-exports for convenience
pub use client::{http_connector_factory, ConnectorFactory, HttpMintClient, MintConnector};
pub use config::ManagerConfig;
pub use error::{CashuError, Result, StorageError};
pub use events::{BalanceUpdate, MintQuoteUpdate, Subscription, WalletMap};
pub use logging::LogLevel;
pub use manager::WalletManager;
pub use nuts::{MintQuoteState, Proof};
pub use proofs::ProofStorage;
pub use storage::{FileStore, KvStore, MemoryStore, TypedStore};
pub use types::{InvoiceHistoryItem, InvoiceStatus, Mint};
pub use util::{decode_bolt11, format_amount, is_mint_quote_expired};
pub use views::{BalanceView, PendingQuotesView};
pub use wallet::{CashuWallet, GeneratedInvoice, SharedState, WalletOptions};
