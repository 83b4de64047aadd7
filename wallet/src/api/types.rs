use cashu_wallet_manager::{CashuWallet, LogLevel, MintQuoteState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Serialize)]
pub struct AddMintRequest {
    pub mint_url: String,
    /// Defaults to the active unit when empty
    #[serde(default)]
    pub units: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddMintResponse {
    pub mint_url: String,
    pub wallets: Vec<WalletSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SetActiveRequest {
    pub mint_url: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub id: String,
    pub mint_url: String,
    pub unit: String,
    pub balance: u64,
    pub formatted_balance: String,
    pub active: bool,
    pub keysets: Vec<String>,
}

impl WalletSummary {
    pub fn new(wallet: &CashuWallet, balance: u64, active: bool) -> Self {
        Self {
            id: wallet.id(),
            mint_url: wallet.mint_url().to_string(),
            unit: wallet.unit().to_string(),
            balance,
            formatted_balance: cashu_wallet_manager::format_amount(wallet.unit(), balance),
            active,
            keysets: wallet.keysets().iter().map(|k| k.id.clone()).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub total: u64,
    pub by_unit: BTreeMap<String, u64>,
    pub by_wallet: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateInvoiceRequest {
    pub amount: u64,
    pub description: Option<String>,
    /// Defaults to the active wallet's mint
    pub mint_url: Option<String>,
    /// Defaults to the active unit
    pub unit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateInvoiceResponse {
    pub invoice: String,
    pub quote: String,
    pub amount: u64,
    pub unit: String,
    pub mint_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckQuoteResponse {
    pub quote: String,
    pub state: MintQuoteState,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogLevelRequest {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogLevelResponse {
    pub level: LogLevel,
}
