use axum::{
    extract::{Path, State},
    Json,
};
use cashu_wallet_manager::{CashuError, CashuWallet, InvoiceHistoryItem, LogLevel, WalletManager};
use std::sync::Arc;

use super::types::{
    AddMintRequest, AddMintResponse, BalanceResponse, CheckQuoteResponse, CreateInvoiceRequest,
    CreateInvoiceResponse, LogLevelRequest, LogLevelResponse, SetActiveRequest, WalletSummary,
};
use crate::error::ApiError;

fn ensure_loaded(manager: &WalletManager) -> Result<(), ApiError> {
    if manager.is_loaded() {
        Ok(())
    } else {
        Err(ApiError::NotReady)
    }
}

fn summarize(manager: &WalletManager, wallet: &CashuWallet) -> Result<WalletSummary, ApiError> {
    let active = manager
        .active_wallet()
        .map(|w| w.id() == wallet.id())
        .unwrap_or(false);
    Ok(WalletSummary::new(wallet, wallet.get_balance()?, active))
}

/// Wallet for an invoice request; missing fields fall back to the active wallet/unit
fn select_wallet(
    manager: &WalletManager,
    mint_url: Option<&str>,
    unit: Option<&str>,
) -> Result<Arc<CashuWallet>, ApiError> {
    let mint_url = match mint_url {
        Some(url) => url.to_string(),
        None => manager
            .active_wallet()
            .ok_or(CashuError::NoActiveWallet)?
            .mint_url()
            .to_string(),
    };
    let unit = unit
        .map(str::to_string)
        .unwrap_or_else(|| manager.active_unit());

    let wallet = manager
        .wallets_by_mint(&mint_url)
        .and_then(|wallets| wallets.get(&unit).cloned())
        .ok_or_else(|| CashuError::wallet_not_found(&mint_url, &unit))?;
    Ok(wallet)
}

pub async fn health_handler() -> &'static str {
    "OK"
}

pub async fn list_wallets_handler(
    State(manager): State<Arc<WalletManager>>,
) -> Result<Json<Vec<WalletSummary>>, ApiError> {
    ensure_loaded(&manager)?;

    let wallets = manager
        .wallets()
        .values()
        .map(|wallet| summarize(&manager, wallet))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(wallets))
}

pub async fn add_mint_handler(
    State(manager): State<Arc<WalletManager>>,
    Json(req): Json<AddMintRequest>,
) -> Result<Json<AddMintResponse>, ApiError> {
    ensure_loaded(&manager)?;
    if req.mint_url.trim().is_empty() {
        return Err(ApiError::InvalidInput("mint_url is required".to_string()));
    }

    let units = if req.units.is_empty() {
        vec![manager.active_unit()]
    } else {
        req.units
    };

    let created = manager.add_wallet(&req.mint_url, &units).await?;
    let wallets = created
        .iter()
        .map(|wallet| summarize(&manager, wallet))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(AddMintResponse {
        mint_url: created
            .first()
            .map(|w| w.mint_url().to_string())
            .unwrap_or(req.mint_url),
        wallets,
    }))
}

pub async fn set_active_handler(
    State(manager): State<Arc<WalletManager>>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<WalletSummary>, ApiError> {
    ensure_loaded(&manager)?;

    let wallet = manager.set_active_wallet(&req.mint_url, req.unit.as_deref())?;
    Ok(Json(summarize(&manager, &wallet)?))
}

pub async fn get_balance_handler(
    State(manager): State<Arc<WalletManager>>,
) -> Result<Json<BalanceResponse>, ApiError> {
    ensure_loaded(&manager)?;

    let view = manager.balances()?;
    Ok(Json(BalanceResponse {
        total: view.total(),
        by_unit: view.by_unit(),
        by_wallet: view.by_wallet().clone(),
    }))
}

pub async fn create_invoice_handler(
    State(manager): State<Arc<WalletManager>>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Json<CreateInvoiceResponse>, ApiError> {
    ensure_loaded(&manager)?;
    if req.amount == 0 {
        return Err(ApiError::InvalidInput(
            "amount must be greater than zero".to_string(),
        ));
    }

    let wallet = select_wallet(&manager, req.mint_url.as_deref(), req.unit.as_deref())?;
    let generated = wallet.generate_invoice(req.amount, req.description).await?;

    Ok(Json(CreateInvoiceResponse {
        invoice: generated.invoice,
        quote: generated.checking_id,
        amount: req.amount,
        unit: wallet.unit().to_string(),
        mint_url: wallet.mint_url().to_string(),
    }))
}

pub async fn pending_quotes_handler(
    State(manager): State<Arc<WalletManager>>,
) -> Result<Json<Vec<InvoiceHistoryItem>>, ApiError> {
    ensure_loaded(&manager)?;
    Ok(Json(manager.pending_mint_quotes()?))
}

pub async fn check_quote_handler(
    State(manager): State<Arc<WalletManager>>,
    Path(quote): Path<String>,
) -> Result<Json<CheckQuoteResponse>, ApiError> {
    ensure_loaded(&manager)?;

    let state = manager.check_mint_quote(&quote).await?;
    Ok(Json(CheckQuoteResponse { quote, state }))
}

pub async fn set_log_level_handler(
    State(manager): State<Arc<WalletManager>>,
    Json(req): Json<LogLevelRequest>,
) -> Result<Json<LogLevelResponse>, ApiError> {
    let level: LogLevel = req.level.parse().map_err(ApiError::InvalidInput)?;
    manager.set_log_level(level);
    Ok(Json(LogLevelResponse { level }))
}
