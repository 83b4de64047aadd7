//! Derived state for consumers of manager events
//!
//! `BalanceView` and `PendingQuotesView` fold the manager's change events into
//! the aggregates a UI or API shows: total and per-unit balances, and the
//! current list of pending mint quotes.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::events::{BalanceUpdate, MintQuoteUpdate, WalletMap};
use crate::types::InvoiceHistoryItem;

#[derive(Debug, Clone, Default)]
pub struct BalanceView {
    by_wallet: BTreeMap<String, u64>,
    units: BTreeMap<String, String>,
}

impl BalanceView {
    /// Seed balances from the current wallets
    pub fn from_wallets(wallets: &WalletMap) -> Result<Self> {
        let mut view = Self::default();
        view.set_wallets(wallets);
        for (id, wallet) in wallets {
            view.by_wallet.insert(id.clone(), wallet.get_balance()?);
        }
        Ok(view)
    }

    /// Refresh the wallet -> unit mapping after the wallet list changed
    pub fn set_wallets(&mut self, wallets: &WalletMap) {
        self.units = wallets
            .iter()
            .map(|(id, w)| (id.clone(), w.unit().to_string()))
            .collect();
    }

    pub fn apply(&mut self, update: &BalanceUpdate) {
        self.by_wallet.insert(update.wallet_id.clone(), update.balance);
    }

    pub fn total(&self) -> u64 {
        self.by_wallet.values().sum()
    }

    pub fn by_wallet(&self) -> &BTreeMap<String, u64> {
        &self.by_wallet
    }

    /// Balances summed per unit; wallets with no known unit are skipped
    pub fn by_unit(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for (id, balance) in &self.by_wallet {
            match self.units.get(id) {
                Some(unit) => *totals.entry(unit.clone()).or_insert(0) += balance,
                None => log::warn!("Wallet not found for id {}", id),
            }
        }
        totals
    }
}

/// Pending mint quotes across wallets, unique by quote id
#[derive(Debug, Clone, Default)]
pub struct PendingQuotesView {
    quotes: BTreeMap<String, InvoiceHistoryItem>,
}

impl PendingQuotesView {
    pub fn new(initial: Vec<InvoiceHistoryItem>) -> Self {
        let mut view = Self::default();
        for item in initial {
            view.quotes.insert(item.quote.clone(), item);
        }
        view
    }

    /// Replace the entries of the updated wallet with its new pending list
    pub fn apply(&mut self, update: &MintQuoteUpdate) {
        self.quotes
            .retain(|_, item| item.wallet_id() != update.wallet_id);
        for item in &update.pending {
            self.quotes.insert(item.quote.clone(), item.clone());
        }
    }

    pub fn quotes(&self) -> Vec<InvoiceHistoryItem> {
        self.quotes.values().cloned().collect()
    }

    pub fn find(&self, quote_id: &str) -> Option<&InvoiceHistoryItem> {
        self.quotes.get(quote_id)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}
