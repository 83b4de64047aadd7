//! Single mint/unit wallet
//!
//! A `CashuWallet` holds the keysets of one unit at one mint. It issues
//! lightning invoices through mint quotes, records them in the invoice
//! history, and mints proofs once the mint reports a quote as paid.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::client::MintConnector;
use crate::dhke::PreMintSecrets;
use crate::error::{CashuError, Result};
use crate::nuts::{
    KeySetInfo, MintInfo, MintKeys, MintQuoteResponse, MintQuoteState, MintRequest, Proof,
};
use crate::proofs::ProofStorage;
use crate::storage::schema::{InvoiceHistory, KeysetCounters};
use crate::storage::{KvStore, TypedStore};
use crate::types::{self, InvoiceHistoryItem, InvoiceStatus, KeysetCounter};
use crate::util::is_mint_quote_expired;

const CHANNEL_CAPACITY: usize = 64;

/// State shared by every wallet of one manager
#[derive(Clone)]
pub struct SharedState {
    pub store: Arc<dyn KvStore>,
    pub proofs: ProofStorage,
    /// Serializes read-modify-write of invoice history and keyset counters
    pub(crate) write_lock: Arc<Mutex<()>>,
}

impl SharedState {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            proofs: ProofStorage::new(store.clone()),
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WalletOptions {
    pub keys: Vec<MintKeys>,
    pub keysets: Vec<KeySetInfo>,
    pub mint_info: MintInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedInvoice {
    pub invoice: String,
    pub checking_id: String,
}

pub struct CashuWallet {
    unit: String,
    keysets: Vec<KeySetInfo>,
    keys: Vec<MintKeys>,
    mint_info: MintInfo,
    connector: Arc<dyn MintConnector>,
    shared: SharedState,
    mint_lock: Mutex<()>,
    balance_tx: broadcast::Sender<u64>,
    quote_tx: broadcast::Sender<Vec<InvoiceHistoryItem>>,
}

impl CashuWallet {
    /// Keysets and keys of other units are ignored
    pub fn new(
        shared: SharedState,
        connector: Arc<dyn MintConnector>,
        unit: &str,
        options: WalletOptions,
    ) -> Self {
        let keysets: Vec<KeySetInfo> = options
            .keysets
            .into_iter()
            .filter(|k| k.unit == unit)
            .collect();
        let ids: HashSet<&str> = keysets.iter().map(|k| k.id.as_str()).collect();
        let keys: Vec<MintKeys> = options
            .keys
            .into_iter()
            .filter(|k| ids.contains(k.id.as_str()))
            .collect();

        let (balance_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (quote_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            unit: unit.to_string(),
            keysets,
            keys,
            mint_info: options.mint_info,
            connector,
            shared,
            mint_lock: Mutex::new(()),
            balance_tx,
            quote_tx,
        }
    }

    pub fn id(&self) -> String {
        types::wallet_id(self.mint_url(), &self.unit)
    }

    pub fn mint_url(&self) -> &str {
        self.connector.mint_url()
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn keysets(&self) -> &[KeySetInfo] {
        &self.keysets
    }

    pub fn keys(&self) -> &[MintKeys] {
        &self.keys
    }

    pub fn mint_info(&self) -> &MintInfo {
        &self.mint_info
    }

    pub fn keyset_ids(&self) -> HashSet<String> {
        self.keysets.iter().map(|k| k.id.clone()).collect()
    }

    pub fn get_balance(&self) -> Result<u64> {
        self.shared.proofs.balance_for_keysets(&self.keyset_ids())
    }

    pub fn get_proofs(&self) -> Result<Vec<Proof>> {
        let ids = self.keyset_ids();
        Ok(self
            .shared
            .proofs
            .get_proofs()?
            .into_iter()
            .filter(|p| ids.contains(&p.id))
            .collect())
    }

    /// New balance after proofs are received. Drop the receiver to unsubscribe.
    pub fn on_balance_change(&self) -> broadcast::Receiver<u64> {
        self.balance_tx.subscribe()
    }

    /// Pending quotes of this wallet after each invoice change
    pub fn on_mint_quote_change(&self) -> broadcast::Receiver<Vec<InvoiceHistoryItem>> {
        self.quote_tx.subscribe()
    }

    pub fn get_pending_mint_quotes(&self) -> Result<Vec<InvoiceHistoryItem>> {
        let history = self.shared.store.try_get::<InvoiceHistory>()?.unwrap_or_default();
        Ok(history
            .into_iter()
            .filter(|item| item.is_pending() && self.owns(item))
            .collect())
    }

    fn owns(&self, item: &InvoiceHistoryItem) -> bool {
        item.mint == self.mint_url() && item.unit == self.unit
    }

    pub async fn create_mint_quote(
        &self,
        amount: u64,
        description: Option<String>,
    ) -> Result<MintQuoteResponse> {
        self.connector
            .create_mint_quote(amount, &self.unit, description)
            .await
    }

    pub async fn check_mint_quote(&self, quote_id: &str) -> Result<MintQuoteResponse> {
        self.connector.check_mint_quote(quote_id).await
    }

    /// Request a mint quote and record it as a pending invoice
    pub async fn generate_invoice(
        &self,
        amount: u64,
        description: Option<String>,
    ) -> Result<GeneratedInvoice> {
        let mint_quote = self.create_mint_quote(amount, description.clone()).await?;
        log::info!(
            "Created mint quote {} for {} {} at {}",
            mint_quote.quote,
            amount,
            self.unit,
            self.mint_url()
        );

        {
            let _guard = self.shared.write_lock.lock().await;
            let mut history = self.shared.store.try_get::<InvoiceHistory>()?.unwrap_or_default();
            history.push(InvoiceHistoryItem {
                amount,
                bolt11: mint_quote.request.clone(),
                hash: None,
                memo: description,
                mint: self.mint_url().to_string(),
                quote: mint_quote.quote.clone(),
                status: InvoiceStatus::Pending,
                unit: self.unit.clone(),
            });
            self.shared.store.put::<InvoiceHistory>(&history)?;
        }

        self.emit_pending_quotes()?;

        Ok(GeneratedInvoice {
            invoice: mint_quote.request,
            checking_id: mint_quote.quote,
        })
    }

    /// Poll the mint for a pending quote and mint its proofs once paid.
    /// Returns `Issued` when proofs were minted by this call.
    pub async fn try_to_mint_proofs(&self, quote_id: &str) -> Result<MintQuoteState> {
        let _mint_guard = self.mint_lock.lock().await;

        let pending = self
            .shared
            .store
            .try_get::<InvoiceHistory>()?
            .unwrap_or_default()
            .into_iter()
            .find(|item| item.quote == quote_id && self.owns(item))
            .ok_or_else(|| CashuError::QuoteNotFound(quote_id.to_string()))?;
        if !pending.is_pending() {
            return Err(CashuError::QuoteNotPending(quote_id.to_string()));
        }

        let quote = self.check_mint_quote(quote_id).await?;
        log::debug!("Mint quote {} state {}", quote_id, quote.state);

        match quote.state {
            MintQuoteState::Unpaid => {
                let now = Utc::now().timestamp().max(0) as u64;
                if is_mint_quote_expired(&quote, now) {
                    log::info!("Mint quote {} expired unpaid", quote_id);
                }
                Ok(MintQuoteState::Unpaid)
            }
            MintQuoteState::Issued => {
                log::warn!("Mint quote {} already issued", quote_id);
                Ok(MintQuoteState::Issued)
            }
            MintQuoteState::Paid => {
                let proofs = self.mint_proofs(pending.amount, quote_id).await?;
                self.shared.proofs.add_proofs(&proofs).await?;

                let balance = self.get_balance()?;
                let _ = self.balance_tx.send(balance);

                self.mark_paid(quote_id).await?;
                self.emit_pending_quotes()?;

                log::info!(
                    "Minted {} {} for quote {} (balance {})",
                    pending.amount,
                    self.unit,
                    quote_id,
                    balance
                );
                Ok(MintQuoteState::Issued)
            }
        }
    }

    /// Blind outputs for `amount`, have the mint sign them and unblind into proofs
    pub async fn mint_proofs(&self, amount: u64, quote_id: &str) -> Result<Vec<Proof>> {
        let keyset = self.active_keyset()?;
        let premint = PreMintSecrets::random(&keyset.id, amount)?;

        let response = self
            .connector
            .mint(MintRequest {
                quote: quote_id.to_string(),
                outputs: premint.blinded_messages(),
            })
            .await?;

        let proofs = premint.construct_proofs(&response.signatures, &keyset.keys)?;
        let outputs = u32::try_from(premint.len()).unwrap_or(u32::MAX);
        self.bump_keyset_counter(&keyset.id, outputs).await?;
        Ok(proofs)
    }

    /// Active keyset with keys loaded, preferring the first active one
    fn active_keyset(&self) -> Result<&MintKeys> {
        self.keysets
            .iter()
            .filter(|info| info.active)
            .find_map(|info| self.keys.iter().find(|k| k.id == info.id))
            .ok_or_else(|| CashuError::NoActiveKeyset(self.id()))
    }

    async fn mark_paid(&self, quote_id: &str) -> Result<()> {
        let _guard = self.shared.write_lock.lock().await;
        let history: Vec<InvoiceHistoryItem> = self
            .shared
            .store
            .try_get::<InvoiceHistory>()?
            .unwrap_or_default()
            .into_iter()
            .map(|mut item| {
                if item.quote == quote_id && self.owns(&item) {
                    item.status = InvoiceStatus::Paid;
                }
                item
            })
            .collect();
        self.shared.store.put::<InvoiceHistory>(&history)?;
        Ok(())
    }

    async fn bump_keyset_counter(&self, keyset_id: &str, by: u32) -> Result<()> {
        let _guard = self.shared.write_lock.lock().await;
        let mut counters = self.shared.store.try_get::<KeysetCounters>()?.unwrap_or_default();
        bump_counter(&mut counters, keyset_id, by);
        self.shared.store.put::<KeysetCounters>(&counters)?;
        Ok(())
    }

    fn emit_pending_quotes(&self) -> Result<()> {
        let pending = self.get_pending_mint_quotes()?;
        let _ = self.quote_tx.send(pending);
        Ok(())
    }
}

impl fmt::Debug for CashuWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CashuWallet")
            .field("mint_url", &self.mint_url())
            .field("unit", &self.unit)
            .field(
                "keysets",
                &self.keysets.iter().map(|k| k.id.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Counters saturate instead of wrapping
fn bump_counter(counters: &mut Vec<KeysetCounter>, keyset_id: &str, by: u32) {
    match counters.iter_mut().find(|c| c.id == keyset_id) {
        Some(counter) => counter.counter = counter.counter.saturating_add(by),
        None => counters.push(KeysetCounter {
            id: keyset_id.to_string(),
            counter: by,
        }),
    }
}
