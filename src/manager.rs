/// Wallet Manager - Orchestration Layer
///
/// Keeps one `CashuWallet` per (mint, unit) pair, rebuilds them from the
/// persisted mint list, adds new mints, tracks the active wallet and fans
/// wallet events out to subscribers.
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use crate::client::{http_connector_factory, ConnectorFactory, MintConnector};
use crate::config::ManagerConfig;
use crate::error::{CashuError, Result};
use crate::events::{BalanceUpdate, MintQuoteUpdate, Subscription, WalletMap};
use crate::logging::LogLevel;
use crate::nuts::{KeySetInfo, MintQuoteState};
use crate::proofs::ProofStorage;
use crate::storage::schema::{ActiveMintUrl, ActiveUnit, InvoiceHistory, Mints, Version};
use crate::storage::{init_schema, KvStore, TypedStore};
use crate::types::{normalize_mint_url, wallet_id, InvoiceHistoryItem, Mint};
use crate::views::BalanceView;
use crate::wallet::{CashuWallet, SharedState, WalletOptions};

/// mint URL -> unit -> wallet
type Registry = BTreeMap<String, BTreeMap<String, Arc<CashuWallet>>>;

const CHANNEL_CAPACITY: usize = 16;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct WalletManager {
    config: ManagerConfig,
    shared: SharedState,
    connector_factory: ConnectorFactory,
    wallets: RwLock<Registry>,
    active_wallet: RwLock<Option<Arc<CashuWallet>>>,
    active_unit: RwLock<String>,
    loaded: watch::Sender<bool>,
    load_lock: Mutex<()>,
    wallets_tx: broadcast::Sender<WalletMap>,
}

impl WalletManager {
    // ============================================================================
    // Constructors
    // ============================================================================

    /// Manager talking to mints over HTTP
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_connector_factory(store, http_connector_factory(), ManagerConfig::default())
    }

    /// Manager with a custom mint connector (for testing)
    pub fn with_connector_factory(
        store: Arc<dyn KvStore>,
        connector_factory: ConnectorFactory,
        config: ManagerConfig,
    ) -> Self {
        let (loaded, _) = watch::channel(false);
        let (wallets_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            active_unit: RwLock::new(config.default_unit.clone()),
            config,
            shared: SharedState::new(store),
            connector_factory,
            wallets: RwLock::new(Registry::new()),
            active_wallet: RwLock::new(None),
            loaded,
            load_lock: Mutex::new(()),
            wallets_tx,
        }
    }

    pub fn proof_storage(&self) -> &ProofStorage {
        &self.shared.proofs
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.shared.store
    }

    // ============================================================================
    // Loading
    // ============================================================================

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    /// Resolves once `load` has completed
    pub async fn wait_for_load(&self) {
        let mut rx = self.loaded.subscribe();
        // the sender lives as long as self, so this only ends once loaded
        let _ = rx.wait_for(|loaded| *loaded).await;
    }

    /// Rebuild wallets from storage, initializing the schema on first run.
    /// Calling it again after success is a no-op.
    pub async fn load(&self) -> Result<()> {
        let _guard = self.load_lock.lock().await;
        if self.is_loaded() {
            return Ok(());
        }

        let store = &self.shared.store;
        // an unreadable version fails the load; the store may still hold proofs
        match store.try_get::<Version>()? {
            Some(version) => log::debug!("Wallet store schema version {}", version),
            None => {
                log::info!("Initializing wallet store");
                init_schema(store.as_ref(), &self.config.schema_version, &self.config.default_unit)?;
            }
        }

        let active_unit = store.try_get::<ActiveUnit>()?.flatten();
        let active_mint_url = store.try_get::<ActiveMintUrl>()?.flatten();
        let mints = store.try_get::<Mints>()?.unwrap_or_default();

        for mint in mints {
            let url = normalize_mint_url(&mint.url);
            let connector = (self.connector_factory)(&url);

            // TODO: refetch keysets on load and drop wallets whose keysets were all deactivated
            for (unit, keysets) in group_keysets_by_unit(&mint.keysets) {
                let wallet = Arc::new(CashuWallet::new(
                    self.shared.clone(),
                    connector.clone(),
                    &unit,
                    WalletOptions {
                        keys: mint.keys.clone(),
                        keysets,
                        mint_info: mint.info.clone(),
                    },
                ));
                log::info!("Loaded wallet {:?}", wallet);
                self.write_registry()
                    .entry(url.clone())
                    .or_default()
                    .insert(unit, wallet);
            }
        }

        if let Some(unit) = &active_unit {
            *write_lock(&self.active_unit) = unit.clone();
        }
        if let (Some(mint_url), Some(unit)) = (active_mint_url, active_unit) {
            if !mint_url.is_empty() {
                if let Err(e) = self.set_active_wallet(&mint_url, Some(&unit)) {
                    log::warn!("Stored active wallet unavailable: {}", e);
                }
            }
        }

        self.loaded.send_replace(true);
        self.emit_wallets();
        log::info!("Wallet manager loaded {} wallets", self.wallets().len());
        Ok(())
    }

    // ============================================================================
    // Wallet management
    // ============================================================================

    /// Add a mint, creating one wallet for each requested unit it supports
    pub async fn add_wallet(&self, mint_url: &str, units: &[String]) -> Result<Vec<Arc<CashuWallet>>> {
        let url = normalize_mint_url(mint_url);
        let connector = (self.connector_factory)(&url);

        let unit_keysets: Vec<KeySetInfo> = connector
            .get_keysets()
            .await?
            .into_iter()
            .filter(|k| units.contains(&k.unit))
            .collect();
        if unit_keysets.is_empty() {
            return Err(CashuError::NoKeysetsForUnits {
                mint_url: url,
                units: units.join(", "),
            });
        }

        let keys = try_join_all(unit_keysets.iter().map(|k| connector.get_keys(&k.id))).await?;
        let mint_info = connector.get_info().await?;
        let added_units: Vec<String> = group_keysets_by_unit(&unit_keysets)
            .into_iter()
            .map(|(unit, _)| unit)
            .collect();

        let record = {
            let _guard = self.shared.write_lock.lock().await;
            let mut mints = self.shared.store.try_get::<Mints>()?.unwrap_or_default();
            let record = match mints.iter_mut().find(|m| normalize_mint_url(&m.url) == url) {
                Some(existing) => {
                    existing.merge(mint_info, unit_keysets, keys);
                    existing.clone()
                }
                None => {
                    let record = Mint {
                        url: url.clone(),
                        info: mint_info,
                        keysets: unit_keysets,
                        keys,
                        nickname: None,
                    };
                    mints.push(record.clone());
                    record
                }
            };
            self.shared.store.put::<Mints>(&mints)?;
            record
        };

        let created = self.register_wallets(&url, connector, &added_units, &record);

        if self.active_wallet().is_none() {
            if let Some(first_unit) = added_units.first() {
                self.set_active_wallet(&url, Some(first_unit))?;
            }
        }

        log::info!("Added mint {} with {} wallets", url, created.len());
        self.emit_wallets();
        Ok(created)
    }

    /// Build the wallets of `units` from the stored mint record. A registered
    /// wallet with unchanged keysets is reused so its subscribers and mint lock
    /// stay in place; a replaced one also takes over as the active wallet.
    fn register_wallets(
        &self,
        url: &str,
        connector: Arc<dyn MintConnector>,
        units: &[String],
        record: &Mint,
    ) -> Vec<Arc<CashuWallet>> {
        let mut wallets = Vec::with_capacity(units.len());
        let mut replaced = Vec::new();
        {
            let mut registry = self.write_registry();
            let unit_wallets = registry.entry(url.to_string()).or_default();

            for unit in units {
                let wallet = Arc::new(CashuWallet::new(
                    self.shared.clone(),
                    connector.clone(),
                    unit,
                    WalletOptions {
                        keys: record.keys.clone(),
                        keysets: record.keysets.clone(),
                        mint_info: record.info.clone(),
                    },
                ));

                match unit_wallets.get(unit).cloned() {
                    Some(existing)
                        if existing.keysets() == wallet.keysets()
                            && existing.keys() == wallet.keys() =>
                    {
                        wallets.push(existing);
                    }
                    previous => {
                        if let Some(previous) = previous {
                            replaced.push((previous, wallet.clone()));
                        }
                        unit_wallets.insert(unit.clone(), wallet.clone());
                        wallets.push(wallet);
                    }
                }
            }
        }

        let mut active = write_lock(&self.active_wallet);
        for (previous, replacement) in replaced {
            if active.as_ref().is_some_and(|a| Arc::ptr_eq(a, &previous)) {
                log::debug!("Active wallet {} replaced", replacement.id());
                *active = Some(replacement);
            }
        }
        wallets
    }

    /// Select the wallet used by default; `unit` falls back to the active unit
    pub fn set_active_wallet(&self, mint_url: &str, unit: Option<&str>) -> Result<Arc<CashuWallet>> {
        let url = normalize_mint_url(mint_url);
        let unit = unit
            .map(str::to_string)
            .unwrap_or_else(|| self.active_unit());

        let wallet = self
            .read_registry()
            .get(&url)
            .and_then(|units| units.get(&unit))
            .cloned()
            .ok_or_else(|| CashuError::wallet_not_found(&url, &unit))?;

        self.shared.store.put::<ActiveMintUrl>(&Some(url))?;
        self.shared.store.put::<ActiveUnit>(&Some(unit.clone()))?;
        *write_lock(&self.active_unit) = unit;
        *write_lock(&self.active_wallet) = Some(wallet.clone());

        log::debug!("Active wallet set to {}", wallet.id());
        Ok(wallet)
    }

    pub fn set_log_level(&self, level: LogLevel) {
        level.apply();
        log::info!("Log level set to {}", level);
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub fn active_wallet(&self) -> Option<Arc<CashuWallet>> {
        read_lock(&self.active_wallet).clone()
    }

    pub fn active_unit(&self) -> String {
        read_lock(&self.active_unit).clone()
    }

    /// All wallets keyed by wallet id
    pub fn wallets(&self) -> WalletMap {
        self.read_registry()
            .iter()
            .flat_map(|(url, units)| {
                units
                    .iter()
                    .map(move |(unit, wallet)| (wallet_id(url, unit), wallet.clone()))
            })
            .collect()
    }

    pub fn wallet(&self, id: &str) -> Option<Arc<CashuWallet>> {
        self.wallets().remove(id)
    }

    pub fn wallets_by_mint(&self, mint_url: &str) -> Option<BTreeMap<String, Arc<CashuWallet>>> {
        self.read_registry()
            .get(&normalize_mint_url(mint_url))
            .cloned()
    }

    /// Wallets of one unit keyed by mint URL
    pub fn wallets_by_unit(&self, unit: &str) -> BTreeMap<String, Arc<CashuWallet>> {
        self.read_registry()
            .iter()
            .filter_map(|(url, units)| units.get(unit).map(|w| (url.clone(), w.clone())))
            .collect()
    }

    pub fn available_mints(&self) -> Vec<String> {
        self.read_registry().keys().cloned().collect()
    }

    pub fn available_units(&self) -> Vec<String> {
        let units: BTreeSet<String> = self
            .read_registry()
            .values()
            .flat_map(|units| units.keys().cloned())
            .collect();
        units.into_iter().collect()
    }

    /// Current balances of every wallet
    pub fn balances(&self) -> Result<BalanceView> {
        BalanceView::from_wallets(&self.wallets())
    }

    /// Pending quotes of all known wallets, unique per wallet and quote id
    pub fn pending_mint_quotes(&self) -> Result<Vec<InvoiceHistoryItem>> {
        let wallets = self.wallets();
        let mut seen = BTreeSet::new();
        Ok(self
            .shared
            .store
            .try_get::<InvoiceHistory>()?
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.is_pending() && wallets.contains_key(&item.wallet_id()))
            .filter(|item| seen.insert((item.wallet_id(), item.quote.clone())))
            .collect())
    }

    // ============================================================================
    // Quote settlement
    // ============================================================================

    /// Route a quote to its wallet and try to mint it. Quote ids are only
    /// unique per mint, so a pending entry wins over settled ones.
    pub async fn check_mint_quote(&self, quote_id: &str) -> Result<MintQuoteState> {
        let history = self
            .shared
            .store
            .try_get::<InvoiceHistory>()?
            .unwrap_or_default();
        let item = history
            .iter()
            .find(|item| item.quote == quote_id && item.is_pending())
            .or_else(|| history.iter().find(|item| item.quote == quote_id))
            .ok_or_else(|| CashuError::QuoteNotFound(quote_id.to_string()))?;

        self.settle(item).await
    }

    async fn settle(&self, item: &InvoiceHistoryItem) -> Result<MintQuoteState> {
        let wallet = self
            .wallet(&item.wallet_id())
            .ok_or_else(|| CashuError::wallet_not_found(&item.mint, &item.unit))?;

        let state = wallet.try_to_mint_proofs(&item.quote).await?;
        log::debug!("check_mint_quote {} at {} state {}", item.quote, item.mint, state);
        Ok(state)
    }

    /// One polling pass over every pending quote
    pub async fn check_pending_quotes(&self) -> Result<Vec<(String, Result<MintQuoteState>)>> {
        let mut results = Vec::new();
        for item in self.pending_mint_quotes()? {
            let outcome = self.settle(&item).await;
            if let Err(e) = &outcome {
                log::warn!("Checking quote {} failed: {}", item.quote, e);
            }
            results.push((item.quote, outcome));
        }
        Ok(results)
    }

    /// Poll pending quotes every `interval` (at least `MIN_POLL_INTERVAL`)
    /// until the handle is aborted
    pub fn spawn_quote_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.wait_for_load().await;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match manager.check_pending_quotes().await {
                    Ok(results) => {
                        let minted = results
                            .iter()
                            .filter(|(_, r)| matches!(r, Ok(MintQuoteState::Issued)))
                            .count();
                        if minted > 0 {
                            log::info!("Quote poller minted {} quotes", minted);
                        }
                    }
                    Err(e) => log::error!("Quote poller failed: {}", e),
                }
            }
        })
    }

    // ============================================================================
    // Subscriptions
    // ============================================================================

    /// `(wallet id, balance)` from every current wallet; `None` before load
    pub fn subscribe_to_balance_changes(&self) -> Option<Subscription<BalanceUpdate>> {
        if !self.is_loaded() {
            return None;
        }

        let (tx, mut subscription) = Subscription::new();
        for (id, wallet) in self.wallets() {
            subscription.forward(&tx, wallet.on_balance_change(), move |balance| BalanceUpdate {
                wallet_id: id.clone(),
                balance,
            });
        }
        Some(subscription)
    }

    /// Pending quote lists from every current wallet; `None` before load
    pub fn subscribe_pending_mint_quote(&self) -> Option<Subscription<MintQuoteUpdate>> {
        if !self.is_loaded() {
            return None;
        }

        let (tx, mut subscription) = Subscription::new();
        for (id, wallet) in self.wallets() {
            subscription.forward(&tx, wallet.on_mint_quote_change(), move |pending| {
                MintQuoteUpdate {
                    wallet_id: id.clone(),
                    pending,
                }
            });
        }
        Some(subscription)
    }

    /// Wallet map snapshots after load and after each added mint
    pub fn subscribe_to_wallet_changes(&self) -> broadcast::Receiver<WalletMap> {
        self.wallets_tx.subscribe()
    }

    fn emit_wallets(&self) {
        let _ = self.wallets_tx.send(self.wallets());
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        read_lock(&self.wallets)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        write_lock(&self.wallets)
    }
}

// A panic while holding a registry lock leaves plain data behind; keep using it.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keysets grouped by unit, units in first-seen order
fn group_keysets_by_unit(keysets: &[KeySetInfo]) -> Vec<(String, Vec<KeySetInfo>)> {
    let mut grouped: Vec<(String, Vec<KeySetInfo>)> = Vec::new();
    for keyset in keysets {
        match grouped.iter_mut().find(|(unit, _)| *unit == keyset.unit) {
            Some((_, group)) => group.push(keyset.clone()),
            None => grouped.push((keyset.unit.clone(), vec![keyset.clone()])),
        }
    }
    grouped
}
