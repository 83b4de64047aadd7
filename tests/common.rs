//! Common test utilities for wallet manager integration tests
//!
//! This module provides shared test infrastructure including:
//! - An in-process mock mint implementing `MintConnector`
//! - Test environment setup on a temporary file store
#![allow(dead_code)]

use async_trait::async_trait;
use cashu_wallet_manager::dhke::sign_message;
use cashu_wallet_manager::nuts::{
    derive_keyset_id, BlindSignature, KeySetInfo, Keys, MintInfo, MintKeys, MintQuoteResponse,
    MintQuoteState, MintRequest, MintResponse,
};
use cashu_wallet_manager::{
    CashuError, ConnectorFactory, FileStore, KvStore, ManagerConfig, MintConnector, Result,
    WalletManager,
};
use secp256k1::rand::thread_rng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const MINT_A: &str = "http://mint-a.test";
pub const MINT_B: &str = "http://mint-b.test";

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

struct MockKeyset {
    info: KeySetInfo,
    keys: MintKeys,
    secrets: BTreeMap<u64, SecretKey>,
}

impl MockKeyset {
    fn generate(unit: &str) -> Self {
        let secp = Secp256k1::new();
        let mut rng = thread_rng();
        let secrets: BTreeMap<u64, SecretKey> = (0..16)
            .map(|bit| (1u64 << bit, SecretKey::new(&mut rng)))
            .collect();
        let keys: Keys = secrets
            .iter()
            .map(|(amount, k)| {
                let pubkey = PublicKey::from_secret_key(&secp, k);
                (*amount, hex::encode(pubkey.serialize()))
            })
            .collect();
        let id = derive_keyset_id(&keys).expect("valid key hex");

        Self {
            info: KeySetInfo {
                id: id.clone(),
                unit: unit.to_string(),
                active: true,
                input_fee_ppk: Some(0),
            },
            keys: MintKeys {
                id,
                unit: unit.to_string(),
                keys,
            },
            secrets,
        }
    }
}

struct MockQuote {
    response: MintQuoteResponse,
    amount: u64,
}

/// Mint that signs in process; quote states are flipped by the test
pub struct MockMint {
    url: String,
    keysets: Vec<MockKeyset>,
    quotes: Mutex<HashMap<String, MockQuote>>,
    next_quote: AtomicU64,
    pub mint_calls: AtomicU64,
}

impl MockMint {
    pub fn new(url: &str, units: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            url: url.trim_end_matches('/').to_string(),
            keysets: units.iter().map(|u| MockKeyset::generate(u)).collect(),
            quotes: Mutex::new(HashMap::new()),
            next_quote: AtomicU64::new(1),
            mint_calls: AtomicU64::new(0),
        })
    }

    pub fn keyset_id(&self, unit: &str) -> String {
        self.keysets
            .iter()
            .find(|k| k.info.unit == unit)
            .map(|k| k.info.id.clone())
            .expect("unit configured on mock mint")
    }

    /// Private key the mock signs `amount` with in keyset `keyset_id`
    pub fn secret_key(&self, keyset_id: &str, amount: u64) -> SecretKey {
        self.keysets
            .iter()
            .find(|k| k.info.id == keyset_id)
            .and_then(|k| k.secrets.get(&amount))
            .copied()
            .expect("keyset and amount known to mock mint")
    }

    pub fn set_quote_state(&self, quote_id: &str, state: MintQuoteState) {
        let mut quotes = self.quotes.lock().unwrap();
        let quote = quotes.get_mut(quote_id).expect("quote exists");
        quote.response.state = state;
    }

    pub fn pay(&self, quote_id: &str) {
        self.set_quote_state(quote_id, MintQuoteState::Paid);
    }

    pub fn quote_state(&self, quote_id: &str) -> Option<MintQuoteState> {
        self.quotes
            .lock()
            .unwrap()
            .get(quote_id)
            .map(|q| q.response.state)
    }

    fn not_found(detail: String) -> CashuError {
        CashuError::Mint {
            code: Some(20000),
            detail,
        }
    }
}

#[async_trait]
impl MintConnector for MockMint {
    fn mint_url(&self) -> &str {
        &self.url
    }

    async fn get_info(&self) -> Result<MintInfo> {
        Ok(MintInfo {
            name: Some(format!("mock {}", self.url)),
            version: Some("mock/0.1.0".to_string()),
            ..Default::default()
        })
    }

    async fn get_keysets(&self) -> Result<Vec<KeySetInfo>> {
        Ok(self.keysets.iter().map(|k| k.info.clone()).collect())
    }

    async fn get_keys(&self, keyset_id: &str) -> Result<MintKeys> {
        self.keysets
            .iter()
            .find(|k| k.info.id == keyset_id)
            .map(|k| k.keys.clone())
            .ok_or_else(|| Self::not_found(format!("unknown keyset {}", keyset_id)))
    }

    async fn create_mint_quote(
        &self,
        amount: u64,
        unit: &str,
        _description: Option<String>,
    ) -> Result<MintQuoteResponse> {
        if !self.keysets.iter().any(|k| k.info.unit == unit) {
            return Err(Self::not_found(format!("unsupported unit {}", unit)));
        }
        let n = self.next_quote.fetch_add(1, Ordering::SeqCst);
        let response = MintQuoteResponse {
            quote: format!("quote-{}-{}", unit, n),
            request: format!("lnbcrt{}n1mock{}", amount, n),
            state: MintQuoteState::Unpaid,
            expiry: None,
        };
        self.quotes.lock().unwrap().insert(
            response.quote.clone(),
            MockQuote {
                response: response.clone(),
                amount,
            },
        );
        Ok(response)
    }

    async fn check_mint_quote(&self, quote_id: &str) -> Result<MintQuoteResponse> {
        self.quotes
            .lock()
            .unwrap()
            .get(quote_id)
            .map(|q| q.response.clone())
            .ok_or_else(|| Self::not_found(format!("unknown quote {}", quote_id)))
    }

    async fn mint(&self, request: MintRequest) -> Result<MintResponse> {
        self.mint_calls.fetch_add(1, Ordering::SeqCst);
        let mut quotes = self.quotes.lock().unwrap();
        let quote = quotes
            .get_mut(&request.quote)
            .ok_or_else(|| Self::not_found(format!("unknown quote {}", request.quote)))?;
        match quote.response.state {
            MintQuoteState::Paid => {}
            MintQuoteState::Unpaid => {
                return Err(CashuError::Mint {
                    code: Some(20001),
                    detail: "quote not paid".to_string(),
                })
            }
            MintQuoteState::Issued => {
                return Err(CashuError::Mint {
                    code: Some(20002),
                    detail: "quote already issued".to_string(),
                })
            }
        }
        let requested: u64 = request.outputs.iter().map(|o| o.amount).sum();
        if requested != quote.amount {
            return Err(CashuError::Mint {
                code: Some(11000),
                detail: format!("outputs {} do not match quote {}", requested, quote.amount),
            });
        }

        let signatures = request
            .outputs
            .iter()
            .map(|output| {
                let keyset = self
                    .keysets
                    .iter()
                    .find(|k| k.info.id == output.id)
                    .ok_or_else(|| Self::not_found(format!("unknown keyset {}", output.id)))?;
                let k = keyset.secrets.get(&output.amount).ok_or_else(|| {
                    Self::not_found(format!("no key for amount {}", output.amount))
                })?;
                let blinded = PublicKey::from_str(&output.blinded_secret)
                    .map_err(|e| CashuError::Crypto(e.to_string()))?;
                let c = sign_message(k, &blinded)?;
                Ok(BlindSignature {
                    amount: output.amount,
                    id: output.id.clone(),
                    c: hex::encode(c.serialize()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        quote.response.state = MintQuoteState::Issued;
        Ok(MintResponse { signatures })
    }
}

/// Routes URLs to registered mock mints; unknown URLs get a mint without keysets
pub fn mock_factory(mints: &[Arc<MockMint>]) -> ConnectorFactory {
    let registry: HashMap<String, Arc<MockMint>> = mints
        .iter()
        .map(|m| (m.mint_url().to_string(), m.clone()))
        .collect();
    Arc::new(move |url: &str| {
        let url = url.trim_end_matches('/');
        match registry.get(url) {
            Some(mint) => mint.clone() as Arc<dyn MintConnector>,
            None => MockMint::new(url, &[]) as Arc<dyn MintConnector>,
        }
    })
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub store: Arc<FileStore>,
    pub mints: Vec<Arc<MockMint>>,
}

impl TestEnvironment {
    /// Two mints: A serves sat and usd, B serves sat
    pub fn new() -> anyhow::Result<Self> {
        init_logger();
        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());

        let store = Arc::new(FileStore::new_with_base_dir(temp_dir.path().to_path_buf()));
        let mints = vec![
            MockMint::new(MINT_A, &["sat", "usd"]),
            MockMint::new(MINT_B, &["sat"]),
        ];

        Ok(Self {
            temp_dir,
            store,
            mints,
        })
    }

    pub fn mint_a(&self) -> &Arc<MockMint> {
        &self.mints[0]
    }

    pub fn mint_b(&self) -> &Arc<MockMint> {
        &self.mints[1]
    }

    /// A fresh manager over the same store, as after a restart
    pub fn manager(&self) -> WalletManager {
        WalletManager::with_connector_factory(
            self.store.clone() as Arc<dyn KvStore>,
            mock_factory(&self.mints),
            ManagerConfig::default(),
        )
    }

    pub async fn loaded_manager(&self) -> anyhow::Result<WalletManager> {
        let manager = self.manager();
        manager.load().await?;
        Ok(manager)
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        log::info!("🧹 Cleaning up test environment (temp dir will auto-remove)");
    }
}

pub fn units(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}
