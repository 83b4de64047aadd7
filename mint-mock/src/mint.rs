/// In-memory mint state
///
/// Holds one keyset per configured unit with a private key for every
/// power-of-two amount, and the mint quotes created so far. Quotes are paid
/// either on creation (auto-pay) or through the regtest pay endpoint.

use cashu_wallet_manager::dhke::sign_message;
use cashu_wallet_manager::nuts::{
    derive_keyset_id, BlindSignature, BlindedMessage, KeySetInfo, Keys, MintInfo, MintKeys,
    MintQuoteRequest, MintQuoteResponse, MintQuoteState,
};
use secp256k1::rand::thread_rng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Denominations 1 .. 2^31
const MAX_ORDER: u32 = 32;

/// Seconds until a quote expires
const QUOTE_TTL_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum MintError {
    #[error("Unknown quote: {0}")]
    UnknownQuote(String),

    #[error("Unknown keyset: {0}")]
    UnknownKeyset(String),

    #[error("Unit not supported: {0}")]
    UnsupportedUnit(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Quote not paid: {0}")]
    QuoteNotPaid(String),

    #[error("Quote already issued: {0}")]
    QuoteIssued(String),

    #[error("Outputs total {outputs}, quote is for {quote}")]
    AmountMismatch { outputs: u64, quote: u64 },

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Mint state lock poisoned")]
    Poisoned,
}

impl MintError {
    /// Cashu error code reported to wallets
    pub fn code(&self) -> u64 {
        match self {
            MintError::UnknownQuote(_) => 20000,
            MintError::QuoteNotPaid(_) => 20001,
            MintError::QuoteIssued(_) => 20002,
            MintError::UnknownKeyset(_) => 12001,
            MintError::UnsupportedUnit(_) => 11005,
            MintError::AmountMismatch { .. } | MintError::ZeroAmount => 11000,
            MintError::InvalidOutput(_) => 10000,
            MintError::Poisoned => 50000,
        }
    }
}

pub type Result<T> = std::result::Result<T, MintError>;

struct Keyset {
    info: KeySetInfo,
    keys: MintKeys,
    secrets: BTreeMap<u64, SecretKey>,
}

impl Keyset {
    fn generate(unit: &str) -> anyhow::Result<Self> {
        let secp = Secp256k1::new();
        let mut rng = thread_rng();

        let secrets: BTreeMap<u64, SecretKey> = (0..MAX_ORDER)
            .map(|order| (1u64 << order, SecretKey::new(&mut rng)))
            .collect();
        let keys: Keys = secrets
            .iter()
            .map(|(amount, secret)| {
                let pubkey = PublicKey::from_secret_key(&secp, secret);
                (*amount, hex::encode(pubkey.serialize()))
            })
            .collect();
        let id = derive_keyset_id(&keys)?;

        Ok(Self {
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
        })
    }

    fn sign(&self, output: &BlindedMessage) -> Result<BlindSignature> {
        let secret = self.secrets.get(&output.amount).ok_or_else(|| {
            MintError::InvalidOutput(format!("no key for amount {}", output.amount))
        })?;
        let blinded = PublicKey::from_str(&output.blinded_secret)
            .map_err(|e| MintError::InvalidOutput(e.to_string()))?;
        let c = sign_message(secret, &blinded)
            .map_err(|e| MintError::InvalidOutput(e.to_string()))?;

        Ok(BlindSignature {
            amount: output.amount,
            id: output.id.clone(),
            c: hex::encode(c.serialize()),
        })
    }
}

struct Quote {
    response: MintQuoteResponse,
    amount: u64,
    unit: String,
}

pub struct MockMint {
    info: MintInfo,
    keysets: Vec<Keyset>,
    quotes: RwLock<HashMap<String, Quote>>,
    auto_pay: bool,
}

impl MockMint {
    /// Create a mint with a fresh keyset for each unit
    pub fn new(units: &[String], auto_pay: bool) -> anyhow::Result<Self> {
        let keysets = units
            .iter()
            .map(|unit| Keyset::generate(unit))
            .collect::<anyhow::Result<Vec<_>>>()?;

        for keyset in &keysets {
            log::info!("Keyset {} for unit {}", keyset.info.id, keyset.info.unit);
        }

        Ok(Self {
            info: MintInfo {
                name: Some("Mock Mint".to_string()),
                version: Some(format!("mint-mock/{}", env!("CARGO_PKG_VERSION"))),
                description: Some("Local mock mint for development and tests".to_string()),
                nuts: Some(serde_json::json!({
                    "4": { "methods": [{ "method": "bolt11", "unit": "sat" }], "disabled": false }
                })),
                ..Default::default()
            },
            keysets,
            quotes: RwLock::new(HashMap::new()),
            auto_pay,
        })
    }

    pub fn info(&self) -> MintInfo {
        self.info.clone()
    }

    pub fn keysets(&self) -> Vec<KeySetInfo> {
        self.keysets.iter().map(|k| k.info.clone()).collect()
    }

    pub fn all_keys(&self) -> Vec<MintKeys> {
        self.keysets.iter().map(|k| k.keys.clone()).collect()
    }

    pub fn keys(&self, keyset_id: &str) -> Result<MintKeys> {
        self.keyset(keyset_id).map(|k| k.keys.clone())
    }

    fn keyset(&self, keyset_id: &str) -> Result<&Keyset> {
        self.keysets
            .iter()
            .find(|k| k.info.id == keyset_id)
            .ok_or_else(|| MintError::UnknownKeyset(keyset_id.to_string()))
    }

    /// NUT-04 quote; the request is a placeholder invoice string
    pub fn create_quote(&self, request: MintQuoteRequest) -> Result<MintQuoteResponse> {
        if request.amount == 0 {
            return Err(MintError::ZeroAmount);
        }
        if !self.keysets.iter().any(|k| k.info.unit == request.unit) {
            return Err(MintError::UnsupportedUnit(request.unit));
        }

        let quote_id = uuid::Uuid::new_v4().to_string();
        let state = if self.auto_pay {
            MintQuoteState::Paid
        } else {
            MintQuoteState::Unpaid
        };
        let response = MintQuoteResponse {
            quote: quote_id.clone(),
            request: format!("lnbcrt{}n1mock{}", request.amount, quote_id.replace('-', "")),
            state,
            expiry: Some(unix_now() + QUOTE_TTL_SECS),
        };

        log::info!(
            "Quote {} for {} {} ({})",
            quote_id,
            request.amount,
            request.unit,
            state
        );
        self.quotes
            .write()
            .map_err(|_| MintError::Poisoned)?
            .insert(
                quote_id,
                Quote {
                    response: response.clone(),
                    amount: request.amount,
                    unit: request.unit,
                },
            );
        Ok(response)
    }

    pub fn quote(&self, quote_id: &str) -> Result<MintQuoteResponse> {
        self.quotes
            .read()
            .map_err(|_| MintError::Poisoned)?
            .get(quote_id)
            .map(|q| q.response.clone())
            .ok_or_else(|| MintError::UnknownQuote(quote_id.to_string()))
    }

    /// Mark an unpaid quote as paid; already paid or issued quotes are unchanged
    pub fn pay(&self, quote_id: &str) -> Result<MintQuoteResponse> {
        let mut quotes = self.quotes.write().map_err(|_| MintError::Poisoned)?;
        let quote = quotes
            .get_mut(quote_id)
            .ok_or_else(|| MintError::UnknownQuote(quote_id.to_string()))?;
        if quote.response.state == MintQuoteState::Unpaid {
            quote.response.state = MintQuoteState::Paid;
            log::info!("Quote {} paid", quote_id);
        }
        Ok(quote.response.clone())
    }

    /// Sign the outputs of a paid quote and mark it issued
    pub fn mint(&self, quote_id: &str, outputs: &[BlindedMessage]) -> Result<Vec<BlindSignature>> {
        let mut quotes = self.quotes.write().map_err(|_| MintError::Poisoned)?;
        let quote = quotes
            .get_mut(quote_id)
            .ok_or_else(|| MintError::UnknownQuote(quote_id.to_string()))?;

        match quote.response.state {
            MintQuoteState::Unpaid => return Err(MintError::QuoteNotPaid(quote_id.to_string())),
            MintQuoteState::Issued => return Err(MintError::QuoteIssued(quote_id.to_string())),
            MintQuoteState::Paid => {}
        }

        let total: u64 = outputs.iter().map(|o| o.amount).sum();
        if total != quote.amount {
            return Err(MintError::AmountMismatch {
                outputs: total,
                quote: quote.amount,
            });
        }

        let signatures = outputs
            .iter()
            .map(|output| {
                let keyset = self.keyset(&output.id)?;
                if keyset.info.unit != quote.unit {
                    return Err(MintError::InvalidOutput(format!(
                        "keyset {} is not a {} keyset",
                        output.id, quote.unit
                    )));
                }
                keyset.sign(output)
            })
            .collect::<Result<Vec<_>>>()?;

        quote.response.state = MintQuoteState::Issued;
        log::info!("Quote {} issued {} signatures", quote_id, signatures.len());
        Ok(signatures)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
