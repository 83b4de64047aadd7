//! Persisted records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nuts::{KeySetInfo, MintInfo, MintKeys};

pub const DEFAULT_UNIT: &str = "sat";

/// Identifier of the wallet for one mint/unit pair
pub fn wallet_id(mint_url: &str, unit: &str) -> String {
    format!("{}-{}", mint_url, unit)
}

/// Mint URLs are compared without a trailing slash
pub fn normalize_mint_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// A mint the user has added, with the keysets/keys fetched at that time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mint {
    pub url: String,
    pub info: MintInfo,
    pub keys: Vec<MintKeys>,
    pub keysets: Vec<KeySetInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Mint {
    /// Fold freshly fetched keysets and keys into this record. Entries are
    /// matched by keyset id; fetched ones win, others are kept.
    pub fn merge(&mut self, info: MintInfo, keysets: Vec<KeySetInfo>, keys: Vec<MintKeys>) {
        self.info = info;
        for keyset in keysets {
            match self.keysets.iter_mut().find(|k| k.id == keyset.id) {
                Some(existing) => *existing = keyset,
                None => self.keysets.push(keyset),
            }
        }
        for key in keys {
            match self.keys.iter_mut().find(|k| k.id == key.id) {
                Some(existing) => *existing = key,
                None => self.keys.push(key),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetCounter {
    pub id: String,
    pub counter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryToken {
    pub status: TokenStatus,
    pub token: String,
    pub amount: u64,
    pub unit: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Paid,
    Pending,
}

/// A lightning invoice issued through a mint quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHistoryItem {
    pub amount: u64,
    pub bolt11: String,
    pub hash: Option<String>,
    pub memo: Option<String>,
    /// Mint URL
    pub mint: String,
    /// Quote id
    pub quote: String,
    pub status: InvoiceStatus,
    pub unit: String,
}

impl InvoiceHistoryItem {
    pub fn wallet_id(&self) -> String {
        wallet_id(&self.mint, &self.unit)
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatus::Pending
    }
}
