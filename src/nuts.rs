//! Mint wire types
//!
//! JSON shapes exchanged with a Cashu mint (NUT-00, 01, 02, 04, 06). Field
//! names follow the mint API exactly so responses deserialize untouched.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Denomination -> compressed public key (hex)
pub type Keys = BTreeMap<u64, String>;

/// GET /v1/info
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_long: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nuts: Option<serde_json::Value>,
}

/// Keyset summary from GET /v1/keysets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySetInfo {
    pub id: String,
    pub unit: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fee_ppk: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysetResponse {
    pub keysets: Vec<KeySetInfo>,
}

/// Public keys of one keyset from GET /v1/keys/{id}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintKeys {
    pub id: String,
    pub unit: String,
    pub keys: Keys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysResponse {
    pub keysets: Vec<MintKeys>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MintQuoteState {
    Unpaid,
    Paid,
    Issued,
}

impl fmt::Display for MintQuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpaid => write!(f, "UNPAID"),
            Self::Paid => write!(f, "PAID"),
            Self::Issued => write!(f, "ISSUED"),
        }
    }
}

/// POST /v1/mint/quote/bolt11
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintQuoteRequest {
    pub amount: u64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintQuoteResponse {
    pub quote: String,
    pub request: String,
    pub state: MintQuoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    pub amount: u64,
    pub id: String,
    #[serde(rename = "B_")]
    pub blinded_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    pub amount: u64,
    pub id: String,
    #[serde(rename = "C_")]
    pub c: String,
}

/// POST /v1/mint/bolt11
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub quote: String,
    pub outputs: Vec<BlindedMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintResponse {
    pub signatures: Vec<BlindSignature>,
}

/// A spendable ecash token of one denomination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof {
    pub amount: u64,
    /// Keyset id
    pub id: String,
    pub secret: String,
    #[serde(rename = "C")]
    pub c: String,
}

/// Error body returned by mints on non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u64>,
}

/// Sum of proof amounts
pub fn proofs_amount(proofs: &[Proof]) -> u64 {
    proofs.iter().map(|p| p.amount).sum()
}

/// Keyset id (version 00): first 7 bytes of SHA-256 over the compressed
/// public keys ordered by amount, hex encoded with a "00" prefix.
pub fn derive_keyset_id(keys: &Keys) -> Result<String, hex::FromHexError> {
    let mut hasher = Sha256::new();
    for pubkey in keys.values() {
        hasher.update(hex::decode(pubkey)?);
    }
    let digest = hasher.finalize();
    Ok(format!("00{}", hex::encode(&digest[..7])))
}
