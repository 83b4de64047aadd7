//! Blind Diffie-Hellman key exchange (NUT-00)
//!
//! The wallet blinds a secret before sending it to the mint, the mint signs
//! the blinded point with the private key for the requested amount, and the
//! wallet unblinds the result into a proof:
//!
//! - `Y  = hash_to_curve(secret)`
//! - `B_ = Y + r*G`
//! - `C_ = k*B_` (mint)
//! - `C  = C_ - r*K`
//!
//! The mint-side helpers (`sign_message`, `verify_message`) are exposed for
//! mock mints and tests.

use secp256k1::rand::{thread_rng, RngCore};
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{CashuError, Result};
use crate::nuts::{BlindSignature, BlindedMessage, Keys, Proof};

const DOMAIN_SEPARATOR: &[u8] = b"Secp256k1_HashToCurve_Cashu_";

/// Map a message onto a secp256k1 point with a known-nothing discrete log
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey> {
    let msg_to_hash: [u8; 32] = Sha256::new()
        .chain_update(DOMAIN_SEPARATOR)
        .chain_update(message)
        .finalize()
        .into();

    for counter in 0u32..(1 << 16) {
        let hash = Sha256::new()
            .chain_update(msg_to_hash)
            .chain_update(counter.to_le_bytes())
            .finalize();

        let mut candidate = [0u8; 33];
        candidate[0] = 0x02;
        candidate[1..].copy_from_slice(&hash);
        if let Ok(point) = PublicKey::from_slice(&candidate) {
            return Ok(point);
        }
    }

    Err(CashuError::Crypto("No valid point found".to_string()))
}

/// Blind a secret. Returns `(B_, r)`; a random `r` is drawn when none is given.
pub fn blind_message(
    secret: &[u8],
    blinding_factor: Option<SecretKey>,
) -> Result<(PublicKey, SecretKey)> {
    let secp = Secp256k1::new();
    let y = hash_to_curve(secret)?;
    let r = blinding_factor.unwrap_or_else(|| SecretKey::new(&mut thread_rng()));
    let b = y.combine(&PublicKey::from_secret_key(&secp, &r))?;
    Ok((b, r))
}

/// Mint side: `C_ = k*B_`
pub fn sign_message(k: &SecretKey, blinded: &PublicKey) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    Ok(blinded.mul_tweak(&secp, &Scalar::from(*k))?)
}

/// `C = C_ - r*K`
pub fn unblind_message(
    blinded_sig: &PublicKey,
    r: &SecretKey,
    mint_pubkey: &PublicKey,
) -> Result<PublicKey> {
    let secp = Secp256k1::new();
    let r_k = mint_pubkey.mul_tweak(&secp, &Scalar::from(*r))?;
    Ok(blinded_sig.combine(&r_k.negate(&secp))?)
}

/// Mint side: check `k*hash_to_curve(secret) == C`
pub fn verify_message(k: &SecretKey, unblinded: &PublicKey, secret: &[u8]) -> Result<bool> {
    let secp = Secp256k1::new();
    let y = hash_to_curve(secret)?;
    Ok(y.mul_tweak(&secp, &Scalar::from(*k))? == *unblinded)
}

/// Split an amount into power-of-two denominations, smallest first
pub fn split_amount(amount: u64) -> Vec<u64> {
    (0..u64::BITS)
        .map(|bit| 1u64 << bit)
        .filter(|denomination| amount & denomination != 0)
        .collect()
}

fn parse_pubkey(hex_str: &str) -> Result<PublicKey> {
    let bytes = hex::decode(hex_str).map_err(|e| CashuError::Crypto(e.to_string()))?;
    Ok(PublicKey::from_slice(&bytes)?)
}

/// One blinded output awaiting its signature
#[derive(Debug, Clone)]
pub struct PreMint {
    pub blinded_message: BlindedMessage,
    pub secret: String,
    pub r: SecretKey,
}

/// Blinded outputs for a mint request, kept until signatures come back
#[derive(Debug, Clone)]
pub struct PreMintSecrets {
    pub keyset_id: String,
    pub secrets: Vec<PreMint>,
}

impl PreMintSecrets {
    /// Fresh random secrets covering `amount` in power-of-two outputs
    pub fn random(keyset_id: &str, amount: u64) -> Result<Self> {
        let mut rng = thread_rng();
        let secrets = split_amount(amount)
            .into_iter()
            .map(|denomination| {
                let mut secret_bytes = [0u8; 32];
                rng.fill_bytes(&mut secret_bytes);
                let secret = hex::encode(secret_bytes);

                let (blinded, r) = blind_message(secret.as_bytes(), None)?;
                Ok(PreMint {
                    blinded_message: BlindedMessage {
                        amount: denomination,
                        id: keyset_id.to_string(),
                        blinded_secret: hex::encode(blinded.serialize()),
                    },
                    secret,
                    r,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            keyset_id: keyset_id.to_string(),
            secrets,
        })
    }

    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets
            .iter()
            .map(|p| p.blinded_message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Unblind the mint's signatures into proofs. Signatures must come back in
    /// output order with matching amounts.
    pub fn construct_proofs(&self, signatures: &[BlindSignature], keys: &Keys) -> Result<Vec<Proof>> {
        if signatures.len() != self.secrets.len() {
            return Err(CashuError::InvalidMintResponse(format!(
                "expected {} signatures, got {}",
                self.secrets.len(),
                signatures.len()
            )));
        }

        self.secrets
            .iter()
            .zip(signatures)
            .map(|(pre, sig)| {
                if sig.amount != pre.blinded_message.amount {
                    return Err(CashuError::InvalidMintResponse(format!(
                        "signature amount {} does not match output amount {}",
                        sig.amount, pre.blinded_message.amount
                    )));
                }
                let mint_key = keys.get(&sig.amount).ok_or_else(|| CashuError::MissingKey {
                    keyset_id: sig.id.clone(),
                    amount: sig.amount,
                })?;

                let c = unblind_message(&parse_pubkey(&sig.c)?, &pre.r, &parse_pubkey(mint_key)?)?;
                Ok(Proof {
                    amount: sig.amount,
                    id: sig.id.clone(),
                    secret: pre.secret.clone(),
                    c: hex::encode(c.serialize()),
                })
            })
            .collect()
    }
}
