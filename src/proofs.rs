//! Proof storage
//!
//! All proofs live under a single storage key; wallets see their share by
//! filtering on keyset id. Every mutation is a read-modify-write under an
//! async mutex and broadcasts the resulting proof list.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::error::Result;
use crate::nuts::{proofs_amount, Proof};
use crate::storage::schema::Proofs;
use crate::storage::{KvStore, TypedStore};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct ProofStorage {
    store: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
    updates: broadcast::Sender<Vec<Proof>>,
}

impl ProofStorage {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
            updates,
        }
    }

    /// Receive the full proof list after each change
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Proof>> {
        self.updates.subscribe()
    }

    pub fn get_proofs(&self) -> Result<Vec<Proof>> {
        Ok(self.store.try_get::<Proofs>()?.unwrap_or_default())
    }

    pub fn get_proofs_by_keyset_id(&self, keyset_id: &str) -> Result<Vec<Proof>> {
        Ok(self
            .get_proofs()?
            .into_iter()
            .filter(|p| p.id == keyset_id)
            .collect())
    }

    /// Total value held under any of the given keysets
    pub fn balance_for_keysets(&self, keyset_ids: &HashSet<String>) -> Result<u64> {
        let proofs: Vec<Proof> = self
            .get_proofs()?
            .into_iter()
            .filter(|p| keyset_ids.contains(&p.id))
            .collect();
        Ok(proofs_amount(&proofs))
    }

    /// Append proofs; a proof whose secret is already stored is skipped
    pub async fn add_proofs(&self, proofs: &[Proof]) -> Result<Vec<Proof>> {
        let _guard = self.write_lock.lock().await;

        let mut current = self.get_proofs()?;
        let known: HashSet<String> = current.iter().map(|p| p.secret.clone()).collect();
        let mut added = 0usize;
        for proof in proofs {
            if known.contains(&proof.secret) {
                log::warn!("Skipping duplicate proof for keyset {}", proof.id);
                continue;
            }
            current.push(proof.clone());
            added += 1;
        }

        self.store.put::<Proofs>(&current)?;
        log::debug!("Stored {} new proofs ({} total)", added, current.len());
        self.emit(&current);
        Ok(current)
    }

    /// Remove proofs by secret
    pub async fn delete_proofs(&self, proofs: &[Proof]) -> Result<Vec<Proof>> {
        let _guard = self.write_lock.lock().await;

        let doomed: HashSet<&str> = proofs.iter().map(|p| p.secret.as_str()).collect();
        let remaining: Vec<Proof> = self
            .get_proofs()?
            .into_iter()
            .filter(|p| !doomed.contains(p.secret.as_str()))
            .collect();

        self.store.put::<Proofs>(&remaining)?;
        self.emit(&remaining);
        Ok(remaining)
    }

    fn emit(&self, proofs: &[Proof]) {
        // No receivers is fine
        let _ = self.updates.send(proofs.to_vec());
    }
}
