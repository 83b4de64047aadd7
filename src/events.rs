//! Change notifications
//!
//! Wallets publish on `tokio::sync::broadcast` channels. A `Subscription`
//! fans several of those channels into one receiver; dropping it stops the
//! forwarding tasks, which is how callers unsubscribe.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::types::InvoiceHistoryItem;
use crate::wallet::CashuWallet;

/// Wallets keyed by wallet id
pub type WalletMap = BTreeMap<String, Arc<CashuWallet>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub wallet_id: String,
    pub balance: u64,
}

/// Pending mint quotes of one wallet after a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintQuoteUpdate {
    pub wallet_id: String,
    pub pending: Vec<InvoiceHistoryItem>,
}

pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> Subscription<T> {
    pub(crate) fn new() -> (mpsc::UnboundedSender<T>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                tasks: Vec::new(),
            },
        )
    }

    /// Forward every message from `source` through `map`
    pub(crate) fn forward<U, F>(
        &mut self,
        tx: &mpsc::UnboundedSender<T>,
        mut source: broadcast::Receiver<U>,
        map: F,
    ) where
        U: Clone + Send + 'static,
        F: Fn(U) -> T + Send + 'static,
    {
        let tx = tx.clone();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(value) => {
                        if tx.send(map(value)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Subscriber lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Next event, `None` once every source has closed
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of channels feeding this subscription
    pub fn source_count(&self) -> usize {
        self.tasks.len()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
