//! Fixed storage keys and the type stored under each

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::nuts::Proof;
use crate::types::{HistoryToken, InvoiceHistoryItem, KeysetCounter, Mint};

/// A storage key bound to the one collection type it holds
pub trait SchemaKey {
    const KEY: &'static str;
    type Value: Serialize + DeserializeOwned;
}

macro_rules! schema_key {
    ($name:ident, $key:literal, $value:ty) => {
        pub struct $name;

        impl SchemaKey for $name {
            const KEY: &'static str = $key;
            type Value = $value;
        }
    };
}

schema_key!(Mints, "cashu.mints", Vec<Mint>);
schema_key!(ActiveUnit, "cashu.activeUnit", Option<String>);
schema_key!(ActiveMintUrl, "cashu.activeMintUrl", Option<String>);
schema_key!(KeysetCounters, "cashu.keysetCounters", Vec<KeysetCounter>);
schema_key!(HistoryTokens, "cashu.historyTokens", Vec<HistoryToken>);
schema_key!(InvoiceHistory, "cashu.invoiceHistory", Vec<InvoiceHistoryItem>);
schema_key!(Version, "cashu.version", String);
schema_key!(Proofs, "cashu.proofs", Vec<Proof>);
