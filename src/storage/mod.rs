//! Storage and persistence layer
//!
//! - Key-value backends (memory, file system)
//! - Typed schema keys
//! - Schema initialization

mod file_system;
mod memory;
pub mod schema;

pub use file_system::FileStore;
pub use memory::MemoryStore;
pub use schema::SchemaKey;

use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// Raw string key-value store
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Typed access to the fixed schema keys, available on every `KvStore`
pub trait TypedStore {
    /// Read a key; a missing key is an error
    fn get<K: SchemaKey>(&self) -> Result<K::Value, StorageError>;

    /// Read a key, `None` when it was never written
    fn try_get<K: SchemaKey>(&self) -> Result<Option<K::Value>, StorageError>;

    fn put<K: SchemaKey>(&self, value: &K::Value) -> Result<(), StorageError>;

    fn remove<K: SchemaKey>(&self) -> Result<(), StorageError>;
}

impl<S: KvStore + ?Sized> TypedStore for S {
    fn get<K: SchemaKey>(&self) -> Result<K::Value, StorageError> {
        self.try_get::<K>()?
            .ok_or_else(|| StorageError::KeyNotFound(K::KEY.to_string()))
    }

    fn try_get<K: SchemaKey>(&self) -> Result<Option<K::Value>, StorageError> {
        match self.get_raw(K::KEY)? {
            Some(raw) => Ok(Some(decode::<K::Value>(&raw)?)),
            None => Ok(None),
        }
    }

    fn put<K: SchemaKey>(&self, value: &K::Value) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.put_raw(K::KEY, &raw)
    }

    fn remove<K: SchemaKey>(&self) -> Result<(), StorageError> {
        self.delete(K::KEY)
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

/// Write the empty schema. Keys that already hold a value are left alone,
/// so proofs and history survive a missing version marker.
pub fn init_schema<S: KvStore + ?Sized>(
    store: &S,
    version: &str,
    default_unit: &str,
) -> Result<(), StorageError> {
    put_if_absent::<schema::Mints, _>(store, &Vec::new())?;
    put_if_absent::<schema::ActiveUnit, _>(store, &Some(default_unit.to_string()))?;
    put_if_absent::<schema::ActiveMintUrl, _>(store, &Some(String::new()))?;
    put_if_absent::<schema::KeysetCounters, _>(store, &Vec::new())?;
    put_if_absent::<schema::HistoryTokens, _>(store, &Vec::new())?;
    put_if_absent::<schema::InvoiceHistory, _>(store, &Vec::new())?;
    put_if_absent::<schema::Proofs, _>(store, &Vec::new())?;
    // written last: a crash midway leaves the store uninitialized, not half-initialized
    store.put::<schema::Version>(&version.to_string())?;
    Ok(())
}

fn put_if_absent<K: SchemaKey, S: KvStore + ?Sized>(
    store: &S,
    value: &K::Value,
) -> Result<(), StorageError> {
    if store.get_raw(K::KEY)?.is_none() {
        store.put::<K>(value)?;
    }
    Ok(())
}
