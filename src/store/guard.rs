/*!
 * Dictionary Store
 *
 * Single-lock wrapper around a `Table`. Every operation, introspection
 * included, runs with the lock held and completes (growth included) before
 * releasing it. The engine never nests the lock.
 */

use super::entry::Entry;
use super::table::{SetOutcome, StoreStats, Table};
use crate::core::config::StoreConfig;
use crate::core::errors::{DictError, DictResult};
use crate::core::types::{Generation, Tag};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Size, type and generation of a stored value (first phase of GET)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub value_size: usize,
    pub value_type: Tag,
    pub token: Generation,
}

impl ValueInfo {
    fn of(entry: &Entry) -> Self {
        Self {
            value_size: entry.value_size(),
            value_type: entry.value_type(),
            token: entry.generation(),
        }
    }
}

/// Dictionary store shared by every request handler
pub struct DictStore {
    table: Mutex<Table>,
    config: StoreConfig,
}

impl DictStore {
    /// Create the store and its initial table
    pub fn create(config: StoreConfig) -> DictResult<Arc<Self>> {
        let table = Table::new(&config)?;
        info!(
            initial_size = config.initial_size,
            growth_multiplier = config.growth_multiplier,
            density_threshold = config.density_threshold,
            memory_limit = ?config.memory_limit,
            "dictionary store created"
        );
        Ok(Arc::new(Self {
            table: Mutex::new(table),
            config,
        }))
    }

    /// Tear the store down, releasing every entry
    ///
    /// Returns the number of entries released.
    pub fn destroy(self: Arc<Self>) -> usize {
        let released = self.table.lock().clear();
        let handles = Arc::strong_count(&self) - 1;
        if handles > 0 {
            debug!(handles, "store destroyed while handles are still held");
        }
        info!(released, "dictionary store destroyed");
        released
    }

    #[inline]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Acquire the guard for a compound operation
    ///
    /// Blocks until the lock is free. Callers must not call back into the
    /// store while holding the returned guard.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock()
    }

    /// Run `f` against the table with the guard held
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Table) -> R,
    {
        let mut table = self.table.lock();
        f(&mut table)
    }

    pub fn set(
        &self,
        key: &[u8],
        key_type: Tag,
        value: &[u8],
        value_type: Tag,
    ) -> DictResult<SetOutcome> {
        self.with(|table| table.set(key, key_type, value, value_type))
    }

    /// `set` taking payloads already copied in from the caller
    pub fn set_owned(
        &self,
        key: Box<[u8]>,
        key_type: Tag,
        value: Box<[u8]>,
        value_type: Tag,
    ) -> DictResult<SetOutcome> {
        self.with(|table| table.set_owned(key, key_type, value, value_type))
    }

    /// Copy of the stored value and its type
    pub fn get(&self, key: &[u8]) -> DictResult<(Vec<u8>, Tag)> {
        self.with(|table| {
            table
                .get(key)
                .map(|entry| (entry.value().to_vec(), entry.value_type()))
                .ok_or_else(|| DictError::not_found("no such key"))
        })
    }

    /// Delete `key`; `false` when it was not present
    pub fn delete(&self, key: &[u8]) -> bool {
        self.with(|table| table.remove(key).is_some())
    }

    pub fn value_info(&self, key: &[u8]) -> DictResult<ValueInfo> {
        self.with(|table| {
            table
                .get(key)
                .map(ValueInfo::of)
                .ok_or_else(|| DictError::not_found("no such key"))
        })
    }

    pub fn value_size(&self, key: &[u8]) -> DictResult<usize> {
        self.value_info(key).map(|info| info.value_size)
    }

    pub fn value_type(&self, key: &[u8]) -> DictResult<Tag> {
        self.value_info(key).map(|info| info.value_type)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.with(|table| table.get(key).is_some())
    }

    pub fn len(&self) -> usize {
        self.with(|table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        self.with(|table| table.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let store = DictStore::create(StoreConfig::default()).unwrap();
        store.set(b"key", 2, b"value", 2).unwrap();
        assert_eq!(store.get(b"key").unwrap(), (b"value".to_vec(), 2));
        assert_eq!(store.value_size(b"key").unwrap(), 5);
        assert_eq!(store.value_type(b"key").unwrap(), 2);
        assert!(store.delete(b"key"));
        assert!(!store.delete(b"key"));
        assert!(matches!(store.get(b"key"), Err(DictError::NotFound(_))));
    }

    #[test]
    fn test_empty_store_introspection() {
        let store = DictStore::create(StoreConfig::default()).unwrap();
        assert!(store.is_empty());
        assert!(store.value_info(b"missing").is_err());
        assert!(store.value_size(b"missing").is_err());
        assert!(store.value_type(b"missing").is_err());
    }

    #[test]
    fn test_compound_operation_under_one_guard() {
        let store = DictStore::create(StoreConfig::default()).unwrap();
        {
            let mut table = store.lock();
            table.set(b"a", 2, b"1", 2).unwrap();
            let moved = table.remove(b"a").unwrap();
            table.set(b"b", 2, moved.value(), moved.value_type()).unwrap();
        }
        assert!(!store.contains(b"a"));
        assert_eq!(store.get(b"b").unwrap(), (b"1".to_vec(), 2));
    }

    #[test]
    fn test_destroy_reports_released_entries() {
        let store = DictStore::create(StoreConfig::default()).unwrap();
        for i in 0u32..10 {
            store.set(&i.to_le_bytes(), 1, b"v", 2).unwrap();
        }
        assert_eq!(store.destroy(), 10);
    }

    #[test]
    fn test_concurrent_disjoint_writers() {
        let store = DictStore::create(StoreConfig::new().with_initial_size(2)).unwrap();
        let handles: Vec<_> = (0u32..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0u32..500 {
                        let key = format!("{}-{}", t, i);
                        store.set(key.as_bytes(), 2, &i.to_le_bytes(), 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 4000);
        assert_eq!(store.get(b"7-499").unwrap().0, 499u32.to_le_bytes().to_vec());
    }
}
