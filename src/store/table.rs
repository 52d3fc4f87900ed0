/*!
 * Bucket Chain Table
 *
 * Array of owned singly-linked chains. Each bucket owns its head, each entry
 * owns its successor. Entries live in bucket `key_hash % size` for the
 * current size; `count` and `bytes_stored` always describe the reachable
 * entries exactly.
 */

use super::entry::{copy_owned, Entry, Link};
use super::growth::GrowthPolicy;
use super::hash::{bucket_index, hash_bytes};
use crate::core::config::StoreConfig;
use crate::core::errors::{DictError, DictResult};
use crate::core::types::{Digest, Generation, Tag};
use serde::{Deserialize, Serialize};

/// Result of a successful `Table::set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    /// A new entry was linked
    Inserted,
    /// An existing entry's value was overwritten in place
    Replaced,
}

/// Point-in-time table statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub buckets: usize,
    pub bytes_stored: usize,
    pub resizes: u64,
    pub longest_chain: usize,
    pub empty_buckets: usize,
}

/// Chained hash table holding every entry of a store
pub struct Table {
    pub(super) buckets: Vec<Link>,
    pub(super) count: usize,
    pub(super) bytes_stored: usize,
    pub(super) resizes: u64,
    pub(super) policy: GrowthPolicy,
    next_generation: Generation,
    memory_limit: Option<usize>,
}

impl Table {
    /// Create an empty table with `config.initial_size` buckets
    pub fn new(config: &StoreConfig) -> DictResult<Self> {
        config
            .validate()
            .map_err(|e| DictError::invalid_argument(e.to_string()))?;

        Ok(Self {
            buckets: allocate_buckets(config.initial_size)?,
            count: 0,
            bytes_stored: 0,
            resizes: 0,
            policy: GrowthPolicy::from_config(config),
            next_generation: 1,
            memory_limit: config.memory_limit,
        })
    }

    /// Insert a new pair or overwrite the value of an existing key
    pub fn set(
        &mut self,
        key: &[u8],
        key_type: Tag,
        value: &[u8],
        value_type: Tag,
    ) -> DictResult<SetOutcome> {
        self.set_owned(copy_owned(key)?, key_type, copy_owned(value)?, value_type)
    }

    /// `set` for payloads the caller already copied into engine memory
    ///
    /// On error nothing is linked and no existing value is lost.
    pub fn set_owned(
        &mut self,
        key: Box<[u8]>,
        key_type: Tag,
        value: Box<[u8]>,
        value_type: Tag,
    ) -> DictResult<SetOutcome> {
        let hash = hash_bytes(&key);
        let idx = bucket_index(hash, self.buckets.len());
        let generation = self.next_generation;

        if let Some(entry) = find_in_chain_mut(&mut self.buckets[idx], hash, &key) {
            let projected = self.bytes_stored - entry.value_size() + value.len();
            ensure_budget(self.memory_limit, projected)?;
            entry.replace_value(value, value_type, generation);
            self.bytes_stored = projected;
            self.next_generation += 1;
            return Ok(SetOutcome::Replaced);
        }

        let projected = self
            .bytes_stored
            .checked_add(key.len() + value.len())
            .ok_or_else(|| DictError::out_of_memory("stored byte count overflow"))?;
        ensure_budget(self.memory_limit, projected)?;

        let mut entry = Entry::new(key, key_type, hash, value, value_type, generation);
        let head = &mut self.buckets[idx];
        entry.next = head.take();
        *head = Some(entry);

        self.count += 1;
        self.bytes_stored = projected;
        self.next_generation += 1;

        self.maybe_grow();
        Ok(SetOutcome::Inserted)
    }

    /// Read view of the entry stored under `key`
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        let hash = hash_bytes(key);
        let mut cursor = self.buckets[bucket_index(hash, self.buckets.len())].as_deref();
        while let Some(entry) = cursor {
            if entry.matches(hash, key) {
                return Some(entry);
            }
            cursor = entry.next.as_deref();
        }
        None
    }

    /// Unlink the entry stored under `key` and hand it to the caller
    pub fn remove(&mut self, key: &[u8]) -> Option<Box<Entry>> {
        let hash = hash_bytes(key);
        let idx = bucket_index(hash, self.buckets.len());

        let mut cursor = &mut self.buckets[idx];
        while cursor
            .as_ref()
            .is_some_and(|entry| !entry.matches(hash, key))
        {
            if let Some(entry) = cursor {
                cursor = &mut entry.next;
            }
        }

        let mut removed = cursor.take()?;
        *cursor = removed.next.take();

        self.count -= 1;
        self.bytes_stored -= removed.footprint();
        Some(removed)
    }

    /// Release every entry, returning how many were dropped
    ///
    /// Chains are dismantled iteratively so long chains never recurse in drop.
    pub fn clear(&mut self) -> usize {
        let mut released = 0;
        for head in self.buckets.iter_mut() {
            let mut chain = head.take();
            while let Some(mut entry) = chain {
                chain = entry.next.take();
                released += 1;
            }
        }
        self.count = 0;
        self.bytes_stored = 0;
        released
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current bucket count
    #[inline]
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn bytes_stored(&self) -> usize {
        self.bytes_stored
    }

    #[inline]
    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    /// Iterate over all entries, bucket by bucket
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buckets: self.buckets.iter(),
            current: None,
        }
    }

    /// Length of the chain in bucket `idx`
    pub fn chain_len(&self, idx: usize) -> usize {
        let mut len = 0;
        let mut cursor = self.buckets.get(idx).and_then(|head| head.as_deref());
        while let Some(entry) = cursor {
            len += 1;
            cursor = entry.next.as_deref();
        }
        len
    }

    pub fn stats(&self) -> StoreStats {
        let mut longest_chain = 0;
        let mut empty_buckets = 0;
        for idx in 0..self.buckets.len() {
            let len = self.chain_len(idx);
            if len == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(len);
        }

        StoreStats {
            entries: self.count,
            buckets: self.buckets.len(),
            bytes_stored: self.bytes_stored,
            resizes: self.resizes,
            longest_chain,
            empty_buckets,
        }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Iterator over table entries
pub struct Iter<'a> {
    buckets: std::slice::Iter<'a, Link>,
    current: Option<&'a Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current {
                self.current = entry.next.as_deref();
                return Some(entry);
            }
            self.current = self.buckets.next()?.as_deref();
        }
    }
}

/// Bucket array of `size` empty chains, allocated fallibly
pub(super) fn allocate_buckets(size: usize) -> DictResult<Vec<Link>> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(size)?;
    buckets.resize_with(size, || None);
    Ok(buckets)
}

fn find_in_chain_mut<'a>(head: &'a mut Link, hash: Digest, key: &[u8]) -> Option<&'a mut Entry> {
    let mut cursor = head.as_deref_mut();
    while let Some(entry) = cursor {
        if entry.matches(hash, key) {
            return Some(entry);
        }
        cursor = entry.next.as_deref_mut();
    }
    None
}

fn ensure_budget(limit: Option<usize>, projected: usize) -> DictResult<()> {
    match limit {
        Some(limit) if projected > limit => Err(DictError::out_of_memory(format!(
            "memory limit of {} bytes exceeded ({} bytes required)",
            limit, projected
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        Table::new(&StoreConfig::default()).unwrap()
    }

    /// Table whose every key lands in bucket 0
    fn single_bucket() -> Table {
        Table::new(&StoreConfig::new().with_initial_size(1).with_density_threshold(1000)).unwrap()
    }

    #[test]
    fn test_set_then_get() {
        let mut t = table();
        assert_eq!(t.set(b"key", 2, b"value", 2).unwrap(), SetOutcome::Inserted);
        let e = t.get(b"key").unwrap();
        assert_eq!(e.value(), b"value");
        assert_eq!(e.value_type(), 2);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry_and_key_type() {
        let mut t = table();
        t.set(b"key", 2, b"value", 2).unwrap();
        assert_eq!(t.set(b"key", 9, &[1, 2, 3], 1).unwrap(), SetOutcome::Replaced);
        let e = t.get(b"key").unwrap();
        assert_eq!(e.value(), &[1, 2, 3]);
        assert_eq!(e.value_type(), 1);
        assert_eq!(e.key_type(), 2);
        assert_eq!(t.len(), 1);
        assert_eq!(t.bytes_stored(), 3 + 3);
    }

    #[test]
    fn test_overwrite_bumps_generation() {
        let mut t = table();
        t.set(b"k", 0, b"a", 0).unwrap();
        let first = t.get(b"k").unwrap().generation();
        t.set(b"k", 0, b"b", 0).unwrap();
        assert!(t.get(b"k").unwrap().generation() > first);
    }

    #[test]
    fn test_remove_head_interior_and_tail() {
        let mut t = single_bucket();
        for key in [b"a", b"b", b"c", b"d"] {
            t.set(key, 0, key, 0).unwrap();
        }
        // Chain order is d, c, b, a (head insertion)
        assert!(t.remove(b"c").is_some()); // interior
        assert!(t.remove(b"a").is_some()); // tail
        assert!(t.remove(b"d").is_some()); // head
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(b"b").unwrap().value(), b"b");
        assert!(t.get(b"a").is_none());
        assert_eq!(t.chain_len(0), 1);
    }

    #[test]
    fn test_remove_missing_changes_nothing() {
        let mut t = single_bucket();
        t.set(b"a", 0, b"1", 0).unwrap();
        assert!(t.remove(b"zz").is_none());
        assert_eq!(t.len(), 1);
        assert_eq!(t.bytes_stored(), 2);
    }

    #[test]
    fn test_count_reaches_zero() {
        let mut t = table();
        t.set(b"only", 0, b"1", 0).unwrap();
        t.remove(b"only").unwrap();
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert_eq!(t.bytes_stored(), 0);
    }

    #[test]
    fn test_empty_table_lookups() {
        let mut t = table();
        assert!(t.get(b"nothing").is_none());
        assert!(t.remove(b"nothing").is_none());
        assert_eq!(t.iter().count(), 0);
    }

    #[test]
    fn test_memory_limit_rejects_insert_cleanly() {
        let mut t = Table::new(&StoreConfig::new().with_memory_limit(10)).unwrap();
        t.set(b"abc", 0, b"defg", 0).unwrap();
        let err = t.set(b"xyz", 0, b"1234", 0).unwrap_err();
        assert!(matches!(err, DictError::OutOfMemory(_)));
        assert_eq!(t.len(), 1);
        assert!(t.get(b"xyz").is_none());
    }

    #[test]
    fn test_memory_limit_rejects_overwrite_without_losing_value() {
        let mut t = Table::new(&StoreConfig::new().with_memory_limit(8)).unwrap();
        t.set(b"abc", 0, b"de", 0).unwrap();
        assert!(t.set(b"abc", 0, b"0123456789", 1).is_err());
        let e = t.get(b"abc").unwrap();
        assert_eq!(e.value(), b"de");
        assert_eq!(e.value_type(), 0);
    }

    #[test]
    fn test_iter_visits_every_entry() {
        let mut t = table();
        for i in 0u32..50 {
            t.set(&i.to_le_bytes(), 1, b"v", 2).unwrap();
        }
        assert_eq!(t.iter().count(), 50);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut t = single_bucket();
        for i in 0u32..500 {
            t.set(&i.to_le_bytes(), 1, b"v", 2).unwrap();
        }
        assert_eq!(t.clear(), 500);
        assert!(t.is_empty());
        assert_eq!(t.stats().longest_chain, 0);
    }

    #[test]
    fn test_stats() {
        let mut t = single_bucket();
        t.set(b"a", 0, b"1", 0).unwrap();
        t.set(b"b", 0, b"2", 0).unwrap();
        let stats = t.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.buckets, 1);
        assert_eq!(stats.longest_chain, 2);
        assert_eq!(stats.empty_buckets, 0);
        assert_eq!(stats.bytes_stored, 4);
    }
}
