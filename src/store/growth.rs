/*!
 * Growth Policy
 *
 * After an insertion pushes the load past `density_threshold` entries per
 * bucket, the bucket array is replaced by one `growth_multiplier` times
 * larger and every entry is relinked by its cached hash. Payloads and hashes
 * are never touched, and the whole resize runs under the caller's guard.
 */

use super::table::{allocate_buckets, Table};
use super::hash::bucket_index;
use crate::core::config::StoreConfig;
use crate::core::errors::{DictError, DictResult};
use tracing::{debug, warn};

/// Load thresholds deciding when a table grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    multiplier: usize,
    density_threshold: usize,
}

impl GrowthPolicy {
    pub fn new(multiplier: usize, density_threshold: usize) -> Self {
        Self {
            multiplier,
            density_threshold,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.growth_multiplier, config.density_threshold)
    }

    #[inline]
    pub fn should_grow(&self, count: usize, size: usize) -> bool {
        count > size.saturating_mul(self.density_threshold)
    }

    #[inline]
    pub fn next_size(&self, size: usize) -> Option<usize> {
        size.checked_mul(self.multiplier)
    }
}

impl Table {
    /// Grow if the last insertion crossed the density threshold
    ///
    /// A failed resize leaves the current arrangement intact; the insertion
    /// that triggered it has already succeeded and growth is retried on the
    /// next insertion.
    pub(super) fn maybe_grow(&mut self) {
        if !self.policy.should_grow(self.count, self.buckets.len()) {
            return;
        }
        if let Err(e) = self.grow() {
            warn!(
                error = %e,
                size = self.buckets.len(),
                entries = self.count,
                "table growth failed, keeping current bucket array"
            );
        }
    }

    /// Replace the bucket array with a larger one and relink every entry
    pub(super) fn grow(&mut self) -> DictResult<()> {
        let old_size = self.buckets.len();
        let new_size = self
            .policy
            .next_size(old_size)
            .ok_or_else(|| DictError::out_of_memory("bucket count overflow"))?;
        let mut new_buckets = allocate_buckets(new_size)?;

        for head in self.buckets.iter_mut() {
            let mut chain = head.take();
            while let Some(mut entry) = chain {
                chain = entry.next.take();
                let slot = &mut new_buckets[bucket_index(entry.key_hash(), new_size)];
                entry.next = slot.take();
                *slot = Some(entry);
            }
        }

        self.buckets = new_buckets;
        self.resizes += 1;
        debug!(
            old_size,
            new_size,
            entries = self.count,
            "table grown and rehashed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::hash::hash_bytes;
    use crate::store::table::SetOutcome;

    fn fill_without_room_to_grow(multiplier: usize) {
        let config = StoreConfig::new()
            .with_initial_size(2)
            .with_growth_multiplier(multiplier);
        let mut t = Table::new(&config).unwrap();

        for i in 0u32..10 {
            let outcome = t.set(&i.to_le_bytes(), 1, &(i + 100).to_le_bytes(), 1);
            assert_eq!(outcome.unwrap(), SetOutcome::Inserted);
        }

        assert_eq!(t.size(), 2);
        assert_eq!(t.resizes(), 0);
        assert_eq!(t.len(), 10);
        for i in 0u32..10 {
            assert_eq!(t.get(&i.to_le_bytes()).unwrap().value(), &(i + 100).to_le_bytes());
        }
    }

    #[test]
    fn test_failed_allocation_keeps_entries() {
        fill_without_room_to_grow(usize::MAX / 4);
    }

    #[test]
    fn test_bucket_count_overflow_keeps_entries() {
        fill_without_room_to_grow(usize::MAX);
    }

    #[test]
    fn test_policy_thresholds() {
        let policy = GrowthPolicy::new(2, 1);
        assert!(!policy.should_grow(64, 64));
        assert!(policy.should_grow(65, 64));
        assert_eq!(policy.next_size(64), Some(128));
        assert_eq!(policy.next_size(usize::MAX), None);
    }

    #[test]
    fn test_growth_triggers_past_density() {
        let mut t = Table::new(&StoreConfig::new().with_initial_size(4)).unwrap();
        for i in 0u32..4 {
            t.set(&i.to_le_bytes(), 0, b"v", 0).unwrap();
        }
        assert_eq!(t.size(), 4);
        t.set(&4u32.to_le_bytes(), 0, b"v", 0).unwrap();
        assert_eq!(t.size(), 8);
        assert_eq!(t.resizes(), 1);
    }

    #[test]
    fn test_every_entry_in_its_bucket_after_growth() {
        let mut t = Table::new(&StoreConfig::new().with_initial_size(2)).unwrap();
        for i in 0u32..1000 {
            t.set(format!("key-{}", i).as_bytes(), 2, &i.to_le_bytes(), 1)
                .unwrap();
        }
        assert!(t.resizes() >= 9);
        for idx in 0..t.size() {
            let mut cursor = t.buckets[idx].as_deref();
            while let Some(entry) = cursor {
                assert_eq!(bucket_index(entry.key_hash(), t.size()), idx);
                assert_eq!(entry.key_hash(), hash_bytes(entry.key()));
                cursor = entry.next.as_deref();
            }
        }
        assert_eq!(t.iter().count(), t.len());
    }

    #[test]
    fn test_growth_preserves_values() {
        let mut t = Table::new(&StoreConfig::new().with_initial_size(1)).unwrap();
        for i in 0u32..300 {
            t.set(&i.to_be_bytes(), 1, &(i * 7).to_be_bytes(), 1).unwrap();
        }
        for i in 0u32..300 {
            let e = t.get(&i.to_be_bytes()).unwrap();
            assert_eq!(e.value(), &(i * 7).to_be_bytes());
        }
    }

    #[test]
    fn test_custom_multiplier_and_threshold() {
        let config = StoreConfig::new()
            .with_initial_size(4)
            .with_growth_multiplier(4)
            .with_density_threshold(2);
        let mut t = Table::new(&config).unwrap();
        for i in 0u32..9 {
            t.set(&i.to_le_bytes(), 0, b"v", 0).unwrap();
        }
        assert_eq!(t.size(), 16);
    }
}
