/*!
 * Dictionary Entry
 * Owned key/value record linked into a bucket chain
 */

use crate::core::errors::DictResult;
use crate::core::types::{Digest, Generation, Tag};

/// Link to the next entry of a chain (owning)
pub type Link = Option<Box<Entry>>;

/// Stored key/value pair
///
/// `key`, `key_type` and `key_hash` never change after construction; an
/// overwrite replaces only the value side and refreshes `generation`.
#[derive(Debug)]
pub struct Entry {
    key: Box<[u8]>,
    value: Box<[u8]>,
    key_type: Tag,
    value_type: Tag,
    key_hash: Digest,
    generation: Generation,
    pub(super) next: Link,
}

impl Entry {
    /// Build a detached entry around payloads already copied into engine memory
    pub(super) fn new(
        key: Box<[u8]>,
        key_type: Tag,
        key_hash: Digest,
        value: Box<[u8]>,
        value_type: Tag,
        generation: Generation,
    ) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            key_type,
            value_type,
            key_hash,
            generation,
            next: None,
        })
    }

    /// Full match: cached hash, then length, then bytes
    #[inline]
    pub fn matches(&self, hash: Digest, key: &[u8]) -> bool {
        self.key_hash == hash && self.key.len() == key.len() && *self.key == *key
    }

    /// Replace the value side in place, returning the previous value bytes
    pub(super) fn replace_value(
        &mut self,
        value: Box<[u8]>,
        value_type: Tag,
        generation: Generation,
    ) -> Box<[u8]> {
        self.value_type = value_type;
        self.generation = generation;
        std::mem::replace(&mut self.value, value)
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn key_type(&self) -> Tag {
        self.key_type
    }

    #[inline]
    pub fn value_type(&self) -> Tag {
        self.value_type
    }

    #[inline]
    pub fn value_size(&self) -> usize {
        self.value.len()
    }

    #[inline]
    pub fn key_hash(&self) -> Digest {
        self.key_hash
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Bytes accounted against the store's memory budget
    #[inline]
    pub fn footprint(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Copy bytes into a freshly allocated boxed slice without aborting on OOM
pub fn copy_owned(bytes: &[u8]) -> DictResult<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())?;
    buf.extend_from_slice(bytes);
    Ok(buf.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::hash::hash_bytes;

    fn entry(key: &[u8], value: &[u8]) -> Box<Entry> {
        Entry::new(key.into(), 2, hash_bytes(key), value.into(), 2, 1)
    }

    #[test]
    fn test_matches_requires_bytes_not_just_hash() {
        let e = entry(b"key", b"value");
        assert!(e.matches(hash_bytes(b"key"), b"key"));
        // Same hash claimed, different bytes
        assert!(!e.matches(e.key_hash(), b"kez"));
        // Same prefix, different length
        assert!(!e.matches(e.key_hash(), b"ke"));
    }

    #[test]
    fn test_replace_value_keeps_key_side() {
        let mut e = entry(b"key", b"value");
        let old = e.replace_value(vec![1, 0, 0, 0].into_boxed_slice(), 1, 7);
        assert_eq!(&*old, b"value");
        assert_eq!(e.value(), &[1, 0, 0, 0]);
        assert_eq!(e.value_type(), 1);
        assert_eq!(e.key(), b"key");
        assert_eq!(e.key_type(), 2);
        assert_eq!(e.generation(), 7);
    }

    #[test]
    fn test_copy_owned() {
        let owned = copy_owned(b"bytes").unwrap();
        assert_eq!(&*owned, b"bytes");
        assert!(copy_owned(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_footprint() {
        assert_eq!(entry(b"abc", b"de").footprint(), 5);
    }
}
