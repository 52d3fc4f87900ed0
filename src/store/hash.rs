/*!
 * Key Hasher
 *
 * Shift-add memory hash used by the driver since its first version.
 * Bucket placement must stay compatible, so the function is fixed:
 * `h = (h << 13) + (h >> 7) + h + b` over every byte, wrapping at 64 bits.
 * It offers no collision resistance; lookups always confirm key bytes.
 */

use crate::core::types::Digest;

/// Digest of a key's bytes
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> Digest {
    bytes.iter().fold(0, |h: Digest, &b| {
        (h << 13)
            .wrapping_add(h >> 7)
            .wrapping_add(h)
            .wrapping_add(Digest::from(b))
    })
}

/// Bucket index of a digest in a table of `size` buckets
#[inline(always)]
pub fn bucket_index(hash: Digest, size: usize) -> usize {
    (hash % size as Digest) as usize
}
