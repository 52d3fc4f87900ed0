/*!
 * Core Types
 * Shared scalar aliases and the inline string used in error messages
 */

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Cached key digest stored in every entry
pub type Digest = u64;

/// Caller-assigned type tag (opaque to the engine)
pub type Tag = i32;

/// Generation stamp of an entry, redeemed by the second phase of GET
pub type Generation = u64;

/// Byte size of a payload as carried in a request record
pub type Size = usize;

/// Well-known value tags used by the bundled clients
///
/// The engine never interprets tags; any non-negative value is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ValueType {
    Int = 1,
    Char = 2,
}

impl ValueType {
    #[inline]
    pub const fn tag(self) -> Tag {
        self as Tag
    }
}

impl From<ValueType> for Tag {
    #[inline]
    fn from(value: ValueType) -> Self {
        value.tag()
    }
}

/// Inline-optimized string that keeps short messages (≤23 bytes) off the heap
///
/// Most validation messages ("null key", "zero key size") fit inline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct InlineString {
    inner: SmartString,
}

impl InlineString {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: SmartString::new(),
        }
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Check if string is stored inline (no heap allocation)
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }
}

impl fmt::Display for InlineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for InlineString {
    #[inline]
    fn from(s: &str) -> Self {
        Self { inner: s.into() }
    }
}

impl From<String> for InlineString {
    #[inline]
    fn from(s: String) -> Self {
        Self { inner: s.into() }
    }
}

impl AsRef<str> for InlineString {
    #[inline]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
