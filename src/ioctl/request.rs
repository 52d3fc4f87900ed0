/*!
 * Request Record
 *
 * Fixed-shape record a caller places in its own memory before issuing a
 * command. Layout (little-endian, 48 bytes):
 *
 * | offset | field      | type |
 * |--------|------------|------|
 * | 0      | key_type   | i32  |
 * | 4      | value_type | i32  |
 * | 8      | key_size   | u64  |
 * | 16     | value_size | u64  |
 * | 24     | key        | u64 address, 0 is null |
 * | 32     | value      | u64 address, 0 is null |
 * | 40     | token      | u64, 0 is none |
 */

use crate::core::config::StoreConfig;
use crate::core::errors::{DictError, DictResult};
use crate::core::types::{Generation, Size, Tag};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address in a caller's address space
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UserPtr(u64);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn addr(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Pointer `offset` bytes further
    #[inline]
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0.wrapping_add(offset))
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr(0x{:x})", self.0)
    }
}

/// Decoded request record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoctlRequest {
    pub key_type: Tag,
    pub value_type: Tag,
    pub key_size: Size,
    pub value_size: Size,
    pub key: UserPtr,
    pub value: UserPtr,
    pub token: Generation,
}

impl IoctlRequest {
    pub const RECORD_SIZE: usize = 48;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: UserPtr, key_size: Size, key_type: Tag) -> Self {
        self.key = key;
        self.key_size = key_size;
        self.key_type = key_type;
        self
    }

    pub fn with_value(mut self, value: UserPtr, value_size: Size, value_type: Tag) -> Self {
        self.value = value;
        self.value_size = value_size;
        self.value_type = value_type;
        self
    }

    pub fn with_token(mut self, token: Generation) -> Self {
        self.token = token;
        self
    }

    /// Serialize into the wire layout
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::RECORD_SIZE);
        buf.put_i32_le(self.key_type);
        buf.put_i32_le(self.value_type);
        buf.put_u64_le(self.key_size as u64);
        buf.put_u64_le(self.value_size as u64);
        buf.put_u64_le(self.key.addr());
        buf.put_u64_le(self.value.addr());
        buf.put_u64_le(self.token);
        buf.freeze()
    }

    /// Parse the wire layout; sizes that do not fit `usize` are rejected
    pub fn decode(mut buf: &[u8]) -> DictResult<Self> {
        if buf.len() < Self::RECORD_SIZE {
            return Err(DictError::invalid_argument(format!(
                "request record truncated to {} bytes",
                buf.len()
            )));
        }

        let key_type = buf.get_i32_le();
        let value_type = buf.get_i32_le();
        let key_size = to_size(buf.get_u64_le(), "key_size")?;
        let value_size = to_size(buf.get_u64_le(), "value_size")?;
        let key = UserPtr::new(buf.get_u64_le());
        let value = UserPtr::new(buf.get_u64_le());
        let token = buf.get_u64_le();

        Ok(Self {
            key_type,
            value_type,
            key_size,
            value_size,
            key,
            value,
            token,
        })
    }

    /// Key reference checks shared by every command
    pub fn validate_key(&self, config: &StoreConfig) -> DictResult<()> {
        if self.key.is_null() {
            return Err(DictError::invalid_argument("null key"));
        }
        if self.key_size == 0 {
            return Err(DictError::invalid_argument("zero key size"));
        }
        if self.key_size > config.max_key_size {
            return Err(DictError::invalid_argument(format!(
                "key size {} exceeds limit {}",
                self.key_size, config.max_key_size
            )));
        }
        Ok(())
    }

    /// Full checks for SET: both payloads present and non-empty, tags non-negative
    pub fn validate_set(&self, config: &StoreConfig) -> DictResult<()> {
        if self.key.is_null() || self.value.is_null() {
            return Err(DictError::invalid_argument("null key or value"));
        }
        if self.key_size == 0 || self.value_size == 0 {
            return Err(DictError::invalid_argument("zero key or value size"));
        }
        if self.key_type < 0 || self.value_type < 0 {
            return Err(DictError::invalid_argument("negative type tag"));
        }
        self.validate_key(config)?;
        self.validate_value_buffer(config)
    }

    /// Value buffer checks for SET and the transfer phase of GET
    pub fn validate_value_buffer(&self, config: &StoreConfig) -> DictResult<()> {
        if self.value.is_null() {
            return Err(DictError::invalid_argument("null value buffer"));
        }
        if self.value_size == 0 {
            return Err(DictError::invalid_argument("zero value size"));
        }
        if self.value_size > config.max_value_size {
            return Err(DictError::invalid_argument(format!(
                "value size {} exceeds limit {}",
                self.value_size, config.max_value_size
            )));
        }
        Ok(())
    }
}

fn to_size(raw: u64, field: &str) -> DictResult<Size> {
    Size::try_from(raw)
        .map_err(|_| DictError::invalid_argument(format!("{} {} out of range", field, raw)))
}
