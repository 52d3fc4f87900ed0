/*!
 * Dictionary Client
 *
 * Caller-side wrapper over the boundary: maps payloads into an address
 * space, builds request records and issues commands through the
 * dispatcher. GET follows the two-phase protocol (GET_INFO, allocate,
 * GET with the returned token).
 */

use crate::core::errors::{DictError, DictResult};
use crate::core::limits::GET_RETRIES;
use crate::core::types::Tag;
use crate::ioctl::command::{
    DEL_PAIR, GET_VALUE, GET_VALUE_INFO, GET_VALUE_SIZE, GET_VALUE_TYPE, SET_PAIR,
};
use crate::ioctl::{AddressSpace, IoctlDispatcher, IoctlRequest, IoctlResponse, IoctlResult, UserPtr};
use crate::store::{SetOutcome, ValueInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Value bytes with their caller-assigned tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub bytes: Vec<u8>,
    pub value_type: Tag,
}

/// Region mapped for the duration of one call
struct Mapping<'a> {
    space: &'a AddressSpace,
    ptr: UserPtr,
}

impl<'a> Mapping<'a> {
    fn copy_of(space: &'a AddressSpace, bytes: &[u8]) -> Self {
        Self {
            space,
            ptr: space.map(bytes),
        }
    }

    fn zeroed(space: &'a AddressSpace, len: usize) -> Self {
        Self {
            space,
            ptr: space.alloc(len),
        }
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        self.space.unmap(self.ptr);
    }
}

/// Issues commands against a dispatcher from its own address space
#[derive(Clone)]
pub struct DictClient {
    dispatcher: IoctlDispatcher,
    space: Arc<AddressSpace>,
}

impl DictClient {
    pub fn new(dispatcher: IoctlDispatcher) -> Self {
        Self::with_space(dispatcher, Arc::new(AddressSpace::new()))
    }

    pub fn with_space(dispatcher: IoctlDispatcher, space: Arc<AddressSpace>) -> Self {
        Self { dispatcher, space }
    }

    #[inline]
    pub fn space(&self) -> &Arc<AddressSpace> {
        &self.space
    }

    #[inline]
    pub fn dispatcher(&self) -> &IoctlDispatcher {
        &self.dispatcher
    }

    /// Map `request` as a record and issue `cmd`
    pub fn call(&self, cmd: u32, request: &IoctlRequest) -> IoctlResult {
        let record = Mapping::copy_of(&self.space, &request.encode());
        self.dispatcher.ioctl(&*self.space, cmd, record.ptr)
    }

    pub fn set(
        &self,
        key: &[u8],
        key_type: Tag,
        value: &[u8],
        value_type: Tag,
    ) -> DictResult<SetOutcome> {
        if value.is_empty() {
            return Err(DictError::invalid_argument("empty value"));
        }
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        let v = Mapping::copy_of(&self.space, value);
        let request = IoctlRequest::new()
            .with_key(k.ptr, key.len(), key_type)
            .with_value(v.ptr, value.len(), value_type);

        match self.call(SET_PAIR, &request).into_result()? {
            IoctlResponse::Stored { outcome } => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    /// Two-phase GET
    ///
    /// Re-runs both phases when the value is replaced between them; a key
    /// deleted in between surfaces as NotFound from the first phase.
    pub fn get(&self, key: &[u8], key_type: Tag) -> DictResult<Value> {
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        let mut attempt = 0;

        loop {
            let info = self.info_at(k.ptr, key.len(), key_type)?;
            let buffer = Mapping::zeroed(&self.space, info.value_size);
            let request = IoctlRequest::new()
                .with_key(k.ptr, key.len(), key_type)
                .with_value(buffer.ptr, info.value_size, info.value_type)
                .with_token(info.token);

            match self.call(GET_VALUE, &request).into_result() {
                Ok(IoctlResponse::Value {
                    value_size,
                    value_type,
                }) => {
                    let bytes = self.space.read(buffer.ptr, value_size)?;
                    return Ok(Value { bytes, value_type });
                }
                Ok(other) => return Err(unexpected(other)),
                Err(DictError::NotFound(reason)) if attempt < GET_RETRIES => {
                    attempt += 1;
                    debug!(attempt, %reason, "value changed between GET phases, retrying");
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub fn get_size(&self, key: &[u8], key_type: Tag) -> DictResult<usize> {
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        let request = IoctlRequest::new().with_key(k.ptr, key.len(), key_type);
        match self.call(GET_VALUE_SIZE, &request).into_result()? {
            IoctlResponse::ValueSize { value_size } => Ok(value_size),
            other => Err(unexpected(other)),
        }
    }

    pub fn get_type(&self, key: &[u8], key_type: Tag) -> DictResult<Tag> {
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        let request = IoctlRequest::new().with_key(k.ptr, key.len(), key_type);
        match self.call(GET_VALUE_TYPE, &request).into_result()? {
            IoctlResponse::ValueType { value_type } => Ok(value_type),
            other => Err(unexpected(other)),
        }
    }

    /// Size, type and generation token in one crossing
    pub fn info(&self, key: &[u8], key_type: Tag) -> DictResult<ValueInfo> {
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        self.info_at(k.ptr, key.len(), key_type)
    }

    /// Delete `key`; `Ok(false)` when it was not present
    pub fn delete(&self, key: &[u8], key_type: Tag) -> DictResult<bool> {
        check_key(key)?;
        let k = Mapping::copy_of(&self.space, key);
        let request = IoctlRequest::new().with_key(k.ptr, key.len(), key_type);
        match self.call(DEL_PAIR, &request).into_result()? {
            IoctlResponse::Deleted { removed } => Ok(removed),
            other => Err(unexpected(other)),
        }
    }

    fn info_at(&self, key: UserPtr, key_size: usize, key_type: Tag) -> DictResult<ValueInfo> {
        let request = IoctlRequest::new().with_key(key, key_size, key_type);
        match self.call(GET_VALUE_INFO, &request).into_result()? {
            IoctlResponse::Info(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }
}

/// Rejected locally, same as the dispatcher would
fn check_key(key: &[u8]) -> DictResult<()> {
    if key.is_empty() {
        return Err(DictError::invalid_argument("empty key"));
    }
    Ok(())
}

fn unexpected(response: IoctlResponse) -> DictError {
    DictError::invalid_argument(format!("unexpected response {:?}", response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StoreConfig;
    use crate::core::types::ValueType;
    use crate::store::DictStore;
    use pretty_assertions::assert_eq;

    fn client() -> DictClient {
        let store = DictStore::create(StoreConfig::default()).unwrap();
        DictClient::new(IoctlDispatcher::new(store))
    }

    #[test]
    fn test_round_trip_leaves_no_mappings() {
        let c = client();
        let char_tag = ValueType::Char.tag();
        assert_eq!(
            c.set(b"name", char_tag, b"kernel", char_tag).unwrap(),
            SetOutcome::Inserted
        );
        assert_eq!(
            c.get(b"name", char_tag).unwrap(),
            Value {
                bytes: b"kernel".to_vec(),
                value_type: char_tag
            }
        );
        assert_eq!(c.space().mapped_regions(), 0);
    }

    #[test]
    fn test_missing_key() {
        let c = client();
        assert!(matches!(c.get(b"nope", 2), Err(DictError::NotFound(_))));
        assert!(matches!(c.get_size(b"nope", 2), Err(DictError::NotFound(_))));
        assert_eq!(c.delete(b"nope", 2).unwrap(), false);
        assert_eq!(c.space().mapped_regions(), 0);
    }

    #[test]
    fn test_empty_key_rejected() {
        let c = client();
        assert!(matches!(
            c.set(b"", 2, b"v", 2),
            Err(DictError::InvalidArgument(_))
        ));
    }
}
