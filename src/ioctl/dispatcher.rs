/*!
 * Command Dispatcher
 *
 * Validated entry point between callers and the store. A crossing decodes
 * the command code, copies the fixed-size request record in, validates it,
 * copies payloads across the boundary exactly once per direction and runs
 * the store operation with the guard held.
 *
 * Validation never touches the store: argument errors are reported before
 * the guard is taken.
 */

use super::command::Command;
use super::request::{IoctlRequest, UserPtr};
use super::response::{IoctlResponse, IoctlResult};
use super::user::UserSpace;
use crate::core::errors::{DictError, DictResult};
use crate::monitoring::RequestSpan;
use crate::store::SharedStore;
use tracing::{debug, info, warn};

/// Routes boundary crossings to the shared store
#[derive(Clone)]
pub struct IoctlDispatcher {
    store: SharedStore,
}

impl IoctlDispatcher {
    pub fn new(store: SharedStore) -> Self {
        info!("ioctl dispatcher initialized");
        Self { store }
    }

    #[inline]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Handle one raw crossing: `cmd` is the encoded command, `arg` the
    /// caller address of the request record
    pub fn ioctl(&self, space: &dyn UserSpace, cmd: u32, arg: UserPtr) -> IoctlResult {
        let command = match Command::try_from(cmd) {
            Ok(command) => command,
            Err(error) => {
                debug!(cmd = format_args!("{:#010x}", cmd), "unknown command");
                return IoctlResult::Error { error };
            }
        };

        let span = RequestSpan::new(command.name());
        let _guard = span.enter();

        let result: IoctlResult = read_record(space, arg)
            .and_then(|request| self.dispatch(space, command, &request))
            .into();

        span.record_status(result.status());
        match &result {
            IoctlResult::Error { error } => log_failure(command, error),
            IoctlResult::Ok { .. } if command.mutates() => {
                debug!(command = command.name(), entries = self.store.len(), "table updated");
            }
            IoctlResult::Ok { .. } => {}
        }
        result
    }

    /// Run an already decoded request
    pub fn dispatch(
        &self,
        space: &dyn UserSpace,
        command: Command,
        request: &IoctlRequest,
    ) -> DictResult<IoctlResponse> {
        match command {
            Command::Set => self.set(space, request),
            Command::Get => self.get(space, request),
            Command::GetSize => self
                .lookup(space, request)
                .map(|info| IoctlResponse::ValueSize {
                    value_size: info.value_size,
                }),
            Command::GetType => self
                .lookup(space, request)
                .map(|info| IoctlResponse::ValueType {
                    value_type: info.value_type,
                }),
            Command::GetInfo => self.lookup(space, request).map(IoctlResponse::Info),
            Command::Delete => self.delete(space, request),
        }
    }

    fn set(&self, space: &dyn UserSpace, request: &IoctlRequest) -> DictResult<IoctlResponse> {
        request.validate_set(self.store.config())?;

        let key = copy_in(space, request.key, request.key_size)?;
        let value = copy_in(space, request.value, request.value_size)?;
        let outcome =
            self.store
                .set_owned(key, request.key_type, value, request.value_type)?;

        Ok(IoctlResponse::Stored { outcome })
    }

    /// Transfer phase of GET
    ///
    /// The buffer must hold the whole value. A non-zero token must match the
    /// generation reported by GET_INFO, otherwise the value changed in
    /// between and the caller sees NotFound instead of a short copy.
    fn get(&self, space: &dyn UserSpace, request: &IoctlRequest) -> DictResult<IoctlResponse> {
        let config = self.store.config();
        request.validate_key(config)?;
        request.validate_value_buffer(config)?;

        let key = copy_in(space, request.key, request.key_size)?;

        self.store.with(|table| {
            let entry = table
                .get(&key)
                .ok_or_else(|| DictError::not_found("no such key"))?;

            if request.token != 0 && request.token != entry.generation() {
                return Err(DictError::not_found(format!(
                    "value replaced since token {}",
                    request.token
                )));
            }
            if request.value_size < entry.value_size() {
                return Err(DictError::invalid_argument(format!(
                    "buffer of {} bytes cannot hold {} byte value",
                    request.value_size,
                    entry.value_size()
                )));
            }

            space.copy_to_user(request.value, entry.value())?;
            Ok(IoctlResponse::Value {
                value_size: entry.value_size(),
                value_type: entry.value_type(),
            })
        })
    }

    fn lookup(
        &self,
        space: &dyn UserSpace,
        request: &IoctlRequest,
    ) -> DictResult<crate::store::ValueInfo> {
        request.validate_key(self.store.config())?;
        let key = copy_in(space, request.key, request.key_size)?;
        self.store.value_info(&key)
    }

    fn delete(&self, space: &dyn UserSpace, request: &IoctlRequest) -> DictResult<IoctlResponse> {
        request.validate_key(self.store.config())?;
        let key = copy_in(space, request.key, request.key_size)?;
        let removed = self.store.delete(&key);
        if !removed {
            debug!(key_size = request.key_size, "delete of absent key");
        }
        Ok(IoctlResponse::Deleted { removed })
    }
}

/// Copy the fixed-size request record from `arg`
fn read_record(space: &dyn UserSpace, arg: UserPtr) -> DictResult<IoctlRequest> {
    let mut record = [0u8; IoctlRequest::RECORD_SIZE];
    space.copy_from_user(arg, &mut record)?;
    IoctlRequest::decode(&record)
}

/// Copy `len` caller bytes into engine memory
fn copy_in(space: &dyn UserSpace, src: UserPtr, len: usize) -> DictResult<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    space.copy_from_user(src, &mut buf)?;
    Ok(buf.into_boxed_slice())
}

fn log_failure(command: Command, error: &DictError) {
    match error {
        DictError::InvalidArgument(reason) | DictError::NotFound(reason) => {
            debug!(command = command.name(), %reason, status = ?error.status(), "request rejected");
        }
        DictError::OutOfMemory(reason) | DictError::TransferFault(reason) => {
            warn!(command = command.name(), %reason, status = ?error.status(), "request failed");
        }
    }
}
