/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::InlineString;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status codes returned across the boundary
///
/// Numbering follows the errno values the character-device driver returned,
/// so callers that used to inspect `ioctl` return codes see the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    NotFound = 2,
    OutOfMemory = 12,
    TransferFault = 14,
    InvalidArgument = 22,
}

impl Status {
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Dictionary operation errors with rich context
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DictError {
    /// Malformed request: null reference, zero size, negative tag, unknown command
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(dict::invalid_argument),
        help("Keys and values must be non-null with non-zero size; type tags must be non-negative.")
    )]
    InvalidArgument(InlineString),

    /// Key is not present (or changed since the size/type lookup)
    #[error("Key not found: {0}")]
    #[diagnostic(code(dict::not_found))]
    NotFound(InlineString),

    /// Allocation failed or the configured memory budget is exhausted
    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(dict::out_of_memory),
        help("Delete unused keys or raise KDICT_MEMORY_LIMIT.")
    )]
    OutOfMemory(InlineString),

    /// Copying payload bytes across the boundary failed
    #[error("Transfer fault: {0}")]
    #[diagnostic(
        code(dict::transfer_fault),
        help("The caller buffer is not mapped for the full requested length.")
    )]
    TransferFault(InlineString),
}

impl DictError {
    #[inline]
    pub fn invalid_argument(msg: impl Into<InlineString>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn not_found(msg: impl Into<InlineString>) -> Self {
        Self::NotFound(msg.into())
    }

    #[inline]
    pub fn out_of_memory(msg: impl Into<InlineString>) -> Self {
        Self::OutOfMemory(msg.into())
    }

    #[inline]
    pub fn transfer_fault(msg: impl Into<InlineString>) -> Self {
        Self::TransferFault(msg.into())
    }

    /// Status code reported to the caller for this error
    #[inline]
    pub const fn status(&self) -> Status {
        match self {
            Self::InvalidArgument(_) => Status::InvalidArgument,
            Self::NotFound(_) => Status::NotFound,
            Self::OutOfMemory(_) => Status::OutOfMemory,
            Self::TransferFault(_) => Status::TransferFault,
        }
    }
}

impl From<std::collections::TryReserveError> for DictError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory(err.to_string().into())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue {
        key: &'static str,
        reason: InlineString,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<InlineString>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

pub type DictResult<T> = Result<T, DictError>;
