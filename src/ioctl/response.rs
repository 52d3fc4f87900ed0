/*!
 * Command Results
 * Status plus command-specific payload returned to the caller
 */

use crate::core::errors::{DictError, DictResult, Status};
use crate::core::types::Tag;
use crate::store::{SetOutcome, ValueInfo};
use serde::{Deserialize, Serialize};

/// Successful outcome of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IoctlResponse {
    /// SET stored the pair
    Stored { outcome: SetOutcome },
    /// GET copied `value_size` bytes into the caller buffer
    Value { value_size: usize, value_type: Tag },
    /// GET_SIZE
    ValueSize { value_size: usize },
    /// GET_TYPE
    ValueType { value_type: Tag },
    /// GET_INFO
    Info(ValueInfo),
    /// DEL; `removed` is false when the key was not present
    Deleted { removed: bool },
}

/// Result of one boundary crossing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum IoctlResult {
    Ok { response: IoctlResponse },
    Error { error: DictError },
}

impl IoctlResult {
    #[inline]
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Ok { .. } => Status::Ok,
            Self::Error { error } => error.status(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn response(&self) -> Option<&IoctlResponse> {
        match self {
            Self::Ok { response } => Some(response),
            Self::Error { .. } => None,
        }
    }

    /// Scalar an `ioctl(2)` call would return: the size or type for the
    /// introspection commands, 0 for other successes, `-errno` on failure
    pub fn return_value(&self) -> i64 {
        match self {
            Self::Ok {
                response: IoctlResponse::ValueSize { value_size },
            } => *value_size as i64,
            Self::Ok {
                response: IoctlResponse::ValueType { value_type },
            } => i64::from(*value_type),
            Self::Ok { .. } => 0,
            Self::Error { error } => -i64::from(error.status().code()),
        }
    }

    pub fn into_result(self) -> DictResult<IoctlResponse> {
        match self {
            Self::Ok { response } => Ok(response),
            Self::Error { error } => Err(error),
        }
    }
}

impl From<DictResult<IoctlResponse>> for IoctlResult {
    fn from(result: DictResult<IoctlResponse>) -> Self {
        match result {
            Ok(response) => Self::Ok { response },
            Err(error) => Self::Error { error },
        }
    }
}
