/*!
 * Command Numbers
 *
 * Laid out like Linux `_IOR`/`_IOWR` numbers: direction in bits 30-31,
 * request record size in bits 16-29, type byte in bits 8-15 and command byte
 * in bits 0-7.
 */

use super::request::IoctlRequest;
use crate::core::errors::DictError;
use serde::{Deserialize, Serialize};

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << 30) | ((size as u32 & 0x3fff) << 16) | ((ty as u32) << 8) | nr as u32
}

const fn iowr(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ | IOC_WRITE, ty, nr, IoctlRequest::RECORD_SIZE)
}

const fn ior(ty: u8, nr: u8) -> u32 {
    ioc(IOC_READ, ty, nr, IoctlRequest::RECORD_SIZE)
}

pub const SET_PAIR: u32 = iowr(b'a', b'a');
pub const DEL_PAIR: u32 = iowr(b'a', b'b');
pub const GET_VALUE: u32 = iowr(b'b', b'b');
pub const GET_VALUE_SIZE: u32 = ior(b'b', b'c');
pub const GET_VALUE_TYPE: u32 = ior(b'c', b'c');
pub const GET_VALUE_INFO: u32 = ior(b'c', b'd');

/// Operation selected by a command number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Set,
    Get,
    GetSize,
    GetType,
    GetInfo,
    Delete,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Set,
        Command::Get,
        Command::GetSize,
        Command::GetType,
        Command::GetInfo,
        Command::Delete,
    ];

    #[inline]
    pub const fn code(self) -> u32 {
        match self {
            Self::Set => SET_PAIR,
            Self::Get => GET_VALUE,
            Self::GetSize => GET_VALUE_SIZE,
            Self::GetType => GET_VALUE_TYPE,
            Self::GetInfo => GET_VALUE_INFO,
            Self::Delete => DEL_PAIR,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.code() == code)
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Set => "set_pair",
            Self::Get => "get_value",
            Self::GetSize => "get_value_size",
            Self::GetType => "get_value_type",
            Self::GetInfo => "get_value_info",
            Self::Delete => "del_pair",
        }
    }

    /// Whether the command may change table contents
    #[inline]
    pub const fn mutates(self) -> bool {
        matches!(self, Self::Set | Self::Delete)
    }
}

impl TryFrom<u32> for Command {
    type Error = DictError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
            .ok_or_else(|| DictError::invalid_argument(format!("unknown command 0x{:08x}", code)))
    }
}
