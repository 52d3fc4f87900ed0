/*!
 * kdict Library
 * Binary-key/binary-value dictionary store behind a validated ioctl boundary
 */

pub mod client;
pub mod core;
pub mod ioctl;
pub mod monitoring;
pub mod server;
pub mod store;

// Re-exports
pub use client::{DictClient, Value};
pub use crate::core::{
    ConfigError, DictError, DictResult, InlineString, ServerConfig, Status, StoreConfig, Tag,
    ValueType,
};
pub use ioctl::{
    AddressSpace, Command, IoctlDispatcher, IoctlRequest, IoctlResponse, IoctlResult, UserPtr,
    UserSpace,
};
pub use monitoring::{init_tracing, RequestSpan};
pub use server::{handle_line, serve, WireRequest, WireResponse};
pub use store::{DictStore, SetOutcome, SharedStore, StoreStats, ValueInfo};
