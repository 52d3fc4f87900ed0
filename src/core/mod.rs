/*!
 * Core Module
 * Fundamental types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::{ServerConfig, StoreConfig};
pub use errors::{ConfigError, DictError, DictResult, Status};
pub use types::*;
