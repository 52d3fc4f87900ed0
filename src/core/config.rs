/*!
 * Store and Server Configuration
 *
 * Defaults come from `core::limits`; every field can be overridden through
 * `KDICT_*` environment variables.
 */

use super::errors::ConfigError;
use super::limits::*;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;

/// Geometry and resource bounds of a dictionary store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bucket count at creation (default: 64)
    pub initial_size: usize,

    /// Bucket count multiplier applied on growth (default: 2)
    pub growth_multiplier: usize,

    /// Entries per bucket that may be exceeded before growing (default: 1)
    pub density_threshold: usize,

    /// Largest key accepted by the dispatcher
    pub max_key_size: usize,

    /// Largest value accepted by the dispatcher
    pub max_value_size: usize,

    /// Budget for stored key and value bytes, unbounded when `None`
    pub memory_limit: Option<usize>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            initial_size: INITIAL_TABLE_SIZE,
            growth_multiplier: GROWTH_MULTIPLIER,
            density_threshold: DENSITY_THRESHOLD,
            max_key_size: MAX_KEY_SIZE,
            max_value_size: MAX_VALUE_SIZE,
            memory_limit: None,
        }
    }

    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    pub fn with_growth_multiplier(mut self, multiplier: usize) -> Self {
        self.growth_multiplier = multiplier;
        self
    }

    pub fn with_density_threshold(mut self, threshold: usize) -> Self {
        self.density_threshold = threshold;
        self
    }

    pub fn with_max_key_size(mut self, max: usize) -> Self {
        self.max_key_size = max;
        self
    }

    pub fn with_max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = max;
        self
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = Some(limit);
        self
    }

    /// Load configuration from `KDICT_*` environment variables
    ///
    /// - KDICT_INITIAL_SIZE
    /// - KDICT_GROWTH_MULTIPLIER
    /// - KDICT_DENSITY_THRESHOLD
    /// - KDICT_MAX_KEY_SIZE
    /// - KDICT_MAX_VALUE_SIZE
    /// - KDICT_MEMORY_LIMIT
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();
        if let Some(v) = parse_var(&lookup, "KDICT_INITIAL_SIZE")? {
            config.initial_size = v;
        }
        if let Some(v) = parse_var(&lookup, "KDICT_GROWTH_MULTIPLIER")? {
            config.growth_multiplier = v;
        }
        if let Some(v) = parse_var(&lookup, "KDICT_DENSITY_THRESHOLD")? {
            config.density_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "KDICT_MAX_KEY_SIZE")? {
            config.max_key_size = v;
        }
        if let Some(v) = parse_var(&lookup, "KDICT_MAX_VALUE_SIZE")? {
            config.max_value_size = v;
        }
        config.memory_limit = parse_var(&lookup, "KDICT_MEMORY_LIMIT")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject geometries the growth policy cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_size == 0 {
            return Err(ConfigError::invalid("initial_size", "must be positive"));
        }
        if self.growth_multiplier < 2 {
            return Err(ConfigError::invalid(
                "growth_multiplier",
                "must be at least 2",
            ));
        }
        if self.density_threshold == 0 {
            return Err(ConfigError::invalid("density_threshold", "must be positive"));
        }
        if self.max_key_size == 0 || self.max_value_size == 0 {
            return Err(ConfigError::invalid(
                "max_key_size/max_value_size",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Network front end configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_frame_size: usize,
}

impl ServerConfig {
    /// Load from KDICT_LISTEN_ADDR and KDICT_MAX_FRAME
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = parse_var(&lookup, "KDICT_LISTEN_ADDR")? {
            config.listen_addr = addr;
        }
        if let Some(max) = parse_var(&lookup, "KDICT_MAX_FRAME")? {
            config.max_frame_size = max;
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_LISTEN_PORT)),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e.to_string())),
    }
}
