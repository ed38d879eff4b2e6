//! Configuration Module
//!
//! Construction-time options for a [`Store`](crate::cache::Store), loadable from
//! environment variables or any serde source.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Result, StoreError};

// == Eviction Strategy ==
/// Which entry is sacrificed when the store is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used (reads and writes both count as uses)
    #[default]
    Lru,
    /// Oldest insertion first, regardless of access
    Fifo,
}

impl FromStr for EvictionStrategy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "fifo" => Ok(Self::Fifo),
            other => Err(StoreError::Configuration(format!(
                "unknown eviction strategy '{}' (expected 'lru' or 'fifo')",
                other
            ))),
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => f.write_str("lru"),
            Self::Fifo => f.write_str("fifo"),
        }
    }
}

// == Store Config ==
/// Store configuration parameters.
///
/// Every field is optional when deserializing; missing fields take the defaults
/// listed on [`StoreConfig::default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entries, 0 = unbounded
    pub max_size: usize,
    /// Default TTL in milliseconds, 0 = entries never expire by default
    pub ttl_ms: u64,
    /// Eviction policy, fixed for the lifetime of the store
    pub eviction_strategy: EvictionStrategy,
    /// Period between background sweep passes
    pub sweep_interval_ms: u64,
    /// Maximum tracked keys examined per scheduling turn
    pub sweep_chunk_size: usize,
    /// Chance that a single `get` kicks off an immediate sweep pass
    pub passive_sweep_probability: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_size: 0,
            ttl_ms: 0,
            eviction_strategy: EvictionStrategy::Lru,
            sweep_interval_ms: 15_000,
            sweep_chunk_size: 100,
            passive_sweep_probability: 0.01,
        }
    }
}

impl StoreConfig {
    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STORE_MAX_SIZE` - Maximum entries (default: 0, unbounded)
    /// - `STORE_TTL_MS` - Default TTL in milliseconds (default: 0, none)
    /// - `STORE_EVICTION_STRATEGY` - `lru` or `fifo` (default: lru)
    /// - `STORE_SWEEP_INTERVAL_MS` - Sweep period (default: 15000)
    /// - `STORE_SWEEP_CHUNK_SIZE` - Keys per sweep turn (default: 100)
    /// - `STORE_PASSIVE_SWEEP_PROBABILITY` - Per-read sweep chance (default: 0.01)
    ///
    /// Unset variables fall back to their defaults. A variable that is set but
    /// does not parse is reported rather than ignored.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_size: env_or("STORE_MAX_SIZE", defaults.max_size)?,
            ttl_ms: env_or("STORE_TTL_MS", defaults.ttl_ms)?,
            eviction_strategy: env_or("STORE_EVICTION_STRATEGY", defaults.eviction_strategy)?,
            sweep_interval_ms: env_or("STORE_SWEEP_INTERVAL_MS", defaults.sweep_interval_ms)?,
            sweep_chunk_size: env_or("STORE_SWEEP_CHUNK_SIZE", defaults.sweep_chunk_size)?,
            passive_sweep_probability: env_or(
                "STORE_PASSIVE_SWEEP_PROBABILITY",
                defaults.passive_sweep_probability,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    // == Validate ==
    /// Checks the options for values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_ms == 0 {
            return Err(StoreError::Configuration(
                "sweep_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.sweep_chunk_size == 0 {
            return Err(StoreError::Configuration(
                "sweep_chunk_size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.passive_sweep_probability) {
            return Err(StoreError::Configuration(format!(
                "passive_sweep_probability must be within [0, 1], got {}",
                self.passive_sweep_probability
            )));
        }
        Ok(())
    }

    // == Builder Setters ==
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn with_eviction_strategy(mut self, strategy: EvictionStrategy) -> Self {
        self.eviction_strategy = strategy;
        self
    }

    pub fn with_sweep_interval_ms(mut self, interval_ms: u64) -> Self {
        self.sweep_interval_ms = interval_ms;
        self
    }

    pub fn with_sweep_chunk_size(mut self, chunk_size: usize) -> Self {
        self.sweep_chunk_size = chunk_size;
        self
    }

    pub fn with_passive_sweep_probability(mut self, probability: f64) -> Self {
        self.passive_sweep_probability = probability;
        self
    }
}

/// Reads and parses one variable, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            StoreError::Configuration(format!("{} has an invalid value: '{}'", name, raw))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(StoreError::Configuration(format!(
            "{} is not valid unicode",
            name
        ))),
    }
}
