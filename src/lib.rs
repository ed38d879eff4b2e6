//! Expiring Store - A bounded, expiring in-memory key-value store
//!
//! Provides size-bounded LRU/FIFO eviction, per-entry and default TTLs, a
//! chunked background sweeper, and merge/patch operations on structured values.
//!
//! ```
//! use expiring_store::{EvictionStrategy, Store, StoreConfig};
//!
//! let config = StoreConfig::default()
//!     .with_max_size(2)
//!     .with_eviction_strategy(EvictionStrategy::Lru);
//! let mut store = Store::new(config).unwrap();
//!
//! store.set("a".to_string(), 1);
//! store.set("b".to_string(), 2);
//! store.get("a");
//! store.set("c".to_string(), 3);
//!
//! assert!(store.has("a"));
//! assert!(!store.has("b"));
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod shared;
pub mod tasks;

pub use cache::{Clock, MockClock, Store, StoreStats, Structured, SystemClock, ValuePath};
pub use config::{EvictionStrategy, StoreConfig};
pub use error::{Result, StoreError};
pub use shared::SharedStore;
pub use tasks::spawn_sweeper;
