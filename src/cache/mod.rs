//! Cache Module
//!
//! Bounded key-value storage with TTL expiration and LRU/FIFO eviction.

mod clock;
mod eviction;
mod expiry;
mod linked_map;
mod merge;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, MockClock, SystemClock};
pub use eviction::EvictionPolicy;
pub use expiry::ExpirationTracker;
pub use linked_map::LinkedMap;
pub use merge::{PathSegment, Structured, ValuePath};
pub use stats::StoreStats;
pub use store::{EvictCallback, Iter, Lifecycle, Store, SweepChunk};
