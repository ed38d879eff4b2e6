//! Store Module
//!
//! The bounded, expiring key-value store. Combines an insertion-ordered value
//! table with the expiration tracker and the eviction policy.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::cache::{
    Clock, EvictionPolicy, ExpirationTracker, LinkedMap, StoreStats, Structured, SystemClock,
    ValuePath,
};
use crate::config::{EvictionStrategy, StoreConfig};
use crate::error::{Result, StoreError};
use crate::tasks::SweepSignals;

/// Callback fired once per size-pressure eviction with the evicted pair.
pub type EvictCallback<K, V> = Box<dyn FnMut(&K, &V) -> anyhow::Result<()> + Send>;

// == Lifecycle ==
/// Coarse store state. There is no way back from `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    /// Still usable as a plain bounded map; default TTLs and sweeping are off
    Destroyed,
}

// == Sweep Chunk ==
/// Outcome of one bounded slice of a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepChunk<K> {
    /// Tracked keys looked at
    pub examined: usize,
    /// Expired entries deleted
    pub removed: usize,
    /// Last key this scan kept; the next slice starts right after it.
    /// None means start from the first tracked key.
    pub cursor: Option<K>,
    /// The scan reached the end of the tracked keys
    pub done: bool,
}

// == Store ==
/// Bounded key-value store with TTL expiration and LRU/FIFO eviction.
///
/// Not internally synchronized. Wrap it in a
/// [`SharedStore`](crate::shared::SharedStore) to share it between tasks and
/// get background sweeping.
pub struct Store<K, V> {
    /// Values in insertion order
    entries: LinkedMap<K, V>,
    expiry: ExpirationTracker<K>,
    eviction: EvictionPolicy<K>,
    stats: StoreStats,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    on_evict: Option<EvictCallback<K, V>>,
    signals: Arc<SweepSignals>,
    /// A background sweeper owns passive passes
    sweeper_attached: bool,
    /// Resume point of inline passive sweeps
    passive_cursor: Option<K>,
    lifecycle: Lifecycle,
}

impl<K, V> fmt::Debug for Store<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty store on the system clock.
    ///
    /// # Arguments
    /// * `config` - Size bound, default TTL, eviction strategy and sweep tuning
    ///
    /// Fails with [`StoreError::Configuration`] if the options are unusable.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: LinkedMap::new(),
            expiry: ExpirationTracker::new(config.ttl_ms),
            eviction: EvictionPolicy::new(config.eviction_strategy),
            stats: StoreStats::new(),
            config,
            clock: Arc::new(SystemClock::new()),
            on_evict: None,
            signals: Arc::new(SweepSignals::default()),
            sweeper_attached: false,
            passive_cursor: None,
            lifecycle: Lifecycle::Active,
        })
    }

    /// Replaces the time source. Meant to be called right after construction.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Installs the eviction callback.
    ///
    /// The callback runs synchronously inside the operation that caused the
    /// eviction, after the entry is gone. Errors and panics are logged and
    /// counted; they never undo the eviction.
    pub fn with_on_evict<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&K, &V) -> anyhow::Result<()> + Send + 'static,
    {
        self.on_evict = Some(Box::new(callback));
        self
    }

    // == Accessors ==
    /// Options the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Eviction strategy, fixed at construction.
    pub fn strategy(&self) -> EvictionStrategy {
        self.eviction.strategy()
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// True once [`destroy`](Self::destroy) has run.
    pub fn is_destroyed(&self) -> bool {
        self.lifecycle == Lifecycle::Destroyed
    }

    /// Wake-up channel for a sweeper spawned with [`spawn_sweeper`](crate::tasks::spawn_sweeper).
    pub fn signals(&self) -> Arc<SweepSignals> {
        Arc::clone(&self.signals)
    }

    /// Hands passive sweeps over to a background sweeper.
    pub(crate) fn attach_sweeper(&mut self) {
        self.sweeper_attached = true;
    }

    // == Get ==
    /// Returns a copy of the live value, touching it for LRU purposes.
    ///
    /// Expired entries are removed on the spot and reported as absent. With
    /// probability `passive_sweep_probability` the read also starts a sweep:
    /// an attached sweeper is woken for a full pass, otherwise one chunk of
    /// `sweep_chunk_size` tracked keys is swept inline before the lookup.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.maybe_trigger_sweep();

        if !self.check_live(key) {
            self.stats.record_miss();
            return None;
        }

        if let Some(stored) = self.entries.get_key(key) {
            self.eviction.touch(stored);
        }
        self.stats.record_hit();
        self.entries.get(key).cloned()
    }

    // == Peek ==
    /// Like [`get`](Self::get) but does not count as a use and records no stats.
    pub fn peek<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.check_live(key) {
            return None;
        }
        self.entries.get(key).cloned()
    }

    // == Set ==
    /// Inserts or updates a value.
    ///
    /// A new key arriving at a full store evicts one entry first. An update
    /// never evicts and keeps the entry's current expiry.
    pub fn set(&mut self, key: K, value: V) {
        self.write(key, value);
    }

    // == Set With TTL ==
    /// Inserts or updates a value with an explicit TTL overriding the default.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl_ms` - Lifetime in milliseconds from now
    ///
    /// A TTL of 0 drops any explicit expiry so the entry follows the default
    /// policy. Negative TTLs are rejected before anything changes.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl_ms: i64) -> Result<()> {
        if ttl_ms < 0 {
            return Err(StoreError::InvalidTtl(ttl_ms));
        }

        let was_untracked = self.expiry.is_empty();
        self.write(key.clone(), value);

        let now = self.clock.now_ms();
        self.expiry.set_expiry(key.clone(), ttl_ms, now)?;
        if ttl_ms == 0 && !self.is_destroyed() {
            self.expiry.assign_default(&key, now);
        }
        self.note_tracking(was_untracked);
        Ok(())
    }

    // == Has ==
    /// Whether a live entry exists. Does not count as a use.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.check_live(key)
    }

    // == Delete ==
    /// Removes the entry with its expiry and eviction record. Idempotent.
    ///
    /// Returns true if an entry was removed.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Drops every entry. Configuration, callback and sweeper survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear_all();
        self.eviction.clear();
        self.passive_cursor = None;
        self.stats.set_total_entries(0);
    }

    // == Add ==
    /// Inserts `patch` if the key is absent, otherwise merges it into the
    /// stored value (see [`Structured::merge`]).
    pub fn add(&mut self, key: K, patch: V)
    where
        V: Structured,
    {
        self.add_with(key, patch, |existing, patch| existing.merge(patch));
    }

    /// Like [`add`](Self::add) with a caller-supplied merge for opaque values.
    pub fn add_with<F>(&mut self, key: K, patch: V, merge: F)
    where
        F: FnOnce(&mut V, V),
    {
        if !self.check_live(&key) {
            self.write(key, patch);
            return;
        }

        if let Some(existing) = self.entries.get_mut(&key) {
            merge(existing, patch);
        }
        self.eviction.touch(&key);
    }

    // == Remove Paths ==
    /// Removes nested fields from a structured value.
    ///
    /// Works on a deep copy that replaces the stored value only once every path
    /// has been applied. Paths that address nothing are ignored. Returns the
    /// number of fields actually removed.
    pub fn remove_paths<Q, P>(&mut self, key: &Q, paths: &[P]) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
        P: AsRef<str>,
        V: Structured,
    {
        let parsed = paths
            .iter()
            .map(|raw| ValuePath::parse(raw.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if !self.check_live(key) {
            return Err(StoreError::KeyNotFound(format!("{:?}", key)));
        }
        let Some(current) = self.entries.get(key) else {
            return Err(StoreError::KeyNotFound(format!("{:?}", key)));
        };
        if !current.is_structured() {
            return Err(StoreError::NotStructured(format!("{:?}", key)));
        }

        let mut updated = current.clone();
        let removed = parsed
            .iter()
            .filter(|path| updated.remove_path(path))
            .count();

        if let Some(slot) = self.entries.get_mut(key) {
            *slot = updated;
        }
        if let Some(stored) = self.entries.get_key(key) {
            self.eviction.touch(stored);
        }
        Ok(removed)
    }

    // == Find ==
    /// First live entry, in table order, matching the predicate. The match is touched.
    pub fn find<F>(&mut self, mut predicate: F) -> Option<V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        for key in self.live_keys() {
            let Some(value) = self.entries.get(&key) else {
                continue;
            };
            if predicate(&key, value) {
                let found = value.clone();
                self.eviction.touch(&key);
                return Some(found);
            }
        }
        None
    }

    // == Filter ==
    /// Every live entry matching the predicate, in table order. Each match is touched.
    pub fn filter<F>(&mut self, mut predicate: F) -> Vec<V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut matches = Vec::new();
        for key in self.live_keys() {
            let Some(value) = self.entries.get(&key) else {
                continue;
            };
            if predicate(&key, value) {
                matches.push(value.clone());
                self.eviction.touch(&key);
            }
        }
        matches
    }

    // == Populate ==
    /// Batch [`set`](Self::set); every single-item rule still applies.
    pub fn populate<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.write(key, value);
        }
    }

    // == Iteration ==
    // == Iteration ==
    /// Iterates live `(key, value)` copies in table order.
    ///
    /// Expired entries met along the way are deleted and skipped. Iteration
    /// does not count as a use.
    pub fn iter(&mut self) -> Iter<'_, K, V> {
        let cursor = self.entries.front().map(|(key, _)| key.clone());
        Iter {
            store: self,
            cursor,
        }
    }

    /// Live keys in table order. Purges any expired entries first.
    pub fn keys(&mut self) -> Vec<K> {
        self.live_keys()
    }

    /// All keys currently in the table, without an expiry check.
    pub(crate) fn key_snapshot(&self) -> Vec<K> {
        self.entries.keys().cloned().collect()
    }

    // == Destroy ==
    /// Clears everything and permanently disables default TTLs and sweeping.
    ///
    /// Safe to call repeatedly. The store keeps working as a plain bounded map.
    pub fn destroy(&mut self) {
        if self.is_destroyed() {
            return;
        }
        self.lifecycle = Lifecycle::Destroyed;
        self.clear();
        self.expiry.disable_default_ttl();

        // Wake a parked or sleeping sweeper so it can observe the new state
        self.signals.ttl_armed.notify_one();
        self.signals.sweep_now.notify_one();
        info!("Store destroyed, sweeping disabled");
    }

    // == Sweeping ==
    /// Examines at most `limit` tracked keys and deletes the expired ones.
    ///
    /// Scanning starts right after `cursor`, the last key a previous slice
    /// kept, or at the first tracked key when `cursor` is None. If the cursor
    /// key has been removed since, the scan restarts from the first tracked
    /// key; every expired key before it is already gone, so nothing is skipped.
    pub fn sweep_chunk(&mut self, cursor: Option<&K>, limit: usize) -> SweepChunk<K> {
        let mut chunk = SweepChunk {
            examined: 0,
            removed: 0,
            cursor: None,
            done: true,
        };
        if self.is_destroyed() {
            return chunk;
        }

        let now = self.clock.now_ms();
        let mut kept = cursor.filter(|key| self.expiry.contains(key)).cloned();
        let mut next = match &kept {
            Some(key) => self.expiry.next_key(key).cloned(),
            None => self.expiry.first_key().cloned(),
        };

        while let Some(key) = next {
            if chunk.examined == limit {
                chunk.done = false;
                break;
            }
            chunk.examined += 1;
            next = self.expiry.next_key(&key).cloned();

            if !self.expiry.is_past(&key, now) {
                kept = Some(key);
            } else if self.remove_entry(&key).is_some() {
                self.stats.record_expiration();
                chunk.removed += 1;
            }
        }

        if !chunk.done {
            chunk.cursor = kept;
        }
        chunk
    }

    // == Sweep Expired ==
    /// Full synchronous sweep. Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        self.sweep_chunk(None, usize::MAX).removed
    }

    // == Introspection ==
    /// Remaining lifetime of a live entry; None if absent or never expiring.
    pub fn ttl_remaining_ms<Q>(&mut self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.check_live(key) {
            return None;
        }
        self.expiry.remaining_ms(key, self.clock.now_ms())
    }

    /// Number of keys with a tracked expiry.
    pub fn tracked_len(&self) -> usize {
        self.expiry.len()
    }

    /// Snapshot of the counters, with `total_entries` set to the current size.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of entries in the table, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds nothing, expired or not.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    /// Shared write path of `set`, `populate` and `add`.
    fn write(&mut self, key: K, value: V) {
        let exists = self.check_live(&key);
        if !exists {
            self.make_room();
        }

        let was_untracked = self.expiry.is_empty();
        if !self.is_destroyed() {
            self.expiry.assign_default(&key, self.clock.now_ms());
        }
        self.eviction.touch(&key);
        self.entries.insert(key, value);

        self.note_tracking(was_untracked);
        self.stats.set_total_entries(self.entries.len());
    }

    /// True if the key is present and unexpired; expired entries are removed.
    fn check_live<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let Some(stored) = self.entries.get_key(key) else {
            return false;
        };

        let was_untracked = self.expiry.is_empty();
        let expired = if self.is_destroyed() {
            self.expiry.is_past::<K>(stored, now)
        } else {
            self.expiry.is_expired(stored, now)
        };
        if !expired {
            self.note_tracking(was_untracked);
            return true;
        }

        self.remove_entry(key);
        self.stats.record_expiration();
        false
    }

    /// Canonical delete: table, expiry and eviction record go together.
    fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.remove_entry(key);
        self.expiry.clear_key(key);
        self.eviction.remove(key);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    /// Evicts until a new key fits under `max_size`.
    fn make_room(&mut self) {
        let max_size = self.config.max_size;
        if max_size == 0 {
            return;
        }

        while self.entries.len() >= max_size {
            let Some(victim) = self.eviction.evict_one(&self.entries) else {
                break;
            };
            if let Some((key, value)) = self.remove_entry(&victim) {
                self.stats.record_eviction();
                debug!(
                    strategy = %self.eviction.strategy(),
                    remaining = self.entries.len(),
                    "Evicted entry to make room"
                );
                self.notify_evicted(&key, &value);
            }
        }
    }

    fn notify_evicted(&mut self, key: &K, value: &V) {
        let Some(callback) = self.on_evict.as_mut() else {
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(key, value)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(error = %err, "Eviction callback failed");
                self.stats.record_callback_failure();
            }
            Err(_) => {
                warn!("Eviction callback panicked");
                self.stats.record_callback_failure();
            }
        }
    }

    /// Wakes a parked sweeper when tracking goes from nothing to something.
    fn note_tracking(&self, was_untracked: bool) {
        if was_untracked && !self.expiry.is_empty() {
            self.signals.ttl_armed.notify_one();
        }
    }

    /// Occasionally starts a sweep from a read.
    fn maybe_trigger_sweep(&mut self) {
        let probability = self.config.passive_sweep_probability;
        if self.is_destroyed() || probability <= 0.0 || self.expiry.is_empty() {
            return;
        }
        if !rand::thread_rng().gen_bool(probability) {
            return;
        }

        if self.sweeper_attached {
            self.signals.sweep_now.notify_one();
            return;
        }

        let cursor = self.passive_cursor.take();
        let chunk = self.sweep_chunk(cursor.as_ref(), self.config.sweep_chunk_size);
        if !chunk.done {
            self.passive_cursor = chunk.cursor;
        }
        debug!(
            examined = chunk.examined,
            removed = chunk.removed,
            "Inline passive sweep"
        );
    }

    fn live_keys(&mut self) -> Vec<K> {
        self.key_snapshot()
            .into_iter()
            .filter(|key| self.check_live(key))
            .collect()
    }
}

// == Iterator ==
/// Expiry-aware iterator returned by [`Store::iter`].
pub struct Iter<'a, K, V> {
    store: &'a mut Store<K, V>,
    /// Next key to visit
    cursor: Option<K>,
}

impl<K, V> Iterator for Iter<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.cursor.take()?;
            self.cursor = self.store.entries.next_key(&key).cloned();

            if self.store.check_live(&key) {
                if let Some(value) = self.store.entries.get(&key) {
                    return Some((key, value.clone()));
                }
            }
        }
    }
}
