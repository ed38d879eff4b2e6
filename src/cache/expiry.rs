//! Expiration Tracker Module
//!
//! Maps keys to absolute expiry instants, kept apart from the value table.
//! A key with no tracked instant never expires.

use std::borrow::Borrow;
use std::hash::Hash;

use crate::cache::LinkedMap;
use crate::error::{Result, StoreError};

// == Expiration Tracker ==
/// Tracks absolute expiry instants (clock milliseconds) per key.
///
/// Keys are kept in the order their tracking started, which gives the
/// background sweeper a stable cursor to resume from.
#[derive(Debug, Clone)]
pub struct ExpirationTracker<K> {
    expiries: LinkedMap<K, u64>,
    /// Default TTL in milliseconds, 0 = none
    default_ttl_ms: u64,
}

impl<K> ExpirationTracker<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new(default_ttl_ms: u64) -> Self {
        Self {
            expiries: LinkedMap::new(),
            default_ttl_ms,
        }
    }

    /// Turns off default TTL assignment from now on.
    pub fn disable_default_ttl(&mut self) {
        self.default_ttl_ms = 0;
    }

    // == Set Expiry ==
    /// Records `now + ttl_ms` as the key's expiry.
    ///
    /// A TTL of 0 drops any explicit expiry, leaving the key to the default
    /// policy. Negative TTLs are rejected without touching existing state.
    pub fn set_expiry(&mut self, key: K, ttl_ms: i64, now: u64) -> Result<()> {
        if ttl_ms < 0 {
            return Err(StoreError::InvalidTtl(ttl_ms));
        }
        if ttl_ms == 0 {
            self.expiries.remove(&key);
            return Ok(());
        }
        self.expiries
            .insert(key, now.saturating_add(ttl_ms as u64));
        Ok(())
    }

    // == Assign Default ==
    /// Gives an untracked key the default expiry, if a default is configured.
    ///
    /// Returns true when an expiry was assigned.
    pub fn assign_default(&mut self, key: &K, now: u64) -> bool {
        if self.default_ttl_ms == 0 || self.expiries.contains_key(key) {
            return false;
        }
        self.expiries
            .insert(key.clone(), now.saturating_add(self.default_ttl_ms));
        true
    }

    // == Is Expired ==
    /// Returns true iff the key has an expiry and `now >= expiry`.
    ///
    /// Must only be called for keys present in the value table: an untracked
    /// key is backfilled with the default expiry (and reported live), so that
    /// entries written before a default existed converge to the same policy.
    pub fn is_expired(&mut self, key: &K, now: u64) -> bool {
        match self.expiries.get(key) {
            Some(&expires_at) => now >= expires_at,
            None => {
                self.assign_default(key, now);
                false
            }
        }
    }

    /// Expiry check without backfill, for keys that may be absent from the table.
    pub fn is_past<Q>(&self, key: &Q, now: u64) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expiries
            .get(key)
            .is_some_and(|&expires_at| now >= expires_at)
    }

    pub fn expires_at<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expiries.get(key).copied()
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, `Some(0)` once expired, None if untracked.
    pub fn remaining_ms<Q>(&self, key: &Q, now: u64) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expires_at(key)
            .map(|expires_at| expires_at.saturating_sub(now))
    }

    // == Clear ==
    pub fn clear_key<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expiries.remove(key).is_some()
    }

    pub fn clear_all(&mut self) {
        self.expiries.clear();
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    // == Scan Cursor ==
    /// First tracked key in scan order.
    pub fn first_key(&self) -> Option<&K> {
        self.expiries.front().map(|(key, _)| key)
    }

    /// Tracked key following `key` in scan order.
    pub fn next_key(&self, key: &K) -> Option<&K> {
        self.expiries.next_key(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.expiries.contains_key(key)
    }
}
