//! Background Sweeper Task
//!
//! Reclaims expired entries that are never read again. Work is split into
//! chunks of at most `sweep_chunk_size` tracked keys; the store lock is released
//! and the task yields between chunks.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Store;

// == Sweep Signals ==
/// Wake-ups sent from the store to its sweeper.
#[derive(Debug, Default)]
pub struct SweepSignals {
    /// Tracking went from empty to non-empty
    pub(crate) ttl_armed: Notify,
    /// A read asked for an immediate pass
    pub(crate) sweep_now: Notify,
}

/// Spawns the sweeper for a shared store.
///
/// The task parks while nothing has an expiry, otherwise runs one pass per
/// `interval` (or sooner when a read triggers one). It exits once the store is
/// destroyed; aborting the returned handle stops it immediately.
pub fn spawn_sweeper<K, V>(
    store: Arc<Mutex<Store<K, V>>>,
    signals: Arc<SweepSignals>,
    interval: Duration,
    chunk_size: usize,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        store.lock().await.attach_sweeper();
        info!(
            interval_ms = interval.as_millis() as u64,
            chunk_size, "Starting background sweeper"
        );

        loop {
            let (tracked, destroyed) = {
                let guard = store.lock().await;
                (guard.tracked_len(), guard.is_destroyed())
            };
            if destroyed {
                break;
            }

            if tracked == 0 {
                info!("Sweeper parked: no tracked expiries");
                signals.ttl_armed.notified().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = signals.sweep_now.notified() => {
                    debug!("Passive sweep triggered by a read");
                }
            }

            match sweep_pass(&store, chunk_size).await {
                Some(removed) if removed > 0 => {
                    info!("Sweep: removed {} expired entries", removed);
                }
                Some(_) => debug!("Sweep: no expired entries found"),
                None => break,
            }
        }

        info!("Background sweeper stopped");
    })
}

/// Runs one full pass over the tracked keys, a chunk per scheduling turn.
///
/// Returns the number of entries removed, or None if the store was destroyed
/// mid-pass.
pub async fn sweep_pass<K, V>(store: &Mutex<Store<K, V>>, chunk_size: usize) -> Option<usize>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    let chunk_size = chunk_size.max(1);
    let mut cursor: Option<K> = None;
    let mut removed = 0;

    loop {
        let chunk = {
            let mut guard = store.lock().await;
            if guard.is_destroyed() {
                return None;
            }
            guard.sweep_chunk(cursor.as_ref(), chunk_size)
        };
        removed += chunk.removed;

        if chunk.done {
            return Some(removed);
        }
        cursor = chunk.cursor;
        tokio::task::yield_now().await;
    }
}
