//! Shared Store Module
//!
//! A [`Store`] behind one async lock, with its background sweeper attached.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::AbortHandle;
use tracing::info;

use crate::cache::Store;
use crate::tasks::spawn_sweeper;

// == Shared Store ==
/// Cloneable handle to a store shared between tasks.
///
/// Every access, the sweeper's deletions included, goes through the same
/// `tokio::sync::Mutex`. The eviction callback runs while that lock is held
/// and must not call back into the same handle.
pub struct SharedStore<K, V> {
    inner: Arc<Mutex<Store<K, V>>>,
    sweeper: Option<AbortHandle>,
    chunk_size: usize,
}

impl<K, V> Clone for SharedStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            sweeper: self.sweeper.clone(),
            chunk_size: self.chunk_size,
        }
    }
}

impl<K, V> SharedStore<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Wraps the store and starts its sweeper.
    ///
    /// Must be called from within a tokio runtime. A store that is already
    /// destroyed gets no sweeper.
    pub fn new(mut store: Store<K, V>) -> Self {
        let interval = Duration::from_millis(store.config().sweep_interval_ms);
        let chunk_size = store.config().sweep_chunk_size;
        let signals = store.signals();
        let destroyed = store.is_destroyed();
        if !destroyed {
            store.attach_sweeper();
        }

        let inner = Arc::new(Mutex::new(store));
        let sweeper = (!destroyed).then(|| {
            spawn_sweeper(Arc::clone(&inner), signals, interval, chunk_size).abort_handle()
        });

        Self {
            inner,
            sweeper,
            chunk_size,
        }
    }

    /// Exclusive access to the store for the lifetime of the guard.
    pub async fn lock(&self) -> MutexGuard<'_, Store<K, V>> {
        self.inner.lock().await
    }

    /// Whether the background sweeper task is still alive.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Destroy ==
    /// Cancels the sweeper and destroys the store. Safe to call repeatedly and
    /// from any clone of the handle.
    pub async fn destroy(&self) {
        if let Some(handle) = &self.sweeper {
            handle.abort();
        }
        self.inner.lock().await.destroy();
        info!("Shared store destroyed");
    }

    // == Async Iteration ==
    /// Streams live `(key, value)` copies in table order.
    ///
    /// Keys are snapshotted when the stream is first polled; each entry is then
    /// re-checked under the lock, so expired entries are deleted and skipped
    /// and entries removed meanwhile are simply not yielded. The stream yields
    /// to the scheduler every `sweep_chunk_size` keys.
    pub fn entries(&self) -> impl Stream<Item = (K, V)> + Send + 'static {
        let store = Arc::clone(&self.inner);
        let yield_every = self.chunk_size.max(1);

        stream::unfold(
            (store, None::<std::vec::IntoIter<K>>, 0usize),
            move |(store, keys, visited)| async move {
                let mut keys = match keys {
                    Some(keys) => keys,
                    None => store.lock().await.key_snapshot().into_iter(),
                };
                let mut visited = visited;

                loop {
                    let key = keys.next()?;
                    visited += 1;
                    if visited % yield_every == 0 {
                        tokio::task::yield_now().await;
                    }

                    let value = store.lock().await.peek(&key);
                    if let Some(value) = value {
                        return Some(((key, value), (store, Some(keys), visited)));
                    }
                }
            },
        )
    }
}
