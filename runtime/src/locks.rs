//! Per-key exclusive locks.
//!
//! Admission reads the current roster and then writes a new one, so two
//! requests for the same event must never interleave. Each key gets its own
//! async mutex; different keys never contend.
//!
//! Lock order is always event → participant. A participant lock is held only
//! for the duration of one read-modify-write of that participant record.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Slots beyond this count trigger a sweep of idle entries.
const SWEEP_THRESHOLD: usize = 1024;

/// Guard for one key; the lock is released on drop.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A lazily populated map of one mutex per key.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= SWEEP_THRESHOLD {
                Self::sweep(&mut slots);
            }
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Drops the slot for `key`.
    ///
    /// Holders and waiters of the old slot keep their `Arc` and finish normally;
    /// later callers get a fresh slot.
    pub async fn forget(&self, key: &K) {
        self.slots.lock().await.remove(key);
    }

    /// Number of keys currently tracked
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether no keys are tracked
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    // A slot whose only reference is the map itself has no holder and no
    // waiter, so dropping it cannot break mutual exclusion.
    fn sweep(slots: &mut HashMap<K, Arc<Mutex<()>>>) {
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}
