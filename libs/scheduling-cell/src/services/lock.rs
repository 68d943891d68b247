// libs/scheduling-cell/src/services/lock.rs
//
// Per-practitioner exclusive lock held across every check-then-write sequence,
// so two concurrent requests for the same practitioner cannot both pass the
// conflict check before either has inserted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct PractitionerLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

pub type PractitionerGuard = OwnedMutexGuard<()>;

impl PractitionerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, practitioner_id: Uuid) -> PractitionerGuard {
        let lock = {
            // The map mutex is only held to look up the entry, never across an await.
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // An entry only the map still references has no holder and no waiter.
            locks.retain(|id, lock| *id == practitioner_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(practitioner_id).or_default())
        };

        debug!("Waiting for scheduling lock on practitioner {}", practitioner_id);
        lock.lock_owned().await
    }

    /// Number of practitioners currently holding a map entry.
    pub fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
