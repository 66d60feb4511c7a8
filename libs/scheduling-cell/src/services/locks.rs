// libs/scheduling-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Per-room scheduling locks. Holding a room's guard serialises the
/// capacity check and the session write for that room.
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, room_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(room_id).or_default().clone()
        };

        let guard = lock.lock_owned().await;
        debug!("Scheduling lock acquired for room {}", room_id);
        guard
    }

    /// Forgets the lock of a deleted room.
    pub fn forget(&self, room_id: Uuid) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.remove(&room_id);
    }
}
