//! Per-reminder exclusive sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use nb_protocol::ReminderId;

/// One async mutex per reminder id, created on first use.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<ReminderId, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: ReminderId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(id).or_default())
    }

    /// Wait for exclusive access to `id`.
    #[cfg(test)]
    async fn lock(&self, id: ReminderId) -> OwnedMutexGuard<()> {
        self.slot(id).lock_owned().await
    }

    /// Exclusive access to `id` if nobody holds it right now.
    pub fn try_lock(&self, id: ReminderId) -> Option<OwnedMutexGuard<()>> {
        self.slot(id).try_lock_owned().ok()
    }

    /// Drop slots nobody holds.
    pub fn prune(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_is_refused() {
        let locks = KeyedLocks::new();
        let id = ReminderId::new();
        let guard = locks.lock(id).await;
        assert!(locks.try_lock(id).is_none());
        assert!(locks.try_lock(ReminderId::new()).is_some());
        drop(guard);
        assert!(locks.try_lock(id).is_some());
    }

    #[tokio::test]
    async fn prune_keeps_held_slots() {
        let locks = KeyedLocks::new();
        let held = ReminderId::new();
        let _guard = locks.lock(held).await;
        drop(locks.lock(ReminderId::new()).await);
        assert_eq!(locks.len(), 2);
        locks.prune();
        assert_eq!(locks.len(), 1);
    }
}
