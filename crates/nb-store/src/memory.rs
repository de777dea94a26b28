//! In-memory store backed by `RwLock<HashMap>`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use nb_protocol::{ActionLogEntry, Reminder, ReminderId};

use crate::error::{StoreError, StoreResult};
use crate::store::ReminderStore;

/// Reminder store for tests and single-process development.
#[derive(Clone, Default)]
pub struct MemoryStore {
    reminders: Arc<RwLock<HashMap<ReminderId, Reminder>>>,
    actions: Arc<RwLock<Vec<ActionLogEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reminders.
    pub async fn len(&self) -> usize {
        self.reminders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reminders.read().await.is_empty()
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn create(&self, reminder: Reminder) -> StoreResult<ReminderId> {
        let mut map = self.reminders.write().await;
        let id = reminder.id;
        if map.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        map.insert(id, reminder);
        Ok(id)
    }

    async fn get(&self, id: ReminderId) -> StoreResult<Reminder> {
        self.reminders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, reminder: &Reminder) -> StoreResult<Reminder> {
        let mut map = self.reminders.write().await;
        let stored = map
            .get_mut(&reminder.id)
            .ok_or(StoreError::NotFound(reminder.id))?;
        if stored.version != reminder.version {
            return Err(StoreError::Conflict {
                id: reminder.id,
                expected: reminder.version,
                found: stored.version,
            });
        }
        let mut next = reminder.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn list_due(&self, before: DateTime<Utc>) -> StoreResult<Vec<Reminder>> {
        let map = self.reminders.read().await;
        let mut due: Vec<Reminder> = map
            .values()
            .filter(|r| !r.is_terminal() && r.next_check_at.is_some_and(|at| at <= before))
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.next_check_at, r.id));
        Ok(due)
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Reminder>> {
        let map = self.reminders.read().await;
        let mut owned: Vec<Reminder> = map
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|r| (r.created_at, r.id));
        Ok(owned)
    }

    async fn record_action(&self, entry: ActionLogEntry) -> StoreResult<()> {
        self.actions.write().await.push(entry);
        Ok(())
    }

    async fn list_actions(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ActionLogEntry>> {
        let actions = self.actions.read().await;
        Ok(actions
            .iter()
            .filter(|a| a.owner_id == owner_id && a.at >= since)
            .cloned()
            .collect())
    }
}
