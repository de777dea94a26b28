//! The reminder store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use nb_protocol::{ActionLogEntry, Reminder, ReminderId};

use crate::error::StoreResult;

/// Durable CRUD of reminders, consumed by the scheduler.
///
/// `update` is a compare-and-swap on [`Reminder::version`]: it fails with
/// `Conflict` when the stored copy changed since the caller read it, and
/// returns the stored copy (version bumped) on success.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Persist a new reminder.
    async fn create(&self, reminder: Reminder) -> StoreResult<ReminderId>;

    async fn get(&self, id: ReminderId) -> StoreResult<Reminder>;

    async fn update(&self, reminder: &Reminder) -> StoreResult<Reminder>;

    /// Non-terminal reminders whose next check is at or before `before`, soonest first.
    async fn list_due(&self, before: DateTime<Utc>) -> StoreResult<Vec<Reminder>>;

    /// Every reminder of `owner_id`, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Reminder>>;

    /// Append to the action log.
    async fn record_action(&self, entry: ActionLogEntry) -> StoreResult<()>;

    /// Action log of `owner_id` since `since`, oldest first.
    async fn list_actions(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ActionLogEntry>>;
}
