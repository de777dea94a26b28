//! The delivery contract and a tracing-backed implementation.

use async_trait::async_trait;

use nb_protocol::Reminder;

use crate::error::NotifyResult;
use crate::message::Message;

/// Delivers a reminder to its owner.
///
/// `attempt` is 0 for the first delivery and k for the k-th follow-up nudge.
/// Implementations must not retry internally; the scheduler owns retry policy.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, reminder: &Reminder, attempt: u8) -> NotifyResult<()>;
}

/// Writes each delivery to the log. Used by the console binary.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, reminder: &Reminder, attempt: u8) -> NotifyResult<()> {
        let message = Message::for_delivery(reminder, attempt);
        tracing::info!(
            reminder_id = %message.reminder_id,
            owner_id = %message.owner_id,
            attempt,
            urgency = ?message.urgency,
            actions = ?message.actions,
            "{}",
            message.text
        );
        Ok(())
    }
}
