//! Mock notifier for testing without a transport.
//!
//! Records every delivery and can be scripted to fail or stall, so tests can
//! drive retry, timeout and isolation paths.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use nb_protocol::{Reminder, ReminderId};

use crate::error::{NotifyError, NotifyResult};
use crate::notifier::Notifier;

/// A recorded successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub reminder_id: ReminderId,
    pub owner_id: String,
    pub title: String,
    pub attempt: u8,
}

/// Mock implementation of the `Notifier` trait.
///
/// Thread-safe via `Mutex` (fine for test contexts).
pub struct MockNotifier {
    delivered: Mutex<Vec<Delivery>>,
    calls: Mutex<usize>,
    fail_next: Mutex<usize>,
    failing: Mutex<HashSet<ReminderId>>,
    delay: Mutex<Option<Duration>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
            fail_next: Mutex::new(0),
            failing: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
        }
    }

    /// All successful deliveries, in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered.lock().unwrap().clone()
    }

    /// Successful deliveries of one reminder.
    pub fn deliveries_for(&self, id: ReminderId) -> Vec<Delivery> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.reminder_id == id)
            .cloned()
            .collect()
    }

    pub fn last_delivered(&self) -> Option<Delivery> {
        self.delivered.lock().unwrap().last().cloned()
    }

    /// Every `deliver` call, including failed ones.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Fail the next `n` deliveries with `DeliveryFailed`.
    pub fn fail_next(&self, n: usize) {
        *self.fail_next.lock().unwrap() = n;
    }

    /// Always fail deliveries of `id`.
    pub fn fail_reminder(&self, id: ReminderId) {
        self.failing.lock().unwrap().insert(id);
    }

    /// Sleep this long inside every delivery (tokio time, so pausable).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Clear all recorded state and scripts.
    pub fn reset(&self) {
        self.delivered.lock().unwrap().clear();
        *self.calls.lock().unwrap() = 0;
        *self.fail_next.lock().unwrap() = 0;
        self.failing.lock().unwrap().clear();
        *self.delay.lock().unwrap() = None;
    }

    fn should_fail(&self, id: ReminderId) -> bool {
        if self.failing.lock().unwrap().contains(&id) {
            return true;
        }
        let mut remaining = self.fail_next.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        false
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn deliver(&self, reminder: &Reminder, attempt: u8) -> NotifyResult<()> {
        *self.calls.lock().unwrap() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(reminder.id) {
            return Err(NotifyError::DeliveryFailed(format!(
                "scripted failure for {}",
                reminder.id
            )));
        }

        self.delivered.lock().unwrap().push(Delivery {
            reminder_id: reminder.id,
            owner_id: reminder.owner_id.clone(),
            title: reminder.title.clone(),
            attempt,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reminder(title: &str) -> Reminder {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        Reminder::new("u1", title, now, chrono_tz::Europe::Rome, now)
    }

    #[tokio::test]
    async fn records_deliveries() {
        let mock = MockNotifier::new();
        let a = reminder("a");
        let b = reminder("b");
        mock.deliver(&a, 0).await.unwrap();
        mock.deliver(&b, 0).await.unwrap();
        mock.deliver(&a, 1).await.unwrap();

        assert_eq!(mock.deliveries().len(), 3);
        assert_eq!(mock.deliveries_for(a.id).len(), 2);
        assert_eq!(mock.last_delivered().unwrap().attempt, 1);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let mock = MockNotifier::new();
        let a = reminder("a");
        mock.fail_next(2);
        assert!(mock.deliver(&a, 0).await.is_err());
        assert!(mock.deliver(&a, 0).await.is_err());
        assert!(mock.deliver(&a, 0).await.is_ok());
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn failing_reminder_is_isolated() {
        let mock = MockNotifier::new();
        let bad = reminder("bad");
        let good = reminder("good");
        mock.fail_reminder(bad.id);
        assert!(matches!(
            mock.deliver(&bad, 0).await,
            Err(NotifyError::DeliveryFailed(_))
        ));
        assert!(mock.deliver(&good, 0).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_uses_tokio_time() {
        let mock = MockNotifier::new();
        mock.set_delay(Some(Duration::from_secs(30)));
        let started = tokio::time::Instant::now();
        mock.deliver(&reminder("slow"), 0).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let mock = MockNotifier::new();
        mock.fail_next(1);
        let _ = mock.deliver(&reminder("x"), 0).await;
        mock.reset();
        assert_eq!(mock.call_count(), 0);
        assert!(mock.deliver(&reminder("y"), 0).await.is_ok());
    }
}
