//! Transport-neutral message content for a delivery attempt.

use serde::Serialize;

use nb_protocol::{Reminder, ReminderId};

/// Escalation level of a delivery, derived from the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Reminder,
    Urgent,
    Final,
}

impl Urgency {
    pub fn for_attempt(attempt: u8) -> Self {
        match attempt {
            0 => Urgency::Normal,
            1 => Urgency::Reminder,
            2 => Urgency::Urgent,
            _ => Urgency::Final,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Urgency::Normal => "⏰",
            Urgency::Reminder => "🔔 Promemoria:",
            Urgency::Urgent => "⚠️ Non dimenticare:",
            Urgency::Final => "🚨 Ultimo avviso:",
        }
    }
}

/// What a transport should show the user: text plus action payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub reminder_id: ReminderId,
    pub owner_id: String,
    pub urgency: Urgency,
    pub text: String,
    /// Button payloads understood by the command dispatcher.
    pub actions: Vec<String>,
}

impl Message {
    pub fn for_delivery(reminder: &Reminder, attempt: u8) -> Self {
        let urgency = Urgency::for_attempt(attempt);
        Self {
            reminder_id: reminder.id,
            owner_id: reminder.owner_id.clone(),
            urgency,
            text: format!("{} {}", urgency.prefix(), reminder.title),
            actions: action_payloads(reminder.id),
        }
    }
}

/// Button payloads offered with every delivery.
pub fn action_payloads(id: ReminderId) -> Vec<String> {
    ["done", "snooze30", "snooze60", "tomorrow", "skip", "cancel"]
        .iter()
        .map(|action| format!("{action}:{id}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn urgency_escalates_with_attempt() {
        assert_eq!(Urgency::for_attempt(0), Urgency::Normal);
        assert_eq!(Urgency::for_attempt(1), Urgency::Reminder);
        assert_eq!(Urgency::for_attempt(2), Urgency::Urgent);
        assert_eq!(Urgency::for_attempt(7), Urgency::Final);
        assert!(Urgency::for_attempt(2) > Urgency::for_attempt(1));
    }

    #[test]
    fn message_carries_payloads() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let r = Reminder::new("u1", "latte", now, chrono_tz::Europe::Rome, now);
        let msg = Message::for_delivery(&r, 1);
        assert_eq!(msg.text, "🔔 Promemoria: latte");
        assert_eq!(msg.actions.len(), 6);
        assert_eq!(msg.actions[0], format!("done:{}", r.id));
    }
}
