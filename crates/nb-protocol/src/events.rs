//! Inbound user events and the per-owner action log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reminder::ReminderId;

/// An event arriving from the transport layer on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub owner_id: String,
    pub kind: InboundKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundKind {
    /// Free text typed by the user.
    Text(String),
    /// Opaque button payload, e.g. `done:<id>`.
    Button(String),
}

impl InboundEvent {
    pub fn text(owner_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: InboundKind::Text(text.into()),
        }
    }

    pub fn button(owner_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: InboundKind::Button(data.into()),
        }
    }
}

/// What happened to a reminder, as recorded in the action log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggedAction {
    Done,
    Skipped,
    Snoozed,
    Cancelled,
    Expired,
}

impl LoggedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggedAction::Done => "done",
            LoggedAction::Skipped => "skipped",
            LoggedAction::Snoozed => "snoozed",
            LoggedAction::Cancelled => "cancelled",
            LoggedAction::Expired => "expired",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "done" => Some(LoggedAction::Done),
            "skipped" => Some(LoggedAction::Skipped),
            "snoozed" => Some(LoggedAction::Snoozed),
            "cancelled" => Some(LoggedAction::Cancelled),
            "expired" => Some(LoggedAction::Expired),
            _ => None,
        }
    }
}

/// One row of the action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub reminder_id: ReminderId,
    pub owner_id: String,
    pub action: LoggedAction,
    pub at: DateTime<Utc>,
}

impl ActionLogEntry {
    pub fn new(
        reminder_id: ReminderId,
        owner_id: impl Into<String>,
        action: LoggedAction,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            reminder_id,
            owner_id: owner_id.into(),
            action,
            at,
        }
    }
}
