//! Reminder delivery.
//!
//! The scheduler only sees the [`Notifier`] trait. [`LogNotifier`] writes deliveries
//! to the tracing log; [`MockNotifier`] records them for tests and can be scripted
//! to fail or stall.

pub mod error;
pub mod message;
pub mod mock;
pub mod notifier;

pub use error::{NotifyError, NotifyResult};
pub use message::{Message, Urgency};
pub use mock::{Delivery, MockNotifier};
pub use notifier::{LogNotifier, Notifier};
