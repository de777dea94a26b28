//! Durable reminder storage.
//!
//! [`ReminderStore`] is the narrow contract the scheduler consumes. Two backends:
//! - [`MemoryStore`]: `RwLock<HashMap>` (tests and development).
//! - [`PgStore`]: PostgreSQL via `sqlx` (production).

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::ReminderStore;
