//! nudgebot service library.
//!
//! [`EscalationScheduler`] drives reminders through their lifecycle, and
//! [`CommandDispatcher`] turns user replies into lifecycle signals.
//! [`console`] is the stdin/stdout transport used by the binary.

pub mod clock;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod queue;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{NudgeConfig, NudgebotConfig, QuietHours, RetryConfig, SchedulerConfig};
pub use dispatcher::{Action, CommandDispatcher, DispatchOutcome, Target};
pub use error::{DispatchError, SchedulerError, SchedulerResult};
pub use lifecycle::{Signal, SignalOutcome};
pub use scheduler::{EscalationScheduler, Progress, TickReport};
