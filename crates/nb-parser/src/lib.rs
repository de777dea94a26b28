//! Natural-language reminder parsing.
//!
//! [`TimeResolver`] turns Italian date-time expressions into UTC instants against an
//! explicit reference time and zone. [`IntentParser`] splits a whole message into a
//! title and a temporal fragment and builds a [`ParsedReminder`] candidate.
//!
//! [`ParsedReminder`]: nb_protocol::ParsedReminder

pub mod category;
pub mod duration;
pub mod error;
pub mod grammar;
pub mod intent;
pub mod recurrence;
pub mod resolver;

pub use duration::parse_duration;
pub use error::{FailureReason, ParseFailure, ResolveError};
pub use intent::IntentParser;
pub use resolver::{ParserSettings, Resolution, TimeResolver};
