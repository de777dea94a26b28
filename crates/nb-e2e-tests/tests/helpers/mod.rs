//! Shared test harness for E2E integration tests.
//!
//! Wires the real parser, scheduler and dispatcher to an in-memory store, a
//! manual clock and a recording notifier.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Europe::Rome;
use chrono_tz::Tz;

use nb_notify::MockNotifier;
use nb_parser::{IntentParser, ParseFailure};
use nb_protocol::{InboundEvent, LoggedAction, ParsedReminder, Reminder, ReminderId};
use nb_scheduler::{
    CommandDispatcher, DispatchError, DispatchOutcome, EscalationScheduler, ManualClock,
    NudgeConfig, SchedulerConfig, TickReport,
};
use nb_store::{MemoryStore, ReminderStore};

pub const OWNER: &str = "user-1";

/// Local Rome time as UTC.
pub fn rome(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Rome.with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Friday 1 March 2024, 08:00 in Rome.
pub fn start() -> DateTime<Utc> {
    rome(2024, 3, 1, 8, 0)
}

pub struct TestHarness {
    pub clock: Arc<ManualClock>,
    pub store: MemoryStore,
    pub notifier: Arc<MockNotifier>,
    pub scheduler: Arc<EscalationScheduler>,
    pub dispatcher: CommandDispatcher,
    pub parser: IntentParser,
    pub timezone: Tz,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let store = MemoryStore::new();
        Self::build(clock, store, Arc::new(MockNotifier::new()), config)
    }

    /// A second scheduler process over the same store and notifier.
    pub fn sibling(&self) -> Self {
        Self::build(
            self.clock.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.scheduler.config().clone(),
        )
    }

    fn build(
        clock: Arc<ManualClock>,
        store: MemoryStore,
        notifier: Arc<MockNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        let scheduler = Arc::new(
            EscalationScheduler::new(
                clock.clone(),
                Arc::new(store.clone()),
                notifier.clone(),
                config,
                NudgeConfig::default(),
            )
            .unwrap(),
        );
        Self {
            clock,
            store,
            notifier,
            dispatcher: CommandDispatcher::new(scheduler.clone()),
            scheduler,
            parser: IntentParser::default(),
            timezone: Rome,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn parse(&self, text: &str) -> Result<ParsedReminder, ParseFailure> {
        self.parser.parse(text, self.now(), self.timezone)
    }

    /// Parse `text` and schedule it for [`OWNER`]; expects a single confident slot.
    pub async fn remind(&self, text: &str) -> Reminder {
        let parsed = self.parse(text).unwrap();
        let mut created = self.scheduler.create(&parsed, OWNER, false).await.unwrap();
        assert_eq!(created.len(), 1, "{text}");
        created.remove(0)
    }

    pub async fn tick(&self) -> TickReport {
        self.scheduler.tick().await.unwrap()
    }

    pub async fn advance_and_tick(&self, by: Duration) -> TickReport {
        self.clock.advance(by);
        self.tick().await
    }

    /// Move the clock to `at` and tick.
    pub async fn tick_at(&self, at: DateTime<Utc>) -> TickReport {
        self.clock.set(at);
        self.tick().await
    }

    pub async fn text(&self, text: &str) -> Result<DispatchOutcome, DispatchError> {
        self.dispatcher
            .dispatch(&InboundEvent::text(OWNER, text))
            .await
    }

    pub async fn press(&self, action: &str, id: ReminderId) -> Result<DispatchOutcome, DispatchError> {
        self.dispatcher
            .dispatch(&InboundEvent::button(OWNER, format!("{action}:{id}")))
            .await
    }

    pub async fn reminder(&self, id: ReminderId) -> Reminder {
        self.store.get(id).await.unwrap()
    }

    /// Attempts delivered for `id`, in order.
    pub fn attempts(&self, id: ReminderId) -> Vec<u8> {
        self.notifier
            .deliveries_for(id)
            .iter()
            .map(|d| d.attempt)
            .collect()
    }

    pub async fn logged(&self) -> Vec<LoggedAction> {
        self.store
            .list_actions(OWNER, start() - Duration::days(1))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.action)
            .collect()
    }
}
