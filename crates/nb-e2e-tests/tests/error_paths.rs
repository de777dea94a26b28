//! E2E tests for error paths and edge cases across crate boundaries.

mod helpers;

use chrono::Duration;

use helpers::{OWNER, TestHarness, rome};
use nb_protocol::{LoggedAction, ReminderId, ReminderStatus};
use nb_scheduler::{
    DispatchError, DispatchOutcome, EscalationScheduler, NudgeConfig, SchedulerConfig,
    SchedulerError,
};

/// Text that is neither a command nor addressed to a reminder changes nothing.
#[tokio::test]
async fn e2e_unknown_text_is_rejected_without_mutation() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;

    let err = h.text("boh").await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownAction(ref t) if t == "boh"));
    assert_eq!(h.reminder(r.id).await, r);
}

/// Unknown button actions change nothing either.
#[tokio::test]
async fn e2e_unknown_button_is_rejected_without_mutation() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;

    let err = h.press("explode", r.id).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownAction(_)));
    assert_eq!(h.reminder(r.id).await, r);
}

/// A button for a reminder that does not exist is NotFound.
#[tokio::test]
async fn e2e_button_for_missing_reminder() {
    let h = TestHarness::new();
    let err = h.press("done", ReminderId::new()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Scheduler(SchedulerError::NotFound(_))));
}

/// Another user's reminder id is treated as unknown.
#[tokio::test]
async fn e2e_button_for_other_owner() {
    let h = TestHarness::new();
    let parsed = h.parse("comprare il latte alle 10").unwrap();
    let theirs = h.scheduler.create(&parsed, "user-2", false).await.unwrap().remove(0);

    let err = h.press("cancel", theirs.id).await.unwrap_err();
    assert!(matches!(err, DispatchError::Scheduler(SchedulerError::NotFound(_))));
    assert_eq!(h.reminder(theirs.id).await.status, ReminderStatus::Scheduled);
}

/// "fatto" with nothing delivered has no target.
#[tokio::test]
async fn e2e_done_without_delivered_reminder() {
    let h = TestHarness::new();
    h.remind("comprare il latte alle 10").await;

    let err = h.text("fatto").await.unwrap_err();
    assert!(matches!(err, DispatchError::NoActiveReminder(ref owner) if owner == OWNER));
}

/// Signals on a finished reminder are accepted as no-ops.
#[tokio::test]
async fn e2e_signal_on_terminal_is_noop() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;
    h.press("done", r.id).await.unwrap();
    let completed = h.reminder(r.id).await;

    for action in ["done", "cancel", "snooze30", "tomorrow", "skip"] {
        let DispatchOutcome::Signalled { outcome, .. } = h.press(action, r.id).await.unwrap() else {
            panic!("expected a signal outcome for {action}");
        };
        assert!(!outcome.applied, "{action}");
        assert_eq!(outcome.status, ReminderStatus::Completed);
    }
    assert_eq!(h.reminder(r.id).await, completed);
    assert_eq!(h.logged().await, vec![LoggedAction::Done]);
}

/// A cancelled reminder is never delivered.
#[tokio::test]
async fn e2e_cancelled_reminder_never_fires() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;
    h.press("cancel", r.id).await.unwrap();

    h.tick_at(rome(2024, 3, 1, 10, 0)).await;
    h.advance_and_tick(Duration::days(1)).await;
    assert_eq!(h.notifier.call_count(), 0);
    assert_eq!(h.logged().await, vec![LoggedAction::Cancelled]);
}

/// Mute and snooze need a positive duration that lands on the calendar.
#[tokio::test]
async fn e2e_invalid_durations() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;

    assert!(matches!(
        h.text("/silenzio").await.unwrap_err(),
        DispatchError::InvalidDuration(_)
    ));
    assert!(matches!(
        h.text("silenzio per sempre").await.unwrap_err(),
        DispatchError::InvalidDuration(_)
    ));
    assert!(matches!(
        h.text("/silenzio 99999999999999h").await.unwrap_err(),
        DispatchError::InvalidDuration(_)
    ));
    assert!(matches!(
        h.text("/silenzio 100000000d").await.unwrap_err(),
        DispatchError::Scheduler(SchedulerError::InvalidDuration)
    ));
    assert!(matches!(
        h.press("snooze:100000000d", r.id).await.unwrap_err(),
        DispatchError::Scheduler(SchedulerError::InvalidDuration)
    ));
    assert!(matches!(
        h.scheduler.snooze_one(r.id, Duration::zero()).await.unwrap_err(),
        SchedulerError::InvalidDuration
    ));
    assert!(matches!(
        h.scheduler.snooze_all(OWNER, Duration::minutes(-5)).await.unwrap_err(),
        SchedulerError::InvalidDuration
    ));
    assert_eq!(h.reminder(r.id).await.status, ReminderStatus::Scheduled);
}

/// A nudge table that cannot build a policy is refused at startup.
#[tokio::test]
async fn e2e_bad_nudge_table_is_refused() {
    let h = TestHarness::new();
    let nudges = NudgeConfig {
        standard_minutes: vec![60, 0],
        ..NudgeConfig::default()
    };
    let result = EscalationScheduler::new(
        h.clock.clone(),
        std::sync::Arc::new(h.store.clone()),
        h.notifier.clone(),
        SchedulerConfig::default(),
        nudges,
    );
    assert!(matches!(result, Err(SchedulerError::Policy(_))));
}

/// A failing delivery is visible in the report but the tick itself succeeds.
#[tokio::test]
async fn e2e_tick_survives_delivery_failure() {
    let h = TestHarness::new();
    let r = h.remind("comprare il latte alle 10").await;
    h.notifier.fail_next(1);

    let report = h.tick_at(rome(2024, 3, 1, 10, 0)).await;
    assert_eq!(report.examined, 1);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.retries, 1);
    assert_eq!(h.reminder(r.id).await.status, ReminderStatus::Scheduled);
}
