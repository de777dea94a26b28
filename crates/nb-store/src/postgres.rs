//! PostgreSQL-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use nb_protocol::{
    ActionLogEntry, Category, DeliveryClaim, LoggedAction, NudgePolicy, Recurrence, Reminder,
    ReminderId, ReminderStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::store::ReminderStore;

const TERMINAL: &str = "('completed', 'cancelled', 'expired')";

/// Reminder row as stored in the `reminders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReminderRow {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub series_due_at: DateTime<Utc>,
    pub timezone: String,
    pub status: String,
    pub nudge_level: Option<i16>,
    pub nudge_count: i16,
    pub max_nudges: i16,
    pub nudge_policy: serde_json::Value,
    pub snooze_until: Option<DateTime<Utc>>,
    pub category: String,
    pub recurrence: serde_json::Value,
    pub snooze_count: i32,
    pub next_check_at: Option<DateTime<Utc>>,
    pub last_delivered_at: Option<DateTime<Utc>>,
    pub delivery_retries: i32,
    pub claim_attempt: Option<i16>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = StoreError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| StoreError::Corrupt(format!("reminder {}: {what}", row.id));

        let timezone: Tz = row
            .timezone
            .parse()
            .map_err(|_| corrupt("unknown timezone"))?;
        let level = row.nudge_level.map(u8::try_from).transpose().ok().flatten();
        let status =
            ReminderStatus::from_parts(&row.status, level).ok_or_else(|| corrupt("bad status"))?;
        let nudge_policy: NudgePolicy = serde_json::from_value(row.nudge_policy.clone())
            .map_err(|e| corrupt(&format!("nudge policy: {e}")))?;
        let recurrence: Recurrence = serde_json::from_value(row.recurrence.clone())
            .map_err(|e| corrupt(&format!("recurrence: {e}")))?;
        let category: Category = row.category.parse().map_err(|e: String| corrupt(&e))?;
        let claim = match (row.claim_attempt, row.claimed_at) {
            (Some(attempt), Some(claimed_at)) => Some(DeliveryClaim {
                attempt: u8::try_from(attempt).map_err(|_| corrupt("claim attempt"))?,
                claimed_at,
            }),
            _ => None,
        };

        Ok(Reminder {
            id: ReminderId(row.id),
            owner_id: row.owner_id,
            title: row.title,
            due_at: row.due_at,
            series_due_at: row.series_due_at,
            timezone,
            status,
            nudge_count: u8::try_from(row.nudge_count).map_err(|_| corrupt("nudge count"))?,
            max_nudges: u8::try_from(row.max_nudges).map_err(|_| corrupt("max nudges"))?,
            nudge_policy,
            snooze_until: row.snooze_until,
            category,
            recurrence,
            snooze_count: u32::try_from(row.snooze_count).unwrap_or_default(),
            next_check_at: row.next_check_at,
            last_delivered_at: row.last_delivered_at,
            delivery_retries: u32::try_from(row.delivery_retries).unwrap_or_default(),
            claim,
            version: u64::try_from(row.version).map_err(|_| corrupt("version"))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Action log row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActionRow {
    pub id: Uuid,
    pub reminder_id: Uuid,
    pub owner_id: String,
    pub action: String,
    pub at: DateTime<Utc>,
}

impl TryFrom<ActionRow> for ActionLogEntry {
    type Error = StoreError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let action = LoggedAction::from_name(&row.action)
            .ok_or_else(|| StoreError::Corrupt(format!("action {}: {}", row.id, row.action)))?;
        Ok(ActionLogEntry {
            id: row.id,
            reminder_id: ReminderId(row.reminder_id),
            owner_id: row.owner_id,
            action,
            at: row.at,
        })
    }
}

/// Reminder store over a `PgPool`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        tracing::info!("running database migrations");
        sqlx::raw_sql(include_str!("../migrations/001_reminders.sql"))
            .execute(&pool)
            .await?;
        sqlx::raw_sql(include_str!("../migrations/002_reminder_actions.sql"))
            .execute(&pool)
            .await?;
        tracing::info!("migrations complete");

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn into_reminders(rows: Vec<ReminderRow>) -> StoreResult<Vec<Reminder>> {
        rows.into_iter().map(Reminder::try_from).collect()
    }
}

fn policy_json(policy: &NudgePolicy) -> StoreResult<serde_json::Value> {
    serde_json::to_value(policy).map_err(|e| StoreError::Corrupt(format!("nudge policy: {e}")))
}

fn recurrence_json(recurrence: &Recurrence) -> StoreResult<serde_json::Value> {
    serde_json::to_value(recurrence).map_err(|e| StoreError::Corrupt(format!("recurrence: {e}")))
}

fn version_i64(version: u64) -> StoreResult<i64> {
    i64::try_from(version).map_err(|_| StoreError::Corrupt(format!("version {version}")))
}

#[async_trait]
impl ReminderStore for PgStore {
    async fn create(&self, reminder: Reminder) -> StoreResult<ReminderId> {
        let result = sqlx::query(
            "INSERT INTO reminders (id, owner_id, title, due_at, series_due_at, timezone, status,
                nudge_level, nudge_count, max_nudges, nudge_policy, snooze_until, category,
                recurrence, snooze_count, next_check_at, last_delivered_at, delivery_retries,
                claim_attempt, claimed_at, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(reminder.id.0)
        .bind(&reminder.owner_id)
        .bind(&reminder.title)
        .bind(reminder.due_at)
        .bind(reminder.series_due_at)
        .bind(reminder.timezone.name())
        .bind(reminder.status.as_str())
        .bind(reminder.status.nudge_level().map(i16::from))
        .bind(i16::from(reminder.nudge_count))
        .bind(i16::from(reminder.max_nudges))
        .bind(policy_json(&reminder.nudge_policy)?)
        .bind(reminder.snooze_until)
        .bind(reminder.category.as_str())
        .bind(recurrence_json(&reminder.recurrence)?)
        .bind(i32::try_from(reminder.snooze_count).unwrap_or(i32::MAX))
        .bind(reminder.next_check_at)
        .bind(reminder.last_delivered_at)
        .bind(i32::try_from(reminder.delivery_retries).unwrap_or(i32::MAX))
        .bind(reminder.claim.map(|c| i16::from(c.attempt)))
        .bind(reminder.claim.map(|c| c.claimed_at))
        .bind(version_i64(reminder.version)?)
        .bind(reminder.created_at)
        .bind(reminder.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(reminder.id));
        }
        Ok(reminder.id)
    }

    async fn get(&self, id: ReminderId) -> StoreResult<Reminder> {
        let row = sqlx::query_as::<_, ReminderRow>("SELECT * FROM reminders WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Reminder::try_from(row)
    }

    async fn update(&self, reminder: &Reminder) -> StoreResult<Reminder> {
        let row = sqlx::query_as::<_, ReminderRow>(
            "UPDATE reminders SET title = $3, due_at = $4, series_due_at = $5, timezone = $6,
                status = $7, nudge_level = $8, nudge_count = $9, max_nudges = $10,
                nudge_policy = $11, snooze_until = $12, category = $13, recurrence = $14,
                snooze_count = $15, next_check_at = $16, last_delivered_at = $17,
                delivery_retries = $18, claim_attempt = $19, claimed_at = $20, updated_at = $21,
                version = version + 1
             WHERE id = $1 AND version = $2
             RETURNING *",
        )
        .bind(reminder.id.0)
        .bind(version_i64(reminder.version)?)
        .bind(&reminder.title)
        .bind(reminder.due_at)
        .bind(reminder.series_due_at)
        .bind(reminder.timezone.name())
        .bind(reminder.status.as_str())
        .bind(reminder.status.nudge_level().map(i16::from))
        .bind(i16::from(reminder.nudge_count))
        .bind(i16::from(reminder.max_nudges))
        .bind(policy_json(&reminder.nudge_policy)?)
        .bind(reminder.snooze_until)
        .bind(reminder.category.as_str())
        .bind(recurrence_json(&reminder.recurrence)?)
        .bind(i32::try_from(reminder.snooze_count).unwrap_or(i32::MAX))
        .bind(reminder.next_check_at)
        .bind(reminder.last_delivered_at)
        .bind(i32::try_from(reminder.delivery_retries).unwrap_or(i32::MAX))
        .bind(reminder.claim.map(|c| i16::from(c.attempt)))
        .bind(reminder.claim.map(|c| c.claimed_at))
        .bind(reminder.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Reminder::try_from(row),
            None => {
                // Either gone or moved on; tell the two apart for the caller.
                let current = self.get(reminder.id).await?;
                Err(StoreError::Conflict {
                    id: reminder.id,
                    expected: reminder.version,
                    found: current.version,
                })
            }
        }
    }

    async fn list_due(&self, before: DateTime<Utc>) -> StoreResult<Vec<Reminder>> {
        let sql = format!(
            "SELECT * FROM reminders
             WHERE next_check_at <= $1 AND status NOT IN {TERMINAL}
             ORDER BY next_check_at, id"
        );
        let rows = sqlx::query_as::<_, ReminderRow>(&sql)
            .bind(before)
            .fetch_all(&self.pool)
            .await?;
        Self::into_reminders(rows)
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<Reminder>> {
        let rows = sqlx::query_as::<_, ReminderRow>(
            "SELECT * FROM reminders WHERE owner_id = $1 ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Self::into_reminders(rows)
    }

    async fn record_action(&self, entry: ActionLogEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO reminder_actions (id, reminder_id, owner_id, action, at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.id)
        .bind(entry.reminder_id.0)
        .bind(&entry.owner_id)
        .bind(entry.action.as_str())
        .bind(entry.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_actions(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ActionLogEntry>> {
        let rows = sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM reminder_actions WHERE owner_id = $1 AND at >= $2 ORDER BY at, id",
        )
        .bind(owner_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ActionLogEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row() -> ReminderRow {
        let t = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        ReminderRow {
            id: Uuid::now_v7(),
            owner_id: "u1".into(),
            title: "comprare il latte".into(),
            due_at: t,
            series_due_at: t,
            timezone: "Europe/Rome".into(),
            status: "nudging".into(),
            nudge_level: Some(2),
            nudge_count: 1,
            max_nudges: 3,
            nudge_policy: serde_json::json!([30, 30, 30]),
            snooze_until: None,
            category: "medicine".into(),
            recurrence: serde_json::json!({"every": "daily"}),
            snooze_count: 0,
            next_check_at: Some(t),
            last_delivered_at: Some(t),
            delivery_retries: 0,
            claim_attempt: Some(2),
            claimed_at: Some(t),
            version: 7,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn row_converts_to_reminder() {
        let r = Reminder::try_from(row()).unwrap();
        assert_eq!(r.status, ReminderStatus::Nudging { level: 2 });
        assert_eq!(r.timezone, chrono_tz::Europe::Rome);
        assert_eq!(r.nudge_policy, NudgePolicy::medicine());
        assert_eq!(r.recurrence, Recurrence::Daily);
        assert_eq!(r.category, Category::Medicine);
        assert_eq!(r.claim.map(|c| c.attempt), Some(2));
        assert_eq!(r.version, 7);
    }

    #[test]
    fn corrupt_rows_are_rejected() {
        let mut bad_tz = row();
        bad_tz.timezone = "Mars/Olympus".into();
        assert!(matches!(
            Reminder::try_from(bad_tz),
            Err(StoreError::Corrupt(_))
        ));

        let mut bad_status = row();
        bad_status.nudge_level = None;
        assert!(matches!(
            Reminder::try_from(bad_status),
            Err(StoreError::Corrupt(_))
        ));

        let mut bad_policy = row();
        bad_policy.nudge_policy = serde_json::json!([60, 10]);
        assert!(matches!(
            Reminder::try_from(bad_policy),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn action_row_converts() {
        let row = ActionRow {
            id: Uuid::now_v7(),
            reminder_id: Uuid::now_v7(),
            owner_id: "u1".into(),
            action: "snoozed".into(),
            at: Utc::now(),
        };
        let entry = ActionLogEntry::try_from(row).unwrap();
        assert_eq!(entry.action, LoggedAction::Snoozed);
    }
}
