//! nudgebot: Italian natural-language reminders with escalating nudges.
//!
//! Runs the escalation scheduler next to a console chat session on
//! stdin/stdout. Logs go to stderr as JSON.

use std::sync::Arc;

use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use nb_notify::{LogNotifier, Notifier};
use nb_parser::{IntentParser, TimeResolver};
use nb_scheduler::config::NudgebotConfig;
use nb_scheduler::console::{self, ConsoleSession};
use nb_scheduler::{Clock, EscalationScheduler, SystemClock};
use nb_store::{MemoryStore, PgStore, ReminderStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nudgebot starting");

    // ── Load config ─────────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => NudgebotConfig::from_file(&path)?,
        None => {
            tracing::info!("no config path given, using defaults");
            NudgebotConfig::default()
        }
    };
    let timezone = config.timezone()?;
    tracing::info!(
        timezone = %timezone,
        owner_id = %config.console_owner,
        tick_interval_secs = config.scheduler.tick_interval_secs,
        "config loaded"
    );

    // ── Store ───────────────────────────────────────────────────
    let database_url = std::env::var("DATABASE_URL").ok().or(config.database_url.clone());
    let store: Arc<dyn ReminderStore> = match database_url {
        Some(url) => {
            let store = PgStore::connect(&url).await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            Arc::new(store)
        }
        None => {
            tracing::warn!("no database configured, reminders are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    // ── Scheduler ───────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());
    let scheduler = Arc::new(EscalationScheduler::new(
        clock,
        store,
        notifier,
        config.scheduler.clone(),
        config.nudge.clone(),
    )?);
    let queued = scheduler.resync().await?;
    tracing::info!(queued, "due reminders loaded");

    // ── Console session ─────────────────────────────────────────
    let parser = IntentParser::new(TimeResolver::new(config.parser.clone()));
    let mut session = ConsoleSession::new(
        config.console_owner.clone(),
        timezone,
        parser,
        Arc::clone(&scheduler),
    );
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tracing::info!("nudgebot running");

    tokio::select! {
        result = Arc::clone(&scheduler).run() => {
            tracing::error!(result = ?result, "scheduler loop exited unexpectedly");
        }
        result = console::run(&mut session, stdin, stdout) => {
            match result {
                Ok(()) => tracing::info!("console input closed"),
                Err(e) => tracing::error!(error = %e, "console session failed"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("nudgebot stopped");
    Ok(())
}
