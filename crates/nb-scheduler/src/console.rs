//! Line-oriented chat transport over stdin/stdout.
//!
//! Each line is first tried as a command (`fatto`, `/silenzio 2h`, ...). Anything
//! else is parsed as a new reminder. Low-confidence parses are held until the
//! user answers `sì` or `no`. `/lista` shows active reminders and
//! `/button <payload>` simulates a button press.

use std::fmt;
use std::sync::Arc;

use chrono_tz::Tz;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use nb_parser::{FailureReason, IntentParser, ParseFailure};
use nb_protocol::{InboundEvent, ParsedReminder, Reminder, ReminderStatus};

use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::error::{DispatchError, SchedulerError};
use crate::scheduler::{EscalationScheduler, awaiting_answer};

const TIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Answer to one input line.
#[derive(Debug)]
pub enum Reply {
    Created(Vec<Reminder>),
    NeedsConfirmation(ParsedReminder),
    Discarded,
    Dispatched(DispatchOutcome),
    Listed(Vec<Reminder>),
    NotUnderstood(ParseFailure),
    Failed(String),
}

pub struct ConsoleSession {
    owner_id: String,
    timezone: Tz,
    parser: IntentParser,
    scheduler: Arc<EscalationScheduler>,
    dispatcher: CommandDispatcher,
    pending: Option<ParsedReminder>,
}

impl ConsoleSession {
    pub fn new(
        owner_id: impl Into<String>,
        timezone: Tz,
        parser: IntentParser,
        scheduler: Arc<EscalationScheduler>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            timezone,
            parser,
            dispatcher: CommandDispatcher::new(Arc::clone(&scheduler)),
            scheduler,
            pending: None,
        }
    }

    /// Candidate waiting for confirmation, if any.
    pub fn pending(&self) -> Option<&ParsedReminder> {
        self.pending.as_ref()
    }

    pub async fn handle_line(&mut self, line: &str) -> Reply {
        let line = line.trim();

        if let Some(pending) = self.pending.take() {
            match line.to_lowercase().as_str() {
                "si" | "sì" | "conferma" | "ok" => return self.create(&pending, true).await,
                "no" => return Reply::Discarded,
                // Anything else drops the candidate and is read as new input.
                _ => {}
            }
        }

        if line.eq_ignore_ascii_case("/lista") {
            return match self.scheduler.list_for_owner(&self.owner_id).await {
                Ok(all) => Reply::Listed(all.into_iter().filter(|r| !r.is_terminal()).collect()),
                Err(e) => Reply::Failed(e.to_string()),
            };
        }

        let event = match line.strip_prefix("/button ") {
            Some(payload) => InboundEvent::button(&self.owner_id, payload.trim()),
            None => InboundEvent::text(&self.owner_id, line),
        };
        match CommandDispatcher::classify(&event) {
            Err(DispatchError::UnknownAction(_)) if line.starts_with('/') => {
                return Reply::Failed(format!("comando sconosciuto: {line}"));
            }
            Err(DispatchError::UnknownAction(_)) => {}
            _ => {
                return match self.dispatcher.dispatch(&event).await {
                    Ok(outcome) => Reply::Dispatched(outcome),
                    Err(e) => Reply::Failed(e.to_string()),
                };
            }
        }

        match self.parser.parse(line, self.scheduler.now(), self.timezone) {
            Ok(parsed) if parsed.is_confident() => self.create(&parsed, false).await,
            Ok(parsed) => {
                self.pending = Some(parsed.clone());
                Reply::NeedsConfirmation(parsed)
            }
            Err(failure) => {
                tracing::debug!(owner_id = %self.owner_id, reason = ?failure.reason, "input not understood");
                Reply::NotUnderstood(failure)
            }
        }
    }

    async fn create(&mut self, parsed: &ParsedReminder, confirmed: bool) -> Reply {
        match self.scheduler.create(parsed, &self.owner_id, confirmed).await {
            Ok(created) => Reply::Created(created),
            Err(SchedulerError::LowConfidenceParse(_)) => {
                self.pending = Some(parsed.clone());
                Reply::NeedsConfirmation(parsed.clone())
            }
            Err(e) => Reply::Failed(e.to_string()),
        }
    }
}

/// Read lines until EOF, writing one reply per line.
pub async fn run<R, W>(session: &mut ConsoleSession, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = session.handle_line(&line).await;
        output.write_all(format!("{reply}\n").as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Created(reminders) => {
                for (i, r) in reminders.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(
                        f,
                        "Ok, ti ricorderò «{}» il {}",
                        r.title,
                        r.local_due_at().format(TIME_FORMAT)
                    )?;
                }
                Ok(())
            }
            Reply::NeedsConfirmation(parsed) => write!(
                f,
                "Intendi «{}» il {}? (sì/no) [{:?}]",
                parsed.title,
                parsed.local_due_at().format(TIME_FORMAT),
                parsed.ambiguities
            ),
            Reply::Discarded => write!(f, "Ok, lascio perdere."),
            Reply::Dispatched(DispatchOutcome::Muted { ids, duration }) => write!(
                f,
                "Silenzio per {} minuti su {} promemoria.",
                duration.num_minutes(),
                ids.len()
            ),
            Reply::Dispatched(DispatchOutcome::Signalled { outcome, .. }) => {
                if !outcome.applied {
                    return write!(f, "Quel promemoria è già chiuso.");
                }
                match (outcome.status, outcome.next_due) {
                    (ReminderStatus::Completed, _) => write!(f, "Fatto!")?,
                    (ReminderStatus::Cancelled, _) => write!(f, "Promemoria cancellato.")?,
                    (ReminderStatus::Snoozed, _) => write!(f, "Rimandato.")?,
                    (_, Some(next)) => write!(f, "Ok, alla prossima: {} UTC", next.format(TIME_FORMAT))?,
                    (status, None) => write!(f, "Ok ({status}).")?,
                }
                if outcome.snooze_warning {
                    write!(f, " Lo rimandi spesso: vuoi cambiare orario?")?;
                }
                Ok(())
            }
            Reply::Listed(reminders) if reminders.is_empty() => write!(f, "Nessun promemoria attivo."),
            Reply::Listed(reminders) => {
                for (i, r) in reminders.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    let marker = if awaiting_answer(r.status) { " *" } else { "" };
                    write!(
                        f,
                        "{} {} «{}» [{}]{marker}",
                        r.id,
                        r.local_due_at().format(TIME_FORMAT),
                        r.title,
                        r.status
                    )?;
                }
                Ok(())
            }
            Reply::NotUnderstood(failure) => match failure.reason {
                FailureReason::InvalidDate => write!(f, "Quella data non esiste."),
                FailureReason::NoTimeFound => {
                    write!(f, "Non ho capito quando. Prova con \"domani alle 9\".")
                }
            },
            Reply::Failed(message) => write!(f, "Errore: {message}"),
        }
    }
}
