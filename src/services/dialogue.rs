use chrono::{NaiveDate, NaiveTime};

use crate::models::{DialogueState, Intent, Session, SlotKey, SlotStatus, ToolName};
use crate::services::backend::SchedulingBackend;
use crate::services::validate::ValidationContext;
use crate::services::{gate, intent, slots};

const GREETING: &str = "Hello! I can book an appointment, check whether a slot is free, or cancel an existing appointment. What can I do for you?";
const INTENT_REPROMPT: &str = "Sorry, I didn't quite get that. Would you like to book an appointment, check a slot, or cancel one?";
const RESTART_REPLY: &str = "No problem, let's start fresh. Would you like to book, check, or cancel an appointment?";
const GOODBYE_REPLY: &str = "Alright, I've dropped that. Goodbye!";

/// Advances a session by exactly one user turn and returns the reply to
/// send. Every external call goes through the gate; a failed call parks the
/// session in `Failed` and waits for the user to choose retry or abandon.
///
/// Returns `Err` only on internal invariant violations (a tool invoked with
/// incomplete arguments), never on recoverable user input.
pub async fn process_turn(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
    message: &str,
    ctx: &ValidationContext,
) -> anyhow::Result<String> {
    let text = message.trim();

    tracing::info!(
        session = %session.id,
        state = session.state.as_str(),
        intent = session.intent.map(|i| i.as_str()).unwrap_or("unset"),
        "processing turn"
    );

    // A finished conversation starts over on the next turn.
    if session.state == DialogueState::Completed {
        session.reset();
    }

    if !text.is_empty() && intent::wants_restart(text) {
        session.reset();
        return Ok(RESTART_REPLY.to_string());
    }
    if !text.is_empty() && intent::wants_to_leave(text) {
        session.reset();
        session.state = DialogueState::Completed;
        return Ok(GOODBYE_REPLY.to_string());
    }

    let reply = match session.state.clone() {
        DialogueState::Greeting => {
            session.state = DialogueState::IntentSelection;
            if text.is_empty() {
                GREETING.to_string()
            } else {
                select_intent(session, text)
            }
        }
        DialogueState::IntentSelection => select_intent(session, text),
        DialogueState::Collecting { slot } => {
            collect_slot(backend, session, slot, text, ctx).await?
        }
        DialogueState::Confirming => confirm_booking(backend, session, text).await?,
        DialogueState::AwaitingToolResult { tool } => {
            consume_pending(backend, session, tool, text).await?
        }
        DialogueState::Failed { tool, .. } => retry_or_abandon(backend, session, tool, text).await?,
        DialogueState::Completed => {
            // reset above makes this unreachable; re-prompt defensively
            INTENT_REPROMPT.to_string()
        }
    };

    Ok(reply)
}

fn select_intent(session: &mut Session, text: &str) -> String {
    match intent::resolve(text) {
        Some(resolved) => {
            session.intent = Some(resolved);
            tracing::info!(session = %session.id, intent = resolved.as_str(), "intent resolved");
            match slots::next_missing(resolved, &session.slots) {
                Some(first) => {
                    session.state = DialogueState::Collecting { slot: first };
                    match resolved {
                        Intent::Book => {
                            "Happy to book you in. What date would you like?".to_string()
                        }
                        Intent::Check => "Sure. What date should I check?".to_string(),
                        Intent::Cancel => {
                            "Okay, let's cancel an appointment. What name is it under?".to_string()
                        }
                    }
                }
                None => INTENT_REPROMPT.to_string(),
            }
        }
        None => INTENT_REPROMPT.to_string(),
    }
}

async fn collect_slot(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
    slot: SlotKey,
    text: &str,
    ctx: &ValidationContext,
) -> anyhow::Result<String> {
    let flow = session
        .intent
        .ok_or_else(|| anyhow::anyhow!("collecting {} without an intent", slot.as_str()))?;

    if let Err(rejection) = slots::fill(session, slot, text, ctx) {
        tracing::debug!(
            session = %session.id,
            slot = slot.as_str(),
            rejection = %rejection,
            "slot rejected"
        );
        // same slot is asked again
        return Ok(rejection.to_string());
    }

    let reply = match (flow, slot) {
        (Intent::Book, SlotKey::Date) => offer_free_slots(backend, session).await?,
        (Intent::Book, SlotKey::Time) => {
            session.state = DialogueState::Collecting {
                slot: SlotKey::Purpose,
            };
            "Got it. What is the purpose of your visit?".to_string()
        }
        (Intent::Book, SlotKey::Purpose) => {
            session.state = DialogueState::Collecting {
                slot: SlotKey::Name,
            };
            "And what name should the appointment be under?".to_string()
        }
        (Intent::Book, SlotKey::Name) => {
            session.state = DialogueState::Confirming;
            booking_summary(session)?
        }
        (Intent::Check, SlotKey::Date) => {
            session.state = DialogueState::Collecting {
                slot: SlotKey::Time,
            };
            "And what time should I check?".to_string()
        }
        (Intent::Check, SlotKey::Time) => report_slot_status(backend, session).await?,
        (Intent::Cancel, SlotKey::Name) => {
            session.state = DialogueState::Collecting {
                slot: SlotKey::Date,
            };
            "What date is the appointment on?".to_string()
        }
        (Intent::Cancel, SlotKey::Date) => run_cancellation(backend, session).await?,
        (flow, slot) => anyhow::bail!(
            "slot {} collected outside the {} flow",
            slot.as_str(),
            flow.as_str()
        ),
    };

    Ok(reply)
}

/// Book flow, after `date` fills: `get_free_slots` must run and its result
/// be presented before `time` may be collected.
async fn offer_free_slots(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
) -> anyhow::Result<String> {
    let date = gate::free_slots_args(session)?;
    session.state = DialogueState::AwaitingToolResult {
        tool: ToolName::GetFreeSlots,
    };

    match backend.get_free_slots(date).await {
        Ok(times) if times.is_empty() => {
            session.slots.date = None;
            session.state = DialogueState::Collecting {
                slot: SlotKey::Date,
            };
            Ok(format!(
                "I'm sorry, there are no free slots on {}. Is there another date that works?",
                fmt_date(date)
            ))
        }
        Ok(times) => {
            session.offered_times = times.clone();
            session.state = DialogueState::Collecting {
                slot: SlotKey::Time,
            };
            Ok(format!(
                "The available slots on {} are: {}. Which time would you like?",
                fmt_date(date),
                fmt_times(&times)
            ))
        }
        Err(e) => Ok(fail(session, ToolName::GetFreeSlots, e)),
    }
}

async fn report_slot_status(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
) -> anyhow::Result<String> {
    let (date, time) = gate::check_args(session)?;
    session.state = DialogueState::AwaitingToolResult {
        tool: ToolName::CheckSlotStatus,
    };

    let result = backend.check_slot_status(date, time).await;
    if let Ok(status) = &result {
        tracing::info!(session = %session.id, status = status.as_str(), "slot status");
    }

    match result {
        Ok(SlotStatus::Booked) => {
            session.state = DialogueState::Completed;
            Ok(format!(
                "I'm afraid {} at {} is already booked.",
                fmt_date(date),
                fmt_time(time)
            ))
        }
        Ok(SlotStatus::Available) => {
            // hold the result; the booking offer waits on a yes/no
            session.pending_status = Some(SlotStatus::Available);
            Ok(format!(
                "Good news: {} at {} is free. Would you like me to book it for you?",
                fmt_date(date),
                fmt_time(time)
            ))
        }
        Err(e) => Ok(fail(session, ToolName::CheckSlotStatus, e)),
    }
}

async fn run_cancellation(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
) -> anyhow::Result<String> {
    let (name, date) = gate::cancel_args(session)?;
    session.state = DialogueState::AwaitingToolResult {
        tool: ToolName::CancelAppointment,
    };

    match backend.cancel_appointment(&name, date).await {
        Ok(true) => {
            session.state = DialogueState::Completed;
            Ok(format!(
                "Done. The appointment for {} on {} has been cancelled.",
                name,
                fmt_date(date)
            ))
        }
        Ok(false) => {
            session.state = DialogueState::Completed;
            Ok(format!(
                "I couldn't find an appointment for {} on {}, so there was nothing to cancel.",
                name,
                fmt_date(date)
            ))
        }
        Err(e) => Ok(fail(session, ToolName::CancelAppointment, e)),
    }
}

async fn run_save(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
) -> anyhow::Result<String> {
    let (date, time, purpose, name) = gate::booking_args(session)?;
    session.state = DialogueState::AwaitingToolResult {
        tool: ToolName::AppointmentSaved,
    };

    match backend.appointment_saved(date, time, &purpose, &name).await {
        Ok(true) => {
            session.state = DialogueState::Completed;
            Ok(format!(
                "You're all set: {} on {} at {} for {}. See you then!",
                name,
                fmt_date(date),
                fmt_time(time),
                purpose
            ))
        }
        Ok(false) => {
            // slot taken between offer and confirmation; re-offer from
            // the current free list
            tracing::warn!(session = %session.id, "slot taken before confirmation, re-offering");
            session.slots.time = None;
            let reoffer = offer_free_slots(backend, session).await?;
            Ok(format!(
                "I'm sorry, that time was just taken. {reoffer}"
            ))
        }
        Err(e) => Ok(fail(session, ToolName::AppointmentSaved, e)),
    }
}

async fn confirm_booking(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
    text: &str,
) -> anyhow::Result<String> {
    if intent::is_affirmative(text) {
        run_save(backend, session).await
    } else if intent::is_negative(text) {
        // back to the last collected slot
        session.slots.name = None;
        session.state = DialogueState::Collecting {
            slot: SlotKey::Name,
        };
        Ok("Okay, let's fix that. What name should the appointment be under?".to_string())
    } else {
        Ok(format!(
            "{} Is that right? (yes/no)",
            booking_summary(session)?
        ))
    }
}

/// Handles a turn that arrives while an unconsumed tool result is pending.
/// The only result that waits on user input is an available check: the
/// booking offer.
async fn consume_pending(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
    tool: ToolName,
    text: &str,
) -> anyhow::Result<String> {
    match tool {
        ToolName::CheckSlotStatus if session.pending_status == Some(SlotStatus::Available) => {
            if intent::is_affirmative(text) {
                // re-enter the Book flow; time is re-collected from a
                // fresh offer so it always comes from the presented list
                session.pending_status = None;
                session.intent = Some(Intent::Book);
                session.slots.time = None;
                offer_free_slots(backend, session).await
            } else if intent::is_negative(text) {
                session.pending_status = None;
                session.state = DialogueState::Completed;
                Ok("No problem. Is there anything else? Goodbye!".to_string())
            } else {
                Ok("Would you like me to book that slot? (yes/no)".to_string())
            }
        }
        tool => anyhow::bail!("turn received while waiting on {}", tool.as_str()),
    }
}

async fn retry_or_abandon(
    backend: &dyn SchedulingBackend,
    session: &mut Session,
    tool: ToolName,
    text: &str,
) -> anyhow::Result<String> {
    if intent::is_affirmative(text) {
        tracing::info!(session = %session.id, tool = tool.as_str(), "retrying failed call");
        match tool {
            ToolName::GetFreeSlots => offer_free_slots(backend, session).await,
            ToolName::AppointmentSaved => run_save(backend, session).await,
            ToolName::CheckSlotStatus => report_slot_status(backend, session).await,
            ToolName::CancelAppointment => run_cancellation(backend, session).await,
        }
    } else if intent::is_negative(text) {
        session.reset();
        session.state = DialogueState::Completed;
        Ok("Understood, I've left everything as it was. Goodbye!".to_string())
    } else {
        Ok("Should I try that again? (yes/no)".to_string())
    }
}

fn fail(session: &mut Session, tool: ToolName, err: anyhow::Error) -> String {
    tracing::error!(
        session = %session.id,
        tool = tool.as_str(),
        error = %err,
        "external call failed"
    );
    session.state = DialogueState::Failed {
        tool,
        reason: err.to_string(),
    };
    "I'm sorry, I couldn't reach the scheduling system just now. Should I try again? (yes/no)"
        .to_string()
}

fn booking_summary(session: &Session) -> anyhow::Result<String> {
    let (date, time, purpose, name) = gate::booking_args(session)?;
    Ok(format!(
        "Let me confirm: an appointment on {} at {} for {} under the name {}. Shall I book it? (yes/no)",
        fmt_date(date),
        fmt_time(time),
        purpose,
        name
    ))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn fmt_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn fmt_times(times: &[NaiveTime]) -> String {
    times
        .iter()
        .map(|t| fmt_time(*t))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Datelike;

    use super::*;

    // ── Mock backend ──

    struct MockBackend {
        calls: Mutex<Vec<String>>,
        free: Vec<NaiveTime>,
        status: SlotStatus,
        save_result: bool,
        cancel_result: bool,
        failing: Option<ToolName>,
    }

    impl MockBackend {
        fn new() -> Self {
            MockBackend {
                calls: Mutex::new(Vec::new()),
                free: vec![t("10:00"), t("11:00"), t("14:00")],
                status: SlotStatus::Available,
                save_result: true,
                cancel_result: true,
                failing: None,
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn check_failure(&self, tool: ToolName) -> anyhow::Result<()> {
            if self.failing == Some(tool) {
                anyhow::bail!("backend unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SchedulingBackend for MockBackend {
        async fn get_free_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>> {
            self.record(format!("get_free_slots {date}"));
            self.check_failure(ToolName::GetFreeSlots)?;
            Ok(self.free.clone())
        }

        async fn appointment_saved(
            &self,
            date: NaiveDate,
            time: NaiveTime,
            purpose: &str,
            name: &str,
        ) -> anyhow::Result<bool> {
            self.record(format!(
                "appointment_saved {date} {} {purpose} {name}",
                time.format("%H:%M")
            ));
            self.check_failure(ToolName::AppointmentSaved)?;
            Ok(self.save_result)
        }

        async fn check_slot_status(
            &self,
            date: NaiveDate,
            time: NaiveTime,
        ) -> anyhow::Result<SlotStatus> {
            self.record(format!("check_slot_status {date} {}", time.format("%H:%M")));
            self.check_failure(ToolName::CheckSlotStatus)?;
            Ok(self.status)
        }

        async fn cancel_appointment(&self, name: &str, date: NaiveDate) -> anyhow::Result<bool> {
            self.record(format!("cancel_appointment {name} {date}"));
            self.check_failure(ToolName::CancelAppointment)?;
            Ok(self.cancel_result)
        }
    }

    // ── Helpers ──

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new(2024)
    }

    fn session() -> Session {
        Session::new("test-session".to_string())
    }

    async fn turn(
        backend: &MockBackend,
        session: &mut Session,
        message: &str,
    ) -> String {
        process_turn(backend, session, message, &ctx()).await.unwrap()
    }

    // ── Tests ──

    #[tokio::test]
    async fn test_greeting_then_intent_selection() {
        let backend = MockBackend::new();
        let mut s = session();

        let reply = turn(&backend, &mut s, "").await;
        assert!(reply.contains("book"));
        assert_eq!(s.state, DialogueState::IntentSelection);

        // ambiguous input never advances past intent selection
        let reply = turn(&backend, &mut s, "hello there").await;
        assert_eq!(s.state, DialogueState::IntentSelection);
        assert!(reply.contains("book"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_opening_message_resolves_intent_in_same_turn() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "I'd like to book an appointment").await;
        assert_eq!(s.intent, Some(Intent::Book));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Date }
        );
    }

    #[tokio::test]
    async fn test_full_book_flow() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;

        // year defaulted to the context's current year
        let reply = turn(&backend, &mut s, "12/25").await;
        assert_eq!(backend.calls(), vec!["get_free_slots 2024-12-25"]);
        assert!(reply.contains("10:00"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Time }
        );

        turn(&backend, &mut s, "10:00").await;
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Purpose }
        );

        turn(&backend, &mut s, "dental checkup").await;
        let reply = turn(&backend, &mut s, "Jane Doe").await;
        assert_eq!(s.state, DialogueState::Confirming);
        // the summary presents all four collected values
        assert!(reply.contains("2024-12-25"));
        assert!(reply.contains("10:00"));
        assert!(reply.contains("dental checkup"));
        assert!(reply.contains("Jane Doe"));

        let reply = turn(&backend, &mut s, "yes").await;
        assert_eq!(s.state, DialogueState::Completed);
        assert!(reply.contains("all set"));
        assert_eq!(
            backend.calls().last().unwrap(),
            "appointment_saved 2024-12-25 10:00 dental checkup Jane Doe"
        );
    }

    #[tokio::test]
    async fn test_book_time_outside_offer_is_rejected_without_tool_call() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;
        let calls_before = backend.calls().len();

        let reply = turn(&backend, &mut s, "9:00").await;
        assert!(reply.contains("isn't one of the free slots"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Time }
        );
        assert_eq!(backend.calls().len(), calls_before);
        assert!(s.slots.time.is_none());
    }

    #[tokio::test]
    async fn test_invalid_date_reprompts_same_slot() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        let reply = turn(&backend, &mut s, "02-30").await;
        assert!(reply.contains("calendar date"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Date }
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_purpose_reprompts() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;
        turn(&backend, &mut s, "10:00").await;
        let reply = turn(&backend, &mut s, "   ").await;
        assert!(reply.contains("didn't catch"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Purpose }
        );
    }

    #[tokio::test]
    async fn test_confirming_correction_returns_to_last_slot() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;
        turn(&backend, &mut s, "10:00").await;
        turn(&backend, &mut s, "dental checkup").await;
        turn(&backend, &mut s, "Jane Doe").await;

        let reply = turn(&backend, &mut s, "no, that's wrong").await;
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Name }
        );
        assert!(reply.contains("name"));
        // nothing was saved
        assert!(!backend
            .calls()
            .iter()
            .any(|c| c.starts_with("appointment_saved")));

        turn(&backend, &mut s, "John Roe").await;
        assert_eq!(s.state, DialogueState::Confirming);
        turn(&backend, &mut s, "yes").await;
        assert_eq!(
            backend.calls().last().unwrap(),
            "appointment_saved 2024-12-25 10:00 dental checkup John Roe"
        );
    }

    #[tokio::test]
    async fn test_no_free_slots_recollects_date() {
        let mut backend = MockBackend::new();
        backend.free = vec![];
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        let reply = turn(&backend, &mut s, "12/25").await;
        assert!(reply.contains("no free slots"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Date }
        );
        assert!(s.slots.date.is_none());
    }

    #[tokio::test]
    async fn test_save_conflict_reoffers_times() {
        let mut backend = MockBackend::new();
        backend.save_result = false;
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;
        turn(&backend, &mut s, "10:00").await;
        turn(&backend, &mut s, "dental checkup").await;
        turn(&backend, &mut s, "Jane Doe").await;

        let reply = turn(&backend, &mut s, "yes").await;
        assert!(reply.contains("just taken"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Time }
        );
        assert!(s.slots.time.is_none());
        // a fresh offer was fetched after the failed save
        assert_eq!(backend.calls().last().unwrap(), "get_free_slots 2024-12-25");
    }

    #[tokio::test]
    async fn test_check_flow_booked_ends_without_offer() {
        let mut backend = MockBackend::new();
        backend.status = SlotStatus::Booked;
        let mut s = session();

        turn(&backend, &mut s, "is a slot free?").await;
        turn(&backend, &mut s, "2024-12-25").await;
        let reply = turn(&backend, &mut s, "2pm").await;

        assert_eq!(backend.calls(), vec!["check_slot_status 2024-12-25 14:00"]);
        assert!(reply.contains("already booked"));
        assert!(!reply.contains("book it"));
        assert_eq!(s.state, DialogueState::Completed);
    }

    #[tokio::test]
    async fn test_check_available_offer_accepted_enters_book_flow() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "check a slot for me").await;
        turn(&backend, &mut s, "2024-12-25").await;
        let reply = turn(&backend, &mut s, "14:00").await;
        assert!(reply.contains("free"));
        assert_eq!(
            s.state,
            DialogueState::AwaitingToolResult {
                tool: ToolName::CheckSlotStatus
            }
        );

        let reply = turn(&backend, &mut s, "yes please").await;
        assert_eq!(s.intent, Some(Intent::Book));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Time }
        );
        assert!(reply.contains("available slots"));
        assert_eq!(backend.calls().last().unwrap(), "get_free_slots 2024-12-25");

        // the rest of the book flow proceeds normally
        turn(&backend, &mut s, "14:00").await;
        turn(&backend, &mut s, "eye exam").await;
        turn(&backend, &mut s, "Jane Doe").await;
        turn(&backend, &mut s, "yes").await;
        assert_eq!(s.state, DialogueState::Completed);
        assert_eq!(
            backend.calls().last().unwrap(),
            "appointment_saved 2024-12-25 14:00 eye exam Jane Doe"
        );
    }

    #[tokio::test]
    async fn test_check_available_offer_declined_completes() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "check").await;
        turn(&backend, &mut s, "2024-12-25").await;
        turn(&backend, &mut s, "14:00").await;
        let reply = turn(&backend, &mut s, "no thanks").await;
        assert_eq!(s.state, DialogueState::Completed);
        assert!(reply.contains("Goodbye"));
        // no booking call was made
        assert!(!backend
            .calls()
            .iter()
            .any(|c| c.starts_with("appointment_saved")));
    }

    #[tokio::test]
    async fn test_cancel_flow_invokes_only_after_both_slots() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "cancel my appointment").await;
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Name }
        );

        turn(&backend, &mut s, "Jane Doe").await;
        assert!(backend.calls().is_empty());

        let reply = turn(&backend, &mut s, "2024-12-25").await;
        assert_eq!(backend.calls(), vec!["cancel_appointment Jane Doe 2024-12-25"]);
        assert!(reply.contains("cancelled"));
        assert_eq!(s.state, DialogueState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_not_found_still_completes() {
        let mut backend = MockBackend::new();
        backend.cancel_result = false;
        let mut s = session();

        turn(&backend, &mut s, "cancel").await;
        turn(&backend, &mut s, "Jane Doe").await;
        let reply = turn(&backend, &mut s, "2024-12-25").await;
        assert!(reply.contains("couldn't find"));
        assert_eq!(s.state, DialogueState::Completed);
    }

    #[tokio::test]
    async fn test_backend_failure_offers_retry() {
        let mut backend = MockBackend::new();
        backend.failing = Some(ToolName::GetFreeSlots);
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        let reply = turn(&backend, &mut s, "12/25").await;
        assert!(reply.contains("try again"));
        assert!(matches!(s.state, DialogueState::Failed { .. }));

        // no automatic retry happened
        assert_eq!(backend.calls().len(), 1);

        // an unclear answer re-asks instead of retrying
        let reply = turn(&backend, &mut s, "hmm").await;
        assert!(reply.contains("(yes/no)"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure_succeeds() {
        let mut backend = MockBackend::new();
        backend.failing = Some(ToolName::GetFreeSlots);
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;

        backend.failing = None;
        let reply = turn(&backend, &mut s, "yes").await;
        assert!(reply.contains("available slots"));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Time }
        );
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_abandon_after_failure_ends_flow() {
        let mut backend = MockBackend::new();
        backend.failing = Some(ToolName::CancelAppointment);
        let mut s = session();

        turn(&backend, &mut s, "cancel").await;
        turn(&backend, &mut s, "Jane Doe").await;
        turn(&backend, &mut s, "2024-12-25").await;
        assert!(matches!(s.state, DialogueState::Failed { .. }));

        let reply = turn(&backend, &mut s, "no").await;
        assert_eq!(s.state, DialogueState::Completed);
        assert!(reply.contains("Goodbye"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_start_over_resets_mid_flow() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        turn(&backend, &mut s, "12/25").await;
        let reply = turn(&backend, &mut s, "let's start over").await;
        assert!(reply.contains("start fresh"));
        assert_eq!(s.state, DialogueState::IntentSelection);
        assert_eq!(s.intent, None);
        assert!(s.slots.date.is_none());
        assert!(s.offered_times.is_empty());
    }

    #[tokio::test]
    async fn test_completed_session_accepts_a_new_flow() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "cancel").await;
        turn(&backend, &mut s, "Jane Doe").await;
        turn(&backend, &mut s, "2024-12-25").await;
        assert_eq!(s.state, DialogueState::Completed);

        turn(&backend, &mut s, "book").await;
        assert_eq!(s.intent, Some(Intent::Book));
        assert_eq!(
            s.state,
            DialogueState::Collecting { slot: SlotKey::Date }
        );
    }

    #[tokio::test]
    async fn test_year_defaulting_happens_at_validation_time() {
        let backend = MockBackend::new();
        let mut s = session();

        turn(&backend, &mut s, "book").await;
        let reply = process_turn(&backend, &mut s, "03-15", &ValidationContext::new(2026))
            .await
            .unwrap();
        assert!(reply.contains("2026-03-15"));
        assert_eq!(s.slots.date.map(|d| d.year()), Some(2026));
    }
}

