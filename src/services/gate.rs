use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};

use crate::models::{Session, SlotKey, ToolName};

/// Slots that must be filled and validated before the named tool may be
/// invoked. This table is the single source of truth for call readiness.
pub fn required_args(tool: ToolName) -> &'static [SlotKey] {
    match tool {
        ToolName::GetFreeSlots => &[SlotKey::Date],
        ToolName::AppointmentSaved => {
            &[SlotKey::Date, SlotKey::Time, SlotKey::Purpose, SlotKey::Name]
        }
        ToolName::CheckSlotStatus => &[SlotKey::Date, SlotKey::Time],
        ToolName::CancelAppointment => &[SlotKey::Name, SlotKey::Date],
    }
}

pub fn can_invoke(tool: ToolName, session: &Session) -> bool {
    required_args(tool)
        .iter()
        .all(|key| session.slots.is_filled(*key))
}

fn ensure_ready(tool: ToolName, session: &Session) -> anyhow::Result<()> {
    anyhow::ensure!(
        can_invoke(tool, session),
        "{} invoked with incomplete arguments (session {})",
        tool.as_str(),
        session.id,
    );
    Ok(())
}

// The builders below are the only way the engine obtains arguments for an
// external call. A missing slot here is an internal error, not a re-prompt.

pub fn free_slots_args(session: &Session) -> anyhow::Result<NaiveDate> {
    ensure_ready(ToolName::GetFreeSlots, session)?;
    session.slots.date.context("date slot missing")
}

pub fn booking_args(session: &Session) -> anyhow::Result<(NaiveDate, NaiveTime, String, String)> {
    ensure_ready(ToolName::AppointmentSaved, session)?;
    Ok((
        session.slots.date.context("date slot missing")?,
        session.slots.time.context("time slot missing")?,
        session.slots.purpose.clone().context("purpose slot missing")?,
        session.slots.name.clone().context("name slot missing")?,
    ))
}

pub fn check_args(session: &Session) -> anyhow::Result<(NaiveDate, NaiveTime)> {
    ensure_ready(ToolName::CheckSlotStatus, session)?;
    Ok((
        session.slots.date.context("date slot missing")?,
        session.slots.time.context("time slot missing")?,
    ))
}

pub fn cancel_args(session: &Session) -> anyhow::Result<(String, NaiveDate)> {
    ensure_ready(ToolName::CancelAppointment, session)?;
    Ok((
        session.slots.name.clone().context("name slot missing")?,
        session.slots.date.context("date slot missing")?,
    ))
}
