use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Intent, SlotStatus};

/// The four pieces of user-supplied data the flows collect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Date,
    Time,
    Purpose,
    Name,
}

impl SlotKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::Date => "date",
            SlotKey::Time => "time",
            SlotKey::Purpose => "purpose",
            SlotKey::Name => "name",
        }
    }
}

/// Validated slot values. A `None` field has not been collected yet;
/// a `Some` field has already passed its validator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotValues {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub purpose: Option<String>,
    pub name: Option<String>,
}

impl SlotValues {
    pub fn is_filled(&self, key: SlotKey) -> bool {
        match key {
            SlotKey::Date => self.date.is_some(),
            SlotKey::Time => self.time.is_some(),
            SlotKey::Purpose => self.purpose.is_some(),
            SlotKey::Name => self.name.is_some(),
        }
    }
}

/// The four external operations the engine may invoke.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GetFreeSlots,
    AppointmentSaved,
    CheckSlotStatus,
    CancelAppointment,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetFreeSlots => "get_free_slots",
            ToolName::AppointmentSaved => "appointment_saved",
            ToolName::CheckSlotStatus => "check_slot_status",
            ToolName::CancelAppointment => "cancel_appointment",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DialogueState {
    Greeting,
    IntentSelection,
    Collecting { slot: SlotKey },
    AwaitingToolResult { tool: ToolName },
    Confirming,
    Completed,
    Failed { tool: ToolName, reason: String },
}

impl DialogueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogueState::Greeting => "greeting",
            DialogueState::IntentSelection => "intent_selection",
            DialogueState::Collecting { .. } => "collecting",
            DialogueState::AwaitingToolResult { .. } => "awaiting_tool_result",
            DialogueState::Confirming => "confirming",
            DialogueState::Completed => "completed",
            DialogueState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub intent: Option<Intent>,
    pub slots: SlotValues,
    pub state: DialogueState,
    /// Times most recently offered by `get_free_slots`. The Book flow only
    /// accepts a `time` that appears here.
    pub offered_times: Vec<NaiveTime>,
    /// An unconsumed `check_slot_status` result, held while the booking
    /// offer waits on a yes/no.
    pub pending_status: Option<SlotStatus>,
    pub last_activity: NaiveDateTime,
}

impl Session {
    pub fn new(id: String) -> Self {
        Session {
            id,
            intent: None,
            slots: SlotValues::default(),
            state: DialogueState::Greeting,
            offered_times: Vec::new(),
            pending_status: None,
            last_activity: Utc::now().naive_utc(),
        }
    }

    /// Clears everything collected so far and returns to intent selection.
    pub fn reset(&mut self) {
        self.intent = None;
        self.slots = SlotValues::default();
        self.offered_times.clear();
        self.pending_status = None;
        self.state = DialogueState::IntentSelection;
    }
}
