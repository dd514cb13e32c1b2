pub mod sqlite;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::models::SlotStatus;

/// The scheduling system the dialogue engine talks to. Implementations own
/// persistence entirely; the engine only decides when each operation may be
/// called and with what arguments.
#[async_trait]
pub trait SchedulingBackend: Send + Sync {
    /// Times still open on the given date.
    async fn get_free_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>>;

    /// Persists the appointment. `false` means the slot could not be taken
    /// (already booked in the meantime).
    async fn appointment_saved(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        purpose: &str,
        name: &str,
    ) -> anyhow::Result<bool>;

    async fn check_slot_status(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> anyhow::Result<SlotStatus>;

    /// Removes the appointment matching name and date. `false` means
    /// nothing matched.
    async fn cancel_appointment(&self, name: &str, date: NaiveDate) -> anyhow::Result<bool>;
}
