use crate::models::{Intent, Session, SlotKey, SlotValues};
use crate::services::validate::{self, SlotRejection, ValidationContext};

/// The slots each flow needs, in the order they are asked for.
pub fn required_slots(intent: Intent) -> &'static [SlotKey] {
    match intent {
        Intent::Book => &[SlotKey::Date, SlotKey::Time, SlotKey::Purpose, SlotKey::Name],
        Intent::Check => &[SlotKey::Date, SlotKey::Time],
        Intent::Cancel => &[SlotKey::Name, SlotKey::Date],
    }
}

/// First required slot not yet filled, in flow order.
pub fn next_missing(intent: Intent, slots: &SlotValues) -> Option<SlotKey> {
    required_slots(intent)
        .iter()
        .copied()
        .find(|key| !slots.is_filled(*key))
}

/// Validates `raw` for `key` and writes it into the session on success.
/// In the Book flow a time that is not among the offered free slots is
/// rejected with `SlotNotOffered`; no value is written on any rejection.
pub fn fill(
    session: &mut Session,
    key: SlotKey,
    raw: &str,
    ctx: &ValidationContext,
) -> Result<(), SlotRejection> {
    match key {
        SlotKey::Date => {
            session.slots.date = Some(validate::validate_date(raw, ctx)?);
        }
        SlotKey::Time => {
            let time = validate::validate_time(raw)?;
            if session.intent == Some(Intent::Book) && !session.offered_times.contains(&time) {
                return Err(SlotRejection::SlotNotOffered(
                    time.format("%H:%M").to_string(),
                ));
            }
            session.slots.time = Some(time);
        }
        SlotKey::Purpose => {
            session.slots.purpose = Some(validate::validate_text(raw)?);
        }
        SlotKey::Name => {
            session.slots.name = Some(validate::validate_text(raw)?);
        }
    }
    Ok(())
}
