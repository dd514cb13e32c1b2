use chrono::{Datelike, Local, NaiveDate, NaiveTime};

/// Why a single piece of user input was rejected. `Display` doubles as the
/// re-prompt sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotRejection {
    #[error("{0:?} doesn't seem to be a real calendar date. Could you give me the date again, like 2025-03-15 or 12/25?")]
    InvalidDate(String),

    #[error("I couldn't read {0:?} as a time. Could you give me the time again, like 14:00 or 2:30 pm?")]
    InvalidTime(String),

    #[error("I didn't catch that. Could you say it again?")]
    EmptyValue,

    #[error("{0} isn't one of the free slots I listed. Please pick a time from that list.")]
    SlotNotOffered(String),
}

/// Time context threaded into date validation so "assume the current year"
/// is explicit and testable rather than a hidden clock read.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    pub current_year: i32,
}

impl ValidationContext {
    pub fn new(current_year: i32) -> Self {
        ValidationContext { current_year }
    }

    pub fn from_today() -> Self {
        ValidationContext {
            current_year: Local::now().year(),
        }
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y", "%m/%d/%Y"];
const TIME_FORMATS_24H: [&str; 2] = ["%H:%M", "%H.%M"];
const TIME_FORMATS_12H: [&str; 4] = ["%I:%M %p", "%I:%M%p", "%I %p", "%I%p"];

/// Parses a calendar date. Year-less `MM-DD` / `MM/DD` input gets the
/// context's current year. Dates that don't exist on the calendar
/// (Feb 30, day 31 of a 30-day month) are rejected, never corrected.
pub fn validate_date(raw: &str, ctx: &ValidationContext) -> Result<NaiveDate, SlotRejection> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SlotRejection::EmptyValue);
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    if let Some((month, day)) = parse_month_day(s) {
        return NaiveDate::from_ymd_opt(ctx.current_year, month, day)
            .ok_or_else(|| SlotRejection::InvalidDate(s.to_string()));
    }

    Err(SlotRejection::InvalidDate(s.to_string()))
}

fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let parts: Vec<&str> = s.split(['-', '/']).collect();
    if parts.len() != 2 {
        return None;
    }
    let month: u32 = parts[0].trim().parse().ok()?;
    let day: u32 = parts[1].trim().parse().ok()?;
    Some((month, day))
}

/// Parses a time of day, 24h or 12h forms.
pub fn validate_time(raw: &str) -> Result<NaiveTime, SlotRejection> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SlotRejection::EmptyValue);
    }

    for fmt in TIME_FORMATS_24H {
        if let Ok(time) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(time);
        }
    }

    // chrono's %p wants AM/PM
    let upper = s.to_uppercase();
    for fmt in TIME_FORMATS_12H {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, fmt) {
            return Ok(time);
        }
    }

    Err(SlotRejection::InvalidTime(s.to_string()))
}

/// Free-text slots (name, purpose): trimmed, must be non-empty.
pub fn validate_text(raw: &str) -> Result<String, SlotRejection> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SlotRejection::EmptyValue);
    }
    Ok(s.to_string())
}
