use std::env;

use chrono::NaiveTime;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Bookable day grid: slots run from `day_open` (inclusive) to
    /// `day_close` (exclusive) every `slot_minutes`.
    pub day_open: NaiveTime,
    pub day_close: NaiveTime,
    pub slot_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "frontdesk.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            day_open: time_env("DAY_OPEN", (9, 0)),
            day_close: time_env("DAY_CLOSE", (17, 0)),
            slot_minutes: env::var("SLOT_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}

fn time_env(key: &str, default: (u32, u32)) -> NaiveTime {
    env::var(key)
        .ok()
        .and_then(|v| NaiveTime::parse_from_str(&v, "%H:%M").ok())
        .or_else(|| NaiveTime::from_hms_opt(default.0, default.1, 0))
        .unwrap_or(NaiveTime::MIN)
}
