use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use super::SchedulingBackend;
use crate::config::AppConfig;
use crate::db::queries;
use crate::models::{Appointment, SlotStatus};

/// Scheduling backend over the appointments table. Free slots are the
/// configured day grid minus booked rows.
pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
    day_open: NaiveTime,
    day_close: NaiveTime,
    slot_minutes: i64,
}

impl SqliteBackend {
    pub fn new(db: Arc<Mutex<Connection>>, config: &AppConfig) -> Self {
        SqliteBackend {
            db,
            day_open: config.day_open,
            day_close: config.day_close,
            slot_minutes: config.slot_minutes.max(1),
        }
    }

    fn grid(&self) -> Vec<NaiveTime> {
        let mut times = Vec::new();
        let mut t = self.day_open;
        loop {
            if t >= self.day_close {
                break;
            }
            times.push(t);
            let next = t + Duration::minutes(self.slot_minutes);
            // NaiveTime arithmetic wraps at midnight
            if next <= t {
                break;
            }
            t = next;
        }
        times
    }
}

#[async_trait]
impl SchedulingBackend for SqliteBackend {
    async fn get_free_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>> {
        let booked = {
            let db = self.db.lock().unwrap();
            queries::booked_times_for_date(&db, date)?
        };
        Ok(self
            .grid()
            .into_iter()
            .filter(|t| !booked.contains(t))
            .collect())
    }

    async fn appointment_saved(
        &self,
        date: NaiveDate,
        time: NaiveTime,
        purpose: &str,
        name: &str,
    ) -> anyhow::Result<bool> {
        let appointment = Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            time,
            purpose: purpose.to_string(),
            name: name.to_string(),
            created_at: Utc::now().naive_utc(),
        };

        let db = self.db.lock().unwrap();
        let inserted = queries::create_appointment(&db, &appointment)?;
        Ok(inserted > 0)
    }

    async fn check_slot_status(
        &self,
        date: NaiveDate,
        time: NaiveTime,
    ) -> anyhow::Result<SlotStatus> {
        let db = self.db.lock().unwrap();
        let existing = queries::find_appointment(&db, date, time)?;
        Ok(if existing.is_some() {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        })
    }

    async fn cancel_appointment(&self, name: &str, date: NaiveDate) -> anyhow::Result<bool> {
        let db = self.db.lock().unwrap();
        let removed = queries::delete_appointment(&db, name, date)?;
        Ok(removed > 0)
    }
}
