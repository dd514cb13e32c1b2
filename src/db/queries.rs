use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::Appointment;

fn appointment_from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    let date_str: String = row.get(1)?;
    let time_str: String = row.get(2)?;
    let created_at_str: String = row.get(5)?;

    Ok(Appointment {
        id: row.get(0)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        time: NaiveTime::parse_from_str(&time_str, "%H:%M").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        purpose: row.get(3)?,
        name: row.get(4)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S").map_err(
            |e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            },
        )?,
    })
}

pub fn booked_times_for_date(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<NaiveTime>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let mut stmt = conn.prepare("SELECT time FROM appointments WHERE date = ?1 ORDER BY time")?;
    let times = stmt
        .query_map(params![date_str], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(times
        .iter()
        .filter_map(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .collect())
}

/// Inserts unless the (date, time) slot is already taken. Returns the
/// number of rows written (0 when the slot was occupied).
pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<usize> {
    let count = conn.execute(
        "INSERT INTO appointments (id, date, time, purpose, name, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(date, time) DO NOTHING",
        params![
            appointment.id,
            appointment.date.format("%Y-%m-%d").to_string(),
            appointment.time.format("%H:%M").to_string(),
            appointment.purpose,
            appointment.name,
            appointment.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(count)
}

pub fn find_appointment(
    conn: &Connection,
    date: NaiveDate,
    time: NaiveTime,
) -> anyhow::Result<Option<Appointment>> {
    let result = conn
        .query_row(
            "SELECT id, date, time, purpose, name, created_at FROM appointments
             WHERE date = ?1 AND time = ?2",
            params![
                date.format("%Y-%m-%d").to_string(),
                time.format("%H:%M").to_string(),
            ],
            appointment_from_row,
        )
        .optional()?;
    Ok(result)
}

/// Removes the appointment under `name` (case-insensitive) on `date`.
/// Returns the number of rows removed.
pub fn delete_appointment(conn: &Connection, name: &str, date: NaiveDate) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM appointments WHERE date = ?1 AND lower(name) = lower(?2)",
        params![date.format("%Y-%m-%d").to_string(), name.trim()],
    )?;
    Ok(count)
}

pub fn list_appointments(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, date, time, purpose, name, created_at FROM appointments
         ORDER BY date, time LIMIT ?1",
    )?;
    let appointments = stmt
        .query_map(params![limit], appointment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(appointments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::Utc;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn appointment(date: &str, time: &str, name: &str) -> Appointment {
        Appointment {
            id: uuid::Uuid::new_v4().to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            purpose: "checkup".to_string(),
            name: name.to_string(),
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_create_and_find() {
        let conn = setup_db();
        let appt = appointment("2025-06-16", "10:00", "Jane Doe");
        assert_eq!(create_appointment(&conn, &appt).unwrap(), 1);

        let found = find_appointment(&conn, appt.date, appt.time).unwrap().unwrap();
        assert_eq!(found.name, "Jane Doe");
        assert_eq!(found.purpose, "checkup");

        let other_time = NaiveTime::parse_from_str("11:00", "%H:%M").unwrap();
        assert!(find_appointment(&conn, appt.date, other_time).unwrap().is_none());
    }

    #[test]
    fn test_conflicting_insert_writes_nothing() {
        let conn = setup_db();
        let first = appointment("2025-06-16", "10:00", "Jane Doe");
        let second = appointment("2025-06-16", "10:00", "John Roe");

        assert_eq!(create_appointment(&conn, &first).unwrap(), 1);
        assert_eq!(create_appointment(&conn, &second).unwrap(), 0);

        let found = find_appointment(&conn, first.date, first.time).unwrap().unwrap();
        assert_eq!(found.name, "Jane Doe");
    }

    #[test]
    fn test_booked_times_sorted() {
        let conn = setup_db();
        create_appointment(&conn, &appointment("2025-06-16", "14:00", "A")).unwrap();
        create_appointment(&conn, &appointment("2025-06-16", "09:00", "B")).unwrap();
        create_appointment(&conn, &appointment("2025-06-17", "10:00", "C")).unwrap();

        let date = NaiveDate::parse_from_str("2025-06-16", "%Y-%m-%d").unwrap();
        let times = booked_times_for_date(&conn, date).unwrap();
        assert_eq!(
            times,
            vec![
                NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
                NaiveTime::parse_from_str("14:00", "%H:%M").unwrap(),
            ]
        );
    }

    #[test]
    fn test_delete_is_case_insensitive_on_name() {
        let conn = setup_db();
        let appt = appointment("2025-06-16", "10:00", "Jane Doe");
        create_appointment(&conn, &appt).unwrap();

        assert_eq!(delete_appointment(&conn, "nobody", appt.date).unwrap(), 0);
        assert_eq!(delete_appointment(&conn, "JANE DOE", appt.date).unwrap(), 1);
        assert!(find_appointment(&conn, appt.date, appt.time).unwrap().is_none());
    }

    #[test]
    fn test_list_appointments() {
        let conn = setup_db();
        create_appointment(&conn, &appointment("2025-06-17", "10:00", "B")).unwrap();
        create_appointment(&conn, &appointment("2025-06-16", "10:00", "A")).unwrap();

        let all = list_appointments(&conn, 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "A");
    }
}
