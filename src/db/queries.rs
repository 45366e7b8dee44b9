use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, NewBooking, TimeRange};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Message raised by the overlap triggers in the bookings migration.
const SLOT_CONFLICT_MARKER: &str = "booking_slot_conflict";

const BOOKING_COLUMNS: &str =
    "id, user_id, court_id, booking_date, start_time, end_time, status, created_at, updated_at";

// ── Reads ──

pub fn get_booking_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Booking>> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        parse_booking_row,
    )
    .optional()
}

/// All bookings, or only those owned by `owner` when given.
pub fn list_bookings(conn: &Connection, owner: Option<i64>) -> rusqlite::Result<Vec<Booking>> {
    let mut bookings = vec![];
    match owner {
        Some(user_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY id ASC"
            ))?;
            for row in stmt.query_map(params![user_id], parse_booking_row)? {
                bookings.push(row?);
            }
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY id ASC"))?;
            for row in stmt.query_map([], parse_booking_row)? {
                bookings.push(row?);
            }
        }
    }
    Ok(bookings)
}

/// Confirmed bookings for one court across an inclusive date range.
pub fn confirmed_bookings_between(
    conn: &Connection,
    court_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> rusqlite::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE court_id = ?1 AND booking_date >= ?2 AND booking_date <= ?3 AND status = ?4
         ORDER BY booking_date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            court_id,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string(),
            BookingStatus::Confirmed.as_str(),
        ],
        parse_booking_row,
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row?);
    }
    Ok(bookings)
}

/// Id of a confirmed booking on `(court_id, date)` overlapping `range`, if any.
pub fn find_conflict(
    conn: &Connection,
    court_id: i64,
    date: NaiveDate,
    range: &TimeRange,
    exclude_id: Option<i64>,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM bookings
         WHERE court_id = ?1 AND booking_date = ?2 AND status = ?3
           AND start_time < ?4 AND end_time > ?5
           AND (?6 IS NULL OR id != ?6)
         LIMIT 1",
        params![
            court_id,
            date.format(DATE_FORMAT).to_string(),
            BookingStatus::Confirmed.as_str(),
            range.end.format(TIME_FORMAT).to_string(),
            range.start.format(TIME_FORMAT).to_string(),
            exclude_id,
        ],
        |row| row.get(0),
    )
    .optional()
}

pub fn ping(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

// ── Writes ──

/// Conflict scan and insert under one immediate transaction.
pub fn insert_booking(
    conn: &mut Connection,
    new: &NewBooking,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(existing) = find_conflict(&tx, new.court_id, new.booking_date, &new.range, None)? {
        tracing::info!(
            court_id = new.court_id,
            date = %new.booking_date,
            existing,
            "booking rejected: slot conflict"
        );
        return Err(AppError::SlotConflict);
    }

    let stamp = now.format(TIMESTAMP_FORMAT).to_string();
    tx.execute(
        "INSERT INTO bookings (user_id, court_id, booking_date, start_time, end_time, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            new.user_id,
            new.court_id,
            new.booking_date.format(DATE_FORMAT).to_string(),
            new.range.start.format(TIME_FORMAT).to_string(),
            new.range.end.format(TIME_FORMAT).to_string(),
            BookingStatus::Confirmed.as_str(),
            stamp,
        ],
    )
    .map_err(map_write_error)?;

    let id = tx.last_insert_rowid();
    let booking = get_booking_by_id(&tx, id)?
        .ok_or_else(|| AppError::Internal(format!("booking {id} vanished after insert")))?;

    tx.commit()?;
    Ok(booking)
}

/// Re-reads booking `id`, lets `apply` produce its new state, re-validates and writes it,
/// all under one immediate transaction.
pub fn modify_booking<F>(
    conn: &mut Connection,
    id: i64,
    now: NaiveDateTime,
    apply: F,
) -> Result<Booking, AppError>
where
    F: FnOnce(&Booking) -> Result<Booking, AppError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = get_booking_by_id(&tx, id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
    let mut updated = apply(&current)?;
    updated.id = current.id;
    updated.user_id = current.user_id;
    updated.created_at = current.created_at;
    updated.updated_at = now;

    let schedule_changed = updated.court_id != current.court_id
        || updated.booking_date != current.booking_date
        || updated.start_time != current.start_time
        || updated.end_time != current.end_time;
    let reactivated = updated.status == BookingStatus::Confirmed
        && current.status != BookingStatus::Confirmed;

    if schedule_changed || reactivated {
        let range = updated.time_range().ok_or(AppError::InvalidRange)?;
        if let Some(existing) =
            find_conflict(&tx, updated.court_id, updated.booking_date, &range, Some(id))?
        {
            tracing::info!(
                booking_id = id,
                court_id = updated.court_id,
                date = %updated.booking_date,
                existing,
                "update rejected: slot conflict"
            );
            return Err(AppError::SlotConflict);
        }
    }

    tx.execute(
        "UPDATE bookings
         SET court_id = ?1, booking_date = ?2, start_time = ?3, end_time = ?4, status = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            updated.court_id,
            updated.booking_date.format(DATE_FORMAT).to_string(),
            updated.start_time.format(TIME_FORMAT).to_string(),
            updated.end_time.format(TIME_FORMAT).to_string(),
            updated.status.as_str(),
            now.format(TIMESTAMP_FORMAT).to_string(),
            id,
        ],
    )
    .map_err(map_write_error)?;

    let stored = get_booking_by_id(&tx, id)?
        .ok_or_else(|| AppError::Internal(format!("booking {id} vanished during update")))?;

    tx.commit()?;
    Ok(stored)
}

/// The overlap triggers abort with a marker message; surface it as a conflict.
fn map_write_error(err: rusqlite::Error) -> AppError {
    match &err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains(SLOT_CONFLICT_MARKER) => {
            AppError::SlotConflict
        }
        _ => AppError::Database(err),
    }
}

fn parse_booking_row(row: &rusqlite::Row) -> rusqlite::Result<Booking> {
    let date_str: String = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let status = BookingStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown booking status: {status_str}").into(),
        )
    })?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        court_id: row.get(2)?,
        booking_date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .map_err(|e| conversion_error(3, e))?,
        start_time: NaiveTime::parse_from_str(&start_str, TIME_FORMAT)
            .map_err(|e| conversion_error(4, e))?,
        end_time: NaiveTime::parse_from_str(&end_str, TIME_FORMAT)
            .map_err(|e| conversion_error(5, e))?,
        status,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
            .map_err(|e| conversion_error(7, e))?,
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FORMAT)
            .map_err(|e| conversion_error(8, e))?,
    })
}

fn conversion_error(column: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::new(
            NaiveTime::parse_from_str(start, TIME_FORMAT).unwrap(),
            NaiveTime::parse_from_str(end, TIME_FORMAT).unwrap(),
        )
        .unwrap()
    }

    fn now() -> NaiveDateTime {
        date("2025-06-01").and_hms_opt(9, 0, 0).unwrap()
    }

    fn new_booking(user_id: i64, court_id: i64, day: &str, start: &str, end: &str) -> NewBooking {
        NewBooking {
            user_id,
            court_id,
            booking_date: date(day),
            range: range(start, end),
        }
    }

    #[test]
    fn test_insert_and_fetch() {
        let mut conn = setup_db();
        let booking =
            insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
                .unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.created_at, now());

        let fetched = get_booking_by_id(&conn, booking.id).unwrap().unwrap();
        assert_eq!(fetched, booking);
        assert!(get_booking_by_id(&conn, booking.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_overlapping_insert_rejected() {
        let mut conn = setup_db();
        insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
            .unwrap();

        let err =
            insert_booking(&mut conn, &new_booking(4, 1, "2025-06-10", "09:30", "10:30"), now())
                .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        // Touching, other court and other day are all fine.
        insert_booking(&mut conn, &new_booking(4, 1, "2025-06-10", "10:00", "11:00"), now())
            .unwrap();
        insert_booking(&mut conn, &new_booking(4, 2, "2025-06-10", "09:30", "10:30"), now())
            .unwrap();
        insert_booking(&mut conn, &new_booking(4, 1, "2025-06-11", "09:30", "10:30"), now())
            .unwrap();
    }

    #[test]
    fn test_trigger_blocks_overlap_that_skips_the_scan() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO bookings (user_id, court_id, booking_date, start_time, end_time, status)
             VALUES (1, 1, '2025-06-10', '09:00', '10:00', 'confirmed')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO bookings (user_id, court_id, booking_date, start_time, end_time, status)
                 VALUES (2, 1, '2025-06-10', '09:15', '09:45', 'confirmed')",
                [],
            )
            .map_err(map_write_error)
            .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        // A cancelled row never collides.
        conn.execute(
            "INSERT INTO bookings (user_id, court_id, booking_date, start_time, end_time, status)
             VALUES (2, 1, '2025-06-10', '09:15', '09:45', 'cancelled')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_find_conflict_excludes_self() {
        let mut conn = setup_db();
        let booking =
            insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
                .unwrap();

        let r = range("09:30", "10:30");
        assert_eq!(
            find_conflict(&conn, 1, date("2025-06-10"), &r, None).unwrap(),
            Some(booking.id)
        );
        assert_eq!(
            find_conflict(&conn, 1, date("2025-06-10"), &r, Some(booking.id)).unwrap(),
            None
        );
    }

    #[test]
    fn test_modify_rejects_move_onto_other_booking() {
        let mut conn = setup_db();
        insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
            .unwrap();
        let second =
            insert_booking(&mut conn, &new_booking(4, 1, "2025-06-10", "11:00", "12:00"), now())
                .unwrap();

        let err = modify_booking(&mut conn, second.id, now(), |b| {
            Ok(Booking {
                start_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                ..b.clone()
            })
        })
        .unwrap_err();
        assert!(matches!(err, AppError::SlotConflict));

        // Shifting within its own footprint is not a conflict with itself.
        let moved = modify_booking(&mut conn, second.id, now(), |b| {
            Ok(Booking {
                start_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
                ..b.clone()
            })
        })
        .unwrap();
        assert_eq!(moved.start_time, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn test_modify_rolls_back_on_apply_error() {
        let mut conn = setup_db();
        let booking =
            insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
                .unwrap();

        let err = modify_booking(&mut conn, booking.id, now(), |_| {
            Err(AppError::Validation("nope".into()))
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(get_booking_by_id(&conn, booking.id).unwrap().unwrap(), booking);
    }

    #[test]
    fn test_modify_missing_booking() {
        let mut conn = setup_db();
        let err = modify_booking(&mut conn, 42, now(), |b| Ok(b.clone())).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_list_and_range_queries() {
        let mut conn = setup_db();
        let a = insert_booking(&mut conn, &new_booking(3, 1, "2025-06-10", "09:00", "10:00"), now())
            .unwrap();
        insert_booking(&mut conn, &new_booking(4, 1, "2025-06-11", "09:00", "10:00"), now())
            .unwrap();
        insert_booking(&mut conn, &new_booking(3, 2, "2025-06-12", "09:00", "10:00"), now())
            .unwrap();
        modify_booking(&mut conn, a.id, now(), |b| {
            Ok(Booking {
                status: BookingStatus::Cancelled,
                ..b.clone()
            })
        })
        .unwrap();

        assert_eq!(list_bookings(&conn, None).unwrap().len(), 3);
        assert_eq!(list_bookings(&conn, Some(3)).unwrap().len(), 2);
        assert_eq!(list_bookings(&conn, Some(99)).unwrap().len(), 0);

        let confirmed =
            confirmed_bookings_between(&conn, 1, date("2025-06-10"), date("2025-06-12")).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].booking_date, date("2025-06-11"));
    }
}
