//! The booking engine: reservation lifecycle and availability.
//!
//! Remote checks run before the connection lock is taken; every
//! check-then-write runs inside one immediate transaction in `db::queries`,
//! so two overlapping requests for the same court and day cannot both commit.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;

use crate::auth::Caller;
use crate::db::queries::{self, DATE_FORMAT, TIME_FORMAT};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingStatus, CreateBookingRequest, NewBooking, OperatingWindow, Slot, TimeRange,
    UpdateBookingRequest,
};
use crate::state::AppState;

/// Per-day slot lists keyed by ISO date.
pub type AvailabilityMap = BTreeMap<String, Vec<Slot>>;

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date_start: Option<String>,
    pub date_end: Option<String>,
}

pub async fn create_booking(
    state: &AppState,
    caller: &Caller,
    req: CreateBookingRequest,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let (Some(court_id), Some(date), Some(start), Some(end)) = (
        req.court_id,
        req.booking_date.as_deref(),
        req.start_time.as_deref(),
        req.end_time.as_deref(),
    ) else {
        return Err(AppError::Validation(
            "missing required fields (court_id, booking_date, start_time, end_time)".to_string(),
        ));
    };

    let booking_date = parse_date(date)?;
    let start = parse_time(start)?;
    let end = parse_time(end)?;

    if booking_date < today {
        return Err(AppError::PastDate);
    }
    let range = TimeRange::new(start, end).ok_or(AppError::InvalidRange)?;

    state.courts.active_court(court_id, caller.token()).await?;

    let new = NewBooking {
        user_id: caller.user_id,
        court_id,
        booking_date,
        range,
    };
    let booking = {
        let mut conn = state.conn()?;
        queries::insert_booking(&mut conn, &new, now())?
    };

    tracing::info!(
        booking_id = booking.id,
        user_id = booking.user_id,
        court_id = booking.court_id,
        date = %booking.booking_date,
        "booking created"
    );
    Ok(booking)
}

pub fn list_bookings(state: &AppState, caller: &Caller) -> Result<Vec<Booking>, AppError> {
    let owner = (!caller.is_admin).then_some(caller.user_id);
    let conn = state.conn()?;
    Ok(queries::list_bookings(&conn, owner)?)
}

pub fn get_booking(state: &AppState, caller: &Caller, id: i64) -> Result<Booking, AppError> {
    let found = {
        let conn = state.conn()?;
        queries::get_booking_by_id(&conn, id)?
    };
    let booking = found.ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    caller.ensure_owner_or_admin(booking.user_id)?;
    Ok(booking)
}

pub async fn update_booking(
    state: &AppState,
    caller: &Caller,
    id: i64,
    req: UpdateBookingRequest,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    get_booking(state, caller, id)?;

    let status = req
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::parse(s).ok_or_else(|| {
                AppError::Validation(format!(
                    "invalid status '{s}', expected confirmed, cancelled or completed"
                ))
            })
        })
        .transpose()?;

    let booking_date = req.booking_date.as_deref().map(parse_date).transpose()?;
    if let Some(date) = booking_date {
        if date < today && !caller.is_admin {
            return Err(AppError::PastDate);
        }
    }
    let start = req.start_time.as_deref().map(parse_time).transpose()?;
    let end = req.end_time.as_deref().map(parse_time).transpose()?;

    if let Some(court_id) = req.court_id {
        state.courts.active_court(court_id, caller.token()).await?;
    }

    let booking = {
        let mut conn = state.conn()?;
        queries::modify_booking(&mut conn, id, now(), |current| {
            caller.ensure_owner_or_admin(current.user_id)?;

            let next = Booking {
                status: status.unwrap_or(current.status),
                court_id: req.court_id.unwrap_or(current.court_id),
                booking_date: booking_date.unwrap_or(current.booking_date),
                start_time: start.unwrap_or(current.start_time),
                end_time: end.unwrap_or(current.end_time),
                ..current.clone()
            };

            if !current.status.can_become(next.status) {
                return Err(AppError::Validation(format!(
                    "a {} booking cannot become {}",
                    current.status.as_str(),
                    next.status.as_str()
                )));
            }
            let rescheduled = next.court_id != current.court_id
                || next.booking_date != current.booking_date
                || next.start_time != current.start_time
                || next.end_time != current.end_time;
            if rescheduled && current.status.is_terminal() {
                return Err(AppError::Validation(format!(
                    "a {} booking can no longer be rescheduled",
                    current.status.as_str()
                )));
            }
            Ok(next)
        })?
    };

    tracing::info!(
        booking_id = booking.id,
        status = booking.status.as_str(),
        court_id = booking.court_id,
        date = %booking.booking_date,
        "booking updated"
    );
    Ok(booking)
}

/// Soft delete. Cancelling twice succeeds and only refreshes the timestamp.
pub fn cancel_booking(state: &AppState, caller: &Caller, id: i64) -> Result<Booking, AppError> {
    let booking = {
        let mut conn = state.conn()?;
        queries::modify_booking(&mut conn, id, now(), |current| {
            caller.ensure_owner_or_admin(current.user_id)?;
            if current.status == BookingStatus::Completed {
                return Err(AppError::Validation(
                    "a completed booking cannot be cancelled".to_string(),
                ));
            }
            Ok(Booking {
                status: BookingStatus::Cancelled,
                ..current.clone()
            })
        })?
    };

    tracing::info!(booking_id = booking.id, user_id = caller.user_id, "booking cancelled");
    Ok(booking)
}

pub async fn court_availability(
    state: &AppState,
    caller: &Caller,
    court_id: i64,
    query: AvailabilityQuery,
) -> Result<AvailabilityMap, AppError> {
    let (Some(from), Some(to)) = (query.date_start.as_deref(), query.date_end.as_deref()) else {
        return Err(AppError::Validation(
            "date_start and date_end (YYYY-MM-DD) are required".to_string(),
        ));
    };
    let from = parse_date(from)?;
    let to = parse_date(to)?;
    if from > to {
        return Err(AppError::Validation(
            "date_start must not be after date_end".to_string(),
        ));
    }
    let days = (to - from).num_days() + 1;
    if days > state.config.max_availability_days {
        return Err(AppError::Validation(format!(
            "date range spans {days} days, at most {} allowed",
            state.config.max_availability_days
        )));
    }

    state.courts.active_court(court_id, caller.token()).await?;

    let bookings = {
        let conn = state.conn()?;
        queries::confirmed_bookings_between(&conn, court_id, from, to)?
    };

    Ok(build_availability(
        &state.config.operating_window,
        from,
        to,
        &bookings,
    ))
}

/// Slot map for every day in `[from, to]`, given the confirmed bookings of one court.
pub fn build_availability(
    window: &OperatingWindow,
    from: NaiveDate,
    to: NaiveDate,
    bookings: &[Booking],
) -> AvailabilityMap {
    let mut busy: BTreeMap<NaiveDate, Vec<TimeRange>> = BTreeMap::new();
    for booking in bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Confirmed)
    {
        if let Some(range) = booking.time_range() {
            busy.entry(booking.booking_date).or_default().push(range);
        }
    }

    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let taken = busy.get(&day).map(Vec::as_slice).unwrap_or(&[]);
            (day.format(DATE_FORMAT).to_string(), window.day_slots(taken))
        })
        .collect()
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| AppError::Validation(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
        .map_err(|_| AppError::Validation(format!("invalid time '{s}', expected HH:MM")))
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}
