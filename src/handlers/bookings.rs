use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::auth::Caller;
use crate::errors::AppError;
use crate::models::{Booking, CreateBookingRequest, UpdateBookingRequest};
use crate::services::booking;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingEnvelope {
    message: &'static str,
    booking: Booking,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
}

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingEnvelope>), AppError> {
    let Json(req) = body.map_err(bad_body)?;

    let booking = booking::create_booking(&state, &caller, req, today()).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingEnvelope {
            message: "booking created",
            booking,
        }),
    ))
}

// GET /bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(booking::list_bookings(&state, &caller)?))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(booking::get_booking(&state, &caller, id)?))
}

// PUT /bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
    body: Result<Json<UpdateBookingRequest>, JsonRejection>,
) -> Result<Json<BookingEnvelope>, AppError> {
    let Json(req) = body.map_err(bad_body)?;

    let booking = booking::update_booking(&state, &caller, id, req, today()).await?;
    Ok(Json(BookingEnvelope {
        message: "booking updated",
        booking,
    }))
}

// DELETE /bookings/:id
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<BookingEnvelope>, AppError> {
    let booking = booking::cancel_booking(&state, &caller, id)?;
    Ok(Json(BookingEnvelope {
        message: "booking cancelled",
        booking,
    }))
}
