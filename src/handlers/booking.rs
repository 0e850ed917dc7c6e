use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::info;

use crate::handlers::AppState;
use crate::models::BookingRequest;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

pub async fn book_tickets(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Response, AppError> {
    request.validate()?;

    // Reject unknown users and events with a 404 before entering the locked
    // protocol.
    let user = state.bookings.get_user(request.user_id).await?;
    let event = state.events.get_event(request.event_id).await?;

    info!(
        user_id = user.id,
        user_email = %user.email,
        event_id = request.event_id,
        event_name = %event.name,
        quantity = request.quantity,
        "Booking attempt started"
    );

    let booking = state.bookings.book(&request).await?;

    Ok(created(
        booking,
        "Tickets booked successfully. Please complete payment within 15 minutes.",
    )
    .into_response())
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Response, AppError> {
    let booking = state.bookings.get_booking(booking_id).await?;

    Ok(success(booking, "Booking retrieved").into_response())
}

pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Response, AppError> {
    state.bookings.confirm(booking_id).await?;

    Ok(empty_success("Booking confirmed successfully").into_response())
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<i32>,
) -> Result<Response, AppError> {
    state.bookings.cancel(booking_id).await?;

    Ok(empty_success("Booking cancelled successfully").into_response())
}
