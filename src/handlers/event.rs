use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::info;

use crate::handlers::{AppState, Pagination, TicketQuery};
use crate::models::CreateEventRequest;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

const AVAILABLE_TICKETS_DEFAULT_LIMIT: i64 = 50;
const AVAILABLE_TICKETS_MAX_LIMIT: i64 = 100;
const ALL_TICKETS_DEFAULT_LIMIT: i64 = 200;
const ALL_TICKETS_MAX_LIMIT: i64 = 500;

pub async fn list_events(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Response, AppError> {
    let events = state
        .events
        .list_events(pagination.limit(), pagination.offset())
        .await?;

    Ok(success(events, "Events retrieved").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Response, AppError> {
    let event = state.events.get_event(event_id).await?;

    Ok(success(event, "Event retrieved").into_response())
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    request.validate(Utc::now())?;

    let event = state.events.create_event(&request).await?;

    Ok(created(event, "Event created successfully").into_response())
}

pub async fn list_available_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(query): Query<TicketQuery>,
) -> Result<Response, AppError> {
    let limit = query.limit_or(AVAILABLE_TICKETS_DEFAULT_LIMIT, AVAILABLE_TICKETS_MAX_LIMIT);
    let tickets = state.events.list_available_tickets(event_id, limit).await?;

    Ok(success(tickets, "Available tickets retrieved").into_response())
}

pub async fn list_all_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(query): Query<TicketQuery>,
) -> Result<Response, AppError> {
    let limit = query.limit_or(ALL_TICKETS_DEFAULT_LIMIT, ALL_TICKETS_MAX_LIMIT);
    let tickets = state.events.list_all_tickets(event_id, limit).await?;

    Ok(success(tickets, "Tickets retrieved").into_response())
}

pub async fn lock_seat(
    State(state): State<AppState>,
    Path((event_id, seat_no)): Path<(i32, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let session_tag = headers
        .get("x-session-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("anonymous");

    state.events.hold_seat(event_id, &seat_no, session_tag).await?;

    Ok(empty_success("Seat locked temporarily").into_response())
}

pub async fn unlock_seat(
    State(state): State<AppState>,
    Path((event_id, seat_no)): Path<(i32, String)>,
) -> Result<Response, AppError> {
    state.events.release_seat(event_id, &seat_no).await?;

    info!(event_id, seat_no = %seat_no, "Seat unlock requested");

    Ok(empty_success("Seat unlocked").into_response())
}
