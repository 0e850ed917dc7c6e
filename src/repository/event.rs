use std::time::Duration;

use sqlx::{PgPool, QueryBuilder};
use tracing::{debug, info};

use crate::db::{self, PgTx};
use crate::models::{CreateEventRequest, Event, Ticket, TicketStatus};
use crate::utils::error::AppError;

/// Per-seat state changes and queries for a single event. All contended
/// transitions run under a `FOR UPDATE` row lock on the ticket.
#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
    hold_ttl: Duration,
}

/// Sequential opaque seat identifiers: `S001`, `S002`, ...
pub fn seat_label(index: i32) -> String {
    format!("S{index:03}")
}

impl EventRepository {
    pub fn new(pool: PgPool, hold_ttl: Duration) -> Self {
        Self { pool, hold_ttl }
    }

    pub async fn get_event(&self, event_id: i32) -> Result<Event, AppError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, description, venue, start_time, end_time, \
                    total_tickets, available_tickets, price, created_at, updated_at \
             FROM events \
             WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;

        Ok(event)
    }

    pub async fn list_events(&self, limit: i64, offset: i64) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, name, description, venue, start_time, end_time, \
                    total_tickets, available_tickets, price, created_at, updated_at \
             FROM events \
             ORDER BY start_time ASC \
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Creates the event together with one `available` ticket per seat, all
    /// in one transaction, so inventory is never observable half-built.
    pub async fn create_event(&self, request: &CreateEventRequest) -> Result<Event, AppError> {
        let request = request.clone();

        let event = db::with_tx(&self.pool, move |tx| {
            Box::pin(create_event_in_tx(tx, request))
        })
        .await?;

        info!(
            event_id = event.id,
            event_name = %event.name,
            total_tickets = event.total_tickets,
            "Event created successfully"
        );

        Ok(event)
    }

    pub async fn list_available_tickets(
        &self,
        event_id: i32,
        limit: i64,
    ) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT id, event_id, seat_no, status, created_at, updated_at \
             FROM tickets \
             WHERE event_id = $1 AND status = 'available' \
             ORDER BY seat_no \
             LIMIT $2",
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    pub async fn list_all_tickets(
        &self,
        event_id: i32,
        limit: i64,
    ) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT id, event_id, seat_no, status, created_at, updated_at \
             FROM tickets \
             WHERE event_id = $1 \
             ORDER BY seat_no \
             LIMIT $2",
        )
        .bind(event_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Places a temporary hold on a seat. The session tag is logged for
    /// observability only; holds are not bound to the session that placed
    /// them, so any later reservation on the event may consume them.
    pub async fn hold_seat(
        &self,
        event_id: i32,
        seat_no: &str,
        session_tag: &str,
    ) -> Result<(), AppError> {
        let seat_no = seat_no.to_string();
        let session_tag = session_tag.to_string();

        db::with_tx(&self.pool, move |tx| {
            Box::pin(hold_seat_in_tx(tx, event_id, seat_no, session_tag))
        })
        .await
    }

    /// Releases a held seat back to `available`. Idempotent: releasing a
    /// seat that is not held is a no-op.
    pub async fn release_seat(&self, event_id: i32, seat_no: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE tickets \
             SET status = 'available', updated_at = NOW() \
             WHERE event_id = $1 AND seat_no = $2 AND status = 'held'",
        )
        .bind(event_id)
        .bind(seat_no)
        .execute(&self.pool)
        .await?;

        info!(event_id, seat_no, "Seat released");

        Ok(())
    }

    /// Flips `held` tickets whose last update is older than the hold TTL
    /// back to `available`. Returns how many were reclaimed.
    pub async fn reclaim_stale_holds(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE tickets \
             SET status = 'available', updated_at = NOW() \
             WHERE status = 'held' AND updated_at < NOW() - make_interval(secs => $1)",
        )
        .bind(self.hold_ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

async fn create_event_in_tx(
    tx: &mut PgTx,
    request: CreateEventRequest,
) -> Result<Event, AppError> {
    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events \
            (name, description, venue, start_time, end_time, total_tickets, available_tickets, price) \
         VALUES ($1, $2, $3, $4, $5, $6, $6, $7) \
         RETURNING id, name, description, venue, start_time, end_time, \
                   total_tickets, available_tickets, price, created_at, updated_at",
    )
    .bind(&request.name)
    .bind(&request.description)
    .bind(&request.venue)
    .bind(request.start_time)
    .bind(request.end_time)
    .bind(request.total_tickets)
    .bind(request.price)
    .fetch_one(&mut **tx)
    .await?;

    let mut builder: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new("INSERT INTO tickets (event_id, seat_no) ");
    builder.push_values(1..=event.total_tickets, |mut row, index| {
        row.push_bind(event.id).push_bind(seat_label(index));
    });
    builder.build().execute(&mut **tx).await?;

    Ok(event)
}

async fn hold_seat_in_tx(
    tx: &mut PgTx,
    event_id: i32,
    seat_no: String,
    session_tag: String,
) -> Result<(), AppError> {
    debug!(event_id, seat_no = %seat_no, session = %session_tag, "Attempting to hold seat");

    let current_status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM tickets WHERE event_id = $1 AND seat_no = $2 FOR UPDATE",
    )
    .bind(event_id)
    .bind(&seat_no)
    .fetch_optional(&mut **tx)
    .await?;

    let current_status = current_status.ok_or_else(|| {
        AppError::NotFound(format!("Seat {seat_no} not found for event {event_id}"))
    })?;

    if current_status != TicketStatus::Available.as_str() {
        return Err(AppError::Conflict(format!(
            "Seat is no longer available (current status: {current_status})"
        )));
    }

    let result = sqlx::query(
        "UPDATE tickets SET status = 'held', updated_at = NOW() \
         WHERE event_id = $1 AND seat_no = $2",
    )
    .bind(event_id)
    .bind(&seat_no)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Seat was just taken by another user".to_string(),
        ));
    }

    info!(event_id, seat_no = %seat_no, session = %session_tag, "Seat held temporarily");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_labels_are_zero_padded() {
        assert_eq!(seat_label(1), "S001");
        assert_eq!(seat_label(42), "S042");
        assert_eq!(seat_label(96), "S096");
        assert_eq!(seat_label(999), "S999");
    }

    #[test]
    fn test_seat_labels_grow_past_three_digits() {
        assert_eq!(seat_label(1000), "S1000");
        assert_eq!(seat_label(10_000), "S10000");
    }

    #[test]
    fn test_seat_labels_sort_in_seat_order_within_padding() {
        let labels: Vec<String> = (1..=999).map(seat_label).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }
}
