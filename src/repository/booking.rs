use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::db::{self, PgTx};
use crate::models::{Booking, BookingRequest, BookingStatus, User};
use crate::utils::error::AppError;

/// Orchestrates the reservation protocol: claim the caller's held seats,
/// write the pending booking, and drive the confirm/cancel transitions.
/// Only `book` runs under the retry wrapper; its transaction is fully rolled
/// back on every failed attempt, so a retry starts from a clean slate.
#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
    max_retries: u32,
    retry_delay: Duration,
    booking_ttl: Duration,
}

impl BookingRepository {
    pub fn new(pool: PgPool, app: &AppConfig) -> Self {
        Self {
            pool,
            max_retries: app.max_retries,
            retry_delay: app.retry_delay,
            booking_ttl: app.booking_ttl,
        }
    }

    pub async fn book(&self, request: &BookingRequest) -> Result<Booking, AppError> {
        let pool = self.pool.clone();
        let request = request.clone();
        let booking_ttl = self.booking_ttl;

        db::with_retry(self.max_retries, self.retry_delay, move || {
            let pool = pool.clone();
            let request = request.clone();
            async move {
                db::with_tx(&pool, move |tx| Box::pin(book_in_tx(tx, request, booking_ttl)))
                    .await
            }
        })
        .await
    }

    pub async fn confirm(&self, booking_id: i32) -> Result<(), AppError> {
        db::with_tx(&self.pool, move |tx| Box::pin(confirm_in_tx(tx, booking_id))).await
    }

    pub async fn cancel(&self, booking_id: i32) -> Result<(), AppError> {
        db::with_tx(&self.pool, move |tx| Box::pin(cancel_in_tx(tx, booking_id))).await
    }

    pub async fn get_user(&self, user_id: i32) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, phone, created_at, updated_at \
             FROM users \
             WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        Ok(user)
    }

    pub async fn get_booking(&self, booking_id: i32) -> Result<Booking, AppError> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT id, user_id, event_id, ticket_ids, quantity, total_amount, \
                    status, booking_ref, expires_at, created_at, updated_at \
             FROM bookings \
             WHERE id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))?;

        Ok(booking)
    }
}

#[derive(FromRow)]
struct LockedEvent {
    id: i32,
    name: String,
    available_tickets: i32,
    price: Decimal,
    start_time: DateTime<Utc>,
}

#[derive(FromRow)]
struct ClaimedSeat {
    id: i32,
    seat_no: String,
}

#[derive(FromRow)]
struct LockedBooking {
    id: i32,
    event_id: i32,
    ticket_ids: Vec<i32>,
    quantity: i32,
    status: String,
    expires_at: DateTime<Utc>,
}

async fn book_in_tx(
    tx: &mut PgTx,
    request: BookingRequest,
    booking_ttl: Duration,
) -> Result<Booking, AppError> {
    // Step 1: lock the event row. This serializes the counter update and
    // orders the event lock before any ticket locks.
    let event: LockedEvent = sqlx::query_as(
        "SELECT id, name, available_tickets, price, start_time \
         FROM events \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(request.event_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Event {} not found", request.event_id)))?;

    // Step 2: validate event timing.
    let now = Utc::now();
    if now >= event.start_time {
        return Err(AppError::EventStarted);
    }

    // Step 3: lock the seats this user already holds. The seat_no ordering
    // is stable, so identical hold sets yield identical claims and
    // concurrent bookings acquire ticket locks in one global order.
    let claimed: Vec<ClaimedSeat> = sqlx::query_as(
        "SELECT id, seat_no \
         FROM tickets \
         WHERE event_id = $1 AND status = 'held' \
         ORDER BY seat_no \
         LIMIT $2 \
         FOR UPDATE",
    )
    .bind(request.event_id)
    .bind(request.quantity as i64)
    .fetch_all(&mut **tx)
    .await?;

    // Step 4: sufficiency check.
    if (claimed.len() as i32) < request.quantity {
        return Err(AppError::InsufficientHeld {
            need: request.quantity,
            found: claimed.len() as i32,
        });
    }

    let ticket_ids: Vec<i32> = claimed.iter().map(|seat| seat.id).collect();
    let seat_numbers: Vec<&str> = claimed.iter().map(|seat| seat.seat_no.as_str()).collect();

    // Step 5: transition the claimed seats to reserved.
    sqlx::query("UPDATE tickets SET status = 'reserved', updated_at = NOW() WHERE id = ANY($1)")
        .bind(&ticket_ids)
        .execute(&mut **tx)
        .await?;

    // Step 6: decrement the event counter under the same event lock.
    sqlx::query(
        "UPDATE events \
         SET available_tickets = available_tickets - $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(request.quantity)
    .bind(request.event_id)
    .execute(&mut **tx)
    .await?;

    // Step 7: create the pending booking.
    let total_amount = event.price * Decimal::from(request.quantity);
    let booking_ref = generate_booking_ref();
    let expires_at = now + booking_ttl;

    let booking: Booking = sqlx::query_as(
        "INSERT INTO bookings \
            (user_id, event_id, ticket_ids, quantity, total_amount, status, booking_ref, expires_at) \
         VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7) \
         RETURNING id, user_id, event_id, ticket_ids, quantity, total_amount, \
                   status, booking_ref, expires_at, created_at, updated_at",
    )
    .bind(request.user_id)
    .bind(request.event_id)
    .bind(&ticket_ids)
    .bind(request.quantity)
    .bind(total_amount)
    .bind(&booking_ref)
    .bind(expires_at)
    .fetch_one(&mut **tx)
    .await?;

    info!(
        booking_id = booking.id,
        booking_ref = %booking.booking_ref,
        user_id = request.user_id,
        event_id = event.id,
        event_name = %event.name,
        quantity = request.quantity,
        available_before = event.available_tickets,
        seat_numbers = ?seat_numbers,
        %total_amount,
        "Tickets booked successfully"
    );

    Ok(booking)
}

async fn confirm_in_tx(tx: &mut PgTx, booking_id: i32) -> Result<(), AppError> {
    let booking: LockedBooking = sqlx::query_as(
        "SELECT id, event_id, ticket_ids, quantity, status, expires_at \
         FROM bookings \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))?;

    if booking.status != BookingStatus::Pending.as_str() {
        return Err(AppError::Validation(
            "Booking is not in pending status".to_string(),
        ));
    }

    if Utc::now() > booking.expires_at {
        return Err(AppError::Expired);
    }

    let result = sqlx::query(
        "UPDATE tickets SET status = 'sold', updated_at = NOW() \
         WHERE id = ANY($1) AND status = 'reserved'",
    )
    .bind(&booking.ticket_ids)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() as usize != booking.ticket_ids.len() {
        error!(
            booking_id,
            expected = booking.ticket_ids.len(),
            affected = result.rows_affected(),
            "Mismatch in ticket confirmation count"
        );
        return Err(AppError::Inconsistent(
            "Some tickets could not be confirmed".to_string(),
        ));
    }

    sqlx::query("UPDATE bookings SET status = 'confirmed', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut **tx)
        .await?;

    info!(booking_id = booking.id, "Booking confirmed successfully");

    Ok(())
}

async fn cancel_in_tx(tx: &mut PgTx, booking_id: i32) -> Result<(), AppError> {
    let booking: LockedBooking = sqlx::query_as(
        "SELECT id, event_id, ticket_ids, quantity, status, expires_at \
         FROM bookings \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(booking_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))?;

    if booking.status == BookingStatus::Cancelled.as_str() {
        return Err(AppError::Validation(
            "Booking is already cancelled".to_string(),
        ));
    }

    // Tickets go back to available whether they were reserved or sold; an
    // administrative cancel of a confirmed booking restores inventory too.
    sqlx::query("UPDATE tickets SET status = 'available', updated_at = NOW() WHERE id = ANY($1)")
        .bind(&booking.ticket_ids)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        "UPDATE events \
         SET available_tickets = available_tickets + $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(booking.quantity)
    .bind(booking.event_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE bookings SET status = 'cancelled', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut **tx)
        .await?;

    info!(booking_id = booking.id, "Booking cancelled successfully");

    Ok(())
}

/// Printable reference that is unique without a store round trip; the unique
/// constraint on `bookings.booking_ref` backs the clock.
fn generate_booking_ref() -> String {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros());
    format!("BK{nanos}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_ref_shape() {
        let reference = generate_booking_ref();
        assert!(reference.starts_with("BK"));
        assert!(reference.len() > 2);
        assert!(reference[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_booking_refs_do_not_collide_in_sequence() {
        let mut refs: Vec<String> = (0..64).map(|_| generate_booking_ref()).collect();
        refs.sort();
        refs.dedup();
        // Every sequential read of the nanosecond clock must yield a distinct
        // reference; any duplicate means the generator degenerated.
        assert_eq!(refs.len(), 64);
    }

    #[test]
    fn test_total_amount_scales_with_quantity() {
        let price = Decimal::new(10000, 2);
        assert_eq!(price * Decimal::from(1), Decimal::new(10000, 2));
        assert_eq!(price * Decimal::from(4), Decimal::new(40000, 2));
    }
}
