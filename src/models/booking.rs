use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::error::AppError;

pub const MAX_BOOKING_QUANTITY: i32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i32,
    pub user_id: i32,
    pub event_id: i32,
    pub ticket_ids: Vec<i32>,
    pub quantity: i32,
    pub total_amount: Decimal,
    pub status: String,
    pub booking_ref: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub user_id: i32,
    pub event_id: i32,
    pub quantity: i32,
}

impl BookingRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.user_id <= 0 {
            return Err(AppError::Validation("A valid user ID is required".to_string()));
        }
        if self.event_id <= 0 {
            return Err(AppError::Validation(
                "A valid event ID is required".to_string(),
            ));
        }
        if self.quantity < 1 || self.quantity > MAX_BOOKING_QUANTITY {
            return Err(AppError::Validation(format!(
                "Quantity must be between 1 and {MAX_BOOKING_QUANTITY}"
            )));
        }
        Ok(())
    }
}

/// Bookings are terminal once confirmed, cancelled, or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}
