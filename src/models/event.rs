use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::error::AppError;

pub const MAX_TOTAL_TICKETS: i32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub venue: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_tickets: i32,
    pub available_tickets: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub venue: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_tickets: i32,
    pub price: Decimal,
}

impl CreateEventRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Event name is required".to_string()));
        }
        if self.start_time <= now {
            return Err(AppError::Validation(
                "Event start time cannot be in the past".to_string(),
            ));
        }
        if self.end_time <= self.start_time {
            return Err(AppError::Validation(
                "Event end time must be after start time".to_string(),
            ));
        }
        if self.total_tickets <= 0 || self.total_tickets > MAX_TOTAL_TICKETS {
            return Err(AppError::Validation(format!(
                "Total tickets must be between 1 and {MAX_TOTAL_TICKETS}"
            )));
        }
        if self.price < Decimal::ZERO {
            return Err(AppError::Validation("Price cannot be negative".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;

    fn valid_request(now: DateTime<Utc>) -> CreateEventRequest {
        CreateEventRequest {
            name: "Rust Conf".to_string(),
            description: String::new(),
            venue: "Main Hall".to_string(),
            start_time: now + Duration::days(1),
            end_time: now + Duration::days(1) + Duration::hours(3),
            total_tickets: 96,
            price: Decimal::new(10000, 2),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        let now = Utc::now();
        assert!(valid_request(now).validate(now).is_ok());
    }

    #[test]
    fn test_start_time_in_past_is_rejected() {
        let now = Utc::now();
        let mut request = valid_request(now);
        request.start_time = now - Duration::seconds(1);
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let now = Utc::now();
        let mut request = valid_request(now);
        request.end_time = request.start_time - Duration::hours(1);
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_ticket_count_bounds() {
        let now = Utc::now();

        let mut request = valid_request(now);
        request.total_tickets = 0;
        assert!(request.validate(now).is_err());

        request.total_tickets = MAX_TOTAL_TICKETS + 1;
        assert!(request.validate(now).is_err());

        request.total_tickets = MAX_TOTAL_TICKETS;
        assert!(request.validate(now).is_ok());

        request.total_tickets = 1;
        assert!(request.validate(now).is_ok());
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let now = Utc::now();
        let mut request = valid_request(now);
        request.price = Decimal::new(-1, 2);
        assert!(request.validate(now).is_err());
    }
}
