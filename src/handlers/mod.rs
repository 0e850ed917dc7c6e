use serde::Deserialize;
use sqlx::PgPool;

use crate::repository::{BookingRepository, EventRepository};

pub mod booking;
pub mod event;
pub mod health;

pub use booking::{book_tickets, cancel_booking, confirm_booking, get_booking};
pub use event::{
    create_event, get_event, list_all_tickets, list_available_tickets, list_events, lock_seat,
    unlock_seat,
};
pub use health::{health, ready};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub events: EventRepository,
    pub bookings: BookingRepository,
}

/// Page/limit query parameters for event listings. Out-of-range values fall
/// back to the defaults rather than erroring.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    page: Option<i64>,
    limit: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        match self.page {
            Some(page) if page >= 1 => page,
            _ => 1,
        }
    }

    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(limit) if (1..=100).contains(&limit) => limit,
            _ => 20,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    limit: Option<i64>,
}

impl TicketQuery {
    pub fn limit_or(&self, default: i64, max: i64) -> i64 {
        match self.limit {
            Some(limit) if limit >= 1 && limit <= max => limit,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let pagination = Pagination::default();
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.limit(), 20);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn test_pagination_rejects_out_of_range_values() {
        let pagination = Pagination {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.limit(), 20);

        let pagination = Pagination {
            page: Some(-3),
            limit: Some(0),
        };
        assert_eq!(pagination.page(), 1);
        assert_eq!(pagination.limit(), 20);
    }

    #[test]
    fn test_pagination_offset() {
        let pagination = Pagination {
            page: Some(3),
            limit: Some(50),
        };
        assert_eq!(pagination.offset(), 100);
    }

    #[test]
    fn test_ticket_query_limits() {
        assert_eq!(TicketQuery { limit: None }.limit_or(50, 100), 50);
        assert_eq!(TicketQuery { limit: Some(75) }.limit_or(50, 100), 75);
        assert_eq!(TicketQuery { limit: Some(101) }.limit_or(50, 100), 50);
        assert_eq!(TicketQuery { limit: Some(0) }.limit_or(200, 500), 200);
        assert_eq!(TicketQuery { limit: Some(500) }.limit_or(200, 500), 500);
    }
}
