use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: i32,
    pub event_id: i32,
    pub seat_no: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seat lifecycle: `available → held → reserved → sold`. A held seat falls
/// back to `available` on release or reap; a reserved seat falls back on
/// cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Available,
    Held,
    Reserved,
    Sold,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Available => "available",
            TicketStatus::Held => "held",
            TicketStatus::Reserved => "reserved",
            TicketStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TicketStatus::Available),
            "held" => Ok(TicketStatus::Held),
            "reserved" => Ok(TicketStatus::Reserved),
            "sold" => Ok(TicketStatus::Sold),
            other => Err(format!("unknown ticket status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TicketStatus::Available,
            TicketStatus::Held,
            TicketStatus::Reserved,
            TicketStatus::Sold,
        ] {
            assert_eq!(status.as_str().parse::<TicketStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("locked".parse::<TicketStatus>().is_err());
        assert!("".parse::<TicketStatus>().is_err());
    }
}
