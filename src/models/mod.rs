pub mod booking;
pub mod event;
pub mod ticket;
pub mod user;

pub use booking::{Booking, BookingRequest, BookingStatus};
pub use event::{CreateEventRequest, Event};
pub use ticket::{Ticket, TicketStatus};
pub use user::User;
