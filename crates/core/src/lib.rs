//! Tripdesk core: the travel-offer domain, its error taxonomy, and runtime configuration.
//!
//! Nothing in this crate performs I/O beyond reading configuration; persistence lives in
//! `tripdesk-db` and the conversational agent in `tripdesk-agent`.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::booking::{Booking, BookingId, BookingStatus, NewBooking};
pub use domain::client::{Client, ClientId, ClientUpdate};
pub use domain::message::{Message, MessageDirection, MessageId, NewMessage};
pub use domain::trip::{NewTrip, Trip, TripId, TripQuery, DEFAULT_PAGE_LIMIT};
pub use errors::DomainError;
