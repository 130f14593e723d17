use thiserror::Error;

use crate::domain::booking::{BookingId, BookingStatus};
use crate::domain::client::ClientId;
use crate::domain::trip::TripId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("trip {0} not found")]
    TripNotFound(TripId),
    #[error("client {0} not found")]
    ClientNotFound(ClientId),
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),
    #[error("booking {0} is not attached to a trip")]
    BookingWithoutTrip(BookingId),
    #[error("booking {booking_id} does not belong to trip {trip_id}")]
    TripMismatch { booking_id: BookingId, trip_id: TripId },
    #[error("passengers_count must be > 0 (got {0})")]
    InvalidPassengerCount(i64),
    #[error("seats must be > 0 (got {0})")]
    InvalidSeatCount(u32),
    #[error("invalid booking {booking_id} transition from {from:?} to {to:?}")]
    InvalidBookingTransition { booking_id: BookingId, from: BookingStatus, to: BookingStatus },
    #[error("not enough available seats on trip {trip_id}: requested {requested}, available {available}")]
    InsufficientSeats { trip_id: TripId, requested: u32, available: u32 },
}

impl DomainError {
    /// Stable machine-readable class used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TripNotFound(_) | Self::ClientNotFound(_) | Self::BookingNotFound(_) => {
                "not_found"
            }
            Self::BookingWithoutTrip(_) | Self::TripMismatch { .. } => "dangling_reference",
            Self::InvalidPassengerCount(_) | Self::InvalidSeatCount(_) => "invalid_argument",
            Self::InvalidBookingTransition { .. } => "invalid_state",
            Self::InsufficientSeats { .. } => "insufficient_capacity",
        }
    }
}
