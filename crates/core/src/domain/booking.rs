use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::client::ClientId;
use crate::domain::trip::{Trip, TripId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

impl std::fmt::Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub client_id: Option<ClientId>,
    pub trip_id: Option<TripId>,
    pub status: BookingStatus,
    pub passengers_count: u32,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self.status, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidBookingTransition { booking_id: self.id, from: self.status, to: next })
    }

    /// Confirms the booking against its trip, taking `passengers_count` seats when the
    /// trip tracks capacity. On error neither the booking nor the trip is modified.
    pub fn confirm(&mut self, trip: &mut Trip) -> Result<(), DomainError> {
        if !self.can_transition_to(BookingStatus::Confirmed) {
            return Err(DomainError::InvalidBookingTransition {
                booking_id: self.id,
                from: self.status,
                to: BookingStatus::Confirmed,
            });
        }
        if self.trip_id != Some(trip.id) {
            return Err(DomainError::TripMismatch { booking_id: self.id, trip_id: trip.id });
        }

        trip.reserve_seats(self.passengers_count)?;
        self.status = BookingStatus::Confirmed;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.transition_to(BookingStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBooking {
    pub client_id: ClientId,
    pub trip_id: TripId,
    pub passengers_count: i64,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn validated_passengers(&self) -> Result<u32, DomainError> {
        if self.passengers_count <= 0 {
            return Err(DomainError::InvalidPassengerCount(self.passengers_count));
        }
        u32::try_from(self.passengers_count)
            .map_err(|_| DomainError::InvalidPassengerCount(self.passengers_count))
    }
}
