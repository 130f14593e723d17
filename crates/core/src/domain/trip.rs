use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripId(pub i64);

impl std::fmt::Display for TripId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A travel offer. `available_seats == None` means capacity is not tracked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub title: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub price: Option<Decimal>,
    pub available_seats: Option<u32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    /// Takes `seats` out of the remaining capacity. Untracked capacity is left untouched,
    /// and nothing is mutated when the request cannot be satisfied.
    pub fn reserve_seats(&mut self, seats: u32) -> Result<(), DomainError> {
        if seats == 0 {
            return Err(DomainError::InvalidSeatCount(0));
        }

        let Some(available) = self.available_seats else {
            return Ok(());
        };

        let remaining = available.checked_sub(seats).ok_or(DomainError::InsufficientSeats {
            trip_id: self.id,
            requested: seats,
            available,
        })?;
        self.available_seats = Some(remaining);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewTrip {
    pub title: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub price: Option<Decimal>,
    pub available_seats: Option<u32>,
    pub is_active: bool,
}

/// Search filters over the trip inventory. Origin and destination are exact matches;
/// the departure window is inclusive on both ends.
#[derive(Clone, Debug, PartialEq)]
pub struct TripQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub depart_from: Option<DateTime<Utc>>,
    pub depart_to: Option<DateTime<Utc>>,
    pub max_price: Option<Decimal>,
    pub min_seats: Option<u32>,
    pub include_inactive: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TripQuery {
    fn default() -> Self {
        Self {
            origin: None,
            destination: None,
            depart_from: None,
            depart_to: None,
            max_price: None,
            min_seats: None,
            include_inactive: false,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl TripQuery {
    pub fn listing(include_inactive: bool, limit: u32, offset: u32) -> Self {
        Self { include_inactive, limit, offset, ..Self::default() }
    }

    pub fn matches(&self, trip: &Trip) -> bool {
        if !self.include_inactive && !trip.is_active {
            return false;
        }
        if let Some(origin) = non_empty(&self.origin) {
            if trip.origin != origin {
                return false;
            }
        }
        if let Some(destination) = non_empty(&self.destination) {
            if trip.destination != destination {
                return false;
            }
        }
        if let Some(from) = self.depart_from {
            if !trip.departure_time.is_some_and(|departure| departure >= from) {
                return false;
            }
        }
        if let Some(to) = self.depart_to {
            if !trip.departure_time.is_some_and(|departure| departure <= to) {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if !trip.price.is_some_and(|price| price <= max_price) {
                return false;
            }
        }
        if let Some(min_seats) = self.min_seats {
            if !trip.available_seats.is_some_and(|seats| seats >= min_seats) {
                return false;
            }
        }
        true
    }

    pub fn origin_filter(&self) -> Option<&str> {
        non_empty(&self.origin)
    }

    pub fn destination_filter(&self) -> Option<&str> {
        non_empty(&self.destination)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{Trip, TripId, TripQuery};
    use crate::errors::DomainError;

    fn trip(seats: Option<u32>) -> Trip {
        Trip {
            id: TripId(7),
            title: "Tunis → Paris".to_string(),
            origin: "Tunis".to_string(),
            destination: "Paris".to_string(),
            departure_time: Some(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()),
            arrival_time: None,
            price: Some(Decimal::new(100, 0)),
            available_seats: seats,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reserving_exact_capacity_leaves_zero_seats() {
        let mut trip = trip(Some(3));
        trip.reserve_seats(3).expect("exact capacity should be reservable");
        assert_eq!(trip.available_seats, Some(0));
    }

    #[test]
    fn reserving_beyond_capacity_fails_without_mutation() {
        let mut trip = trip(Some(2));
        let error = trip.reserve_seats(3).expect_err("over capacity");

        assert_eq!(
            error,
            DomainError::InsufficientSeats { trip_id: TripId(7), requested: 3, available: 2 }
        );
        assert_eq!(trip.available_seats, Some(2));
    }

    #[test]
    fn untracked_capacity_is_never_decremented() {
        let mut trip = trip(None);
        trip.reserve_seats(40).expect("untracked capacity always fits");
        assert_eq!(trip.available_seats, None);
    }

    #[test]
    fn zero_seat_reservation_is_rejected() {
        let mut trip = trip(Some(2));
        assert_eq!(trip.reserve_seats(0), Err(DomainError::InvalidSeatCount(0)));
    }

    #[test]
    fn query_filters_skip_unpriced_and_untracked_trips() {
        let query = TripQuery {
            max_price: Some(Decimal::new(150, 0)),
            min_seats: Some(1),
            ..TripQuery::default()
        };

        assert!(query.matches(&trip(Some(5))));

        let mut unpriced = trip(Some(5));
        unpriced.price = None;
        assert!(!query.matches(&unpriced));

        assert!(!query.matches(&trip(None)));
    }

    #[test]
    fn query_departure_window_is_inclusive() {
        let departure = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let query = TripQuery {
            depart_from: Some(departure),
            depart_to: Some(departure),
            ..TripQuery::default()
        };
        assert!(query.matches(&trip(Some(1))));

        let mut inactive = trip(Some(1));
        inactive.is_active = false;
        assert!(!query.matches(&inactive));
        assert!(TripQuery { include_inactive: true, ..query }.matches(&inactive));
    }

    #[test]
    fn empty_location_filters_are_ignored() {
        let query = TripQuery {
            origin: Some(String::new()),
            destination: Some("Paris".to_string()),
            ..TripQuery::default()
        };
        assert!(query.matches(&trip(Some(1))));
        assert_eq!(query.origin_filter(), None);
        assert_eq!(query.destination_filter(), Some("Paris"));
    }
}
