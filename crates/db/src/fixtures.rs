use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use tripdesk_core::domain::trip::{NewTrip, TripQuery};

use crate::repositories::{RepositoryError, TripRepository};

struct DemoTrip {
    origin: &'static str,
    destination: &'static str,
    days_ahead: i64,
    departure_hour: u32,
    duration_hours: i64,
    price_cents: i64,
    seats: Option<u32>,
    active: bool,
}

const DEMO_TRIPS: &[DemoTrip] = &[
    DemoTrip { origin: "Tunis", destination: "Paris", days_ahead: 7, departure_hour: 9, duration_hours: 3, price_cents: 25_000, seats: Some(12), active: true },
    DemoTrip { origin: "Tunis", destination: "Paris", days_ahead: 14, departure_hour: 18, duration_hours: 3, price_cents: 19_900, seats: Some(4), active: true },
    DemoTrip { origin: "Tunis", destination: "Rome", days_ahead: 10, departure_hour: 7, duration_hours: 2, price_cents: 17_500, seats: Some(20), active: true },
    DemoTrip { origin: "Tunis", destination: "Istanbul", days_ahead: 21, departure_hour: 13, duration_hours: 3, price_cents: 32_000, seats: None, active: true },
    DemoTrip { origin: "Sousse", destination: "Djerba", days_ahead: 3, departure_hour: 8, duration_hours: 5, price_cents: 4_500, seats: Some(30), active: true },
    DemoTrip { origin: "Tunis", destination: "Madrid", days_ahead: 30, departure_hour: 11, duration_hours: 3, price_cents: 28_000, seats: Some(0), active: false },
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub trips_created: usize,
    pub skipped: bool,
}

/// Inserts the demo trip catalogue, departing relative to `today`. Does nothing when any
/// trip already exists, so running it twice is harmless.
pub async fn seed_demo_trips<S>(session: &mut S, today: DateTime<Utc>) -> Result<SeedResult, RepositoryError>
where
    S: TripRepository + ?Sized,
{
    let existing = session.search_trips(&TripQuery::listing(true, 1, 0)).await?;
    if !existing.is_empty() {
        info!(event_name = "db.fixtures.skipped", "trip catalogue already populated");
        return Ok(SeedResult { trips_created: 0, skipped: true });
    }

    let midnight = today.date_naive().and_time(NaiveTime::MIN).and_utc();
    for demo in DEMO_TRIPS {
        let departure = midnight + Duration::days(demo.days_ahead) + Duration::hours(i64::from(demo.departure_hour));
        session
            .create_trip(NewTrip {
                title: format!("{} → {}", demo.origin, demo.destination),
                origin: demo.origin.to_string(),
                destination: demo.destination.to_string(),
                departure_time: Some(departure),
                arrival_time: Some(departure + Duration::hours(demo.duration_hours)),
                price: Some(Decimal::new(demo.price_cents, 2)),
                available_seats: demo.seats,
                is_active: demo.active,
            })
            .await?;
    }

    info!(event_name = "db.fixtures.seeded", trips_created = DEMO_TRIPS.len(), "demo trips inserted");
    Ok(SeedResult { trips_created: DEMO_TRIPS.len(), skipped: false })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use tripdesk_core::domain::trip::TripQuery;

    use super::seed_demo_trips;
    use crate::repositories::{SqlSession, TripRepository};
    use crate::test_support::setup_pool;

    #[tokio::test]
    async fn seeding_is_deterministic_and_runs_once() {
        let pool = setup_pool().await;
        let mut session = SqlSession::acquire(&pool).await.expect("session");
        let today = Utc.with_ymd_and_hms(2026, 3, 1, 15, 30, 0).unwrap();

        let first = seed_demo_trips(&mut session, today).await.expect("seed");
        assert_eq!(first.trips_created, 6);
        assert!(!first.skipped);

        let second = seed_demo_trips(&mut session, today).await.expect("reseed");
        assert!(second.skipped);

        let paris = session
            .search_trips(&TripQuery { destination: Some("Paris".to_string()), ..TripQuery::default() })
            .await
            .expect("search");
        assert_eq!(paris.len(), 2);
        let earliest = paris.iter().min_by_key(|trip| trip.departure_time).expect("paris trip");
        assert_eq!(earliest.departure_time, Some(Utc.with_ymd_and_hms(2026, 3, 8, 9, 0, 0).unwrap()));
        assert_eq!(earliest.price, Some(Decimal::new(25_000, 2)));

        let active = session.search_trips(&TripQuery::listing(false, 50, 0)).await.expect("list");
        assert_eq!(active.len(), 5);

        drop(session);
        pool.close().await;
    }
}
