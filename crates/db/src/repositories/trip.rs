use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use tripdesk_core::domain::trip::{NewTrip, Trip, TripId, TripQuery};

use super::session::{
    format_timestamp, parse_optional_timestamp, parse_timestamp, parse_u32, SqlSession,
};
use super::{RepositoryError, TripRepository};

pub(crate) const TRIP_COLUMNS: &str = "id, title, origin, destination, departure_time, \
     arrival_time, price, available_seats, is_active, created_at";

#[async_trait::async_trait]
impl TripRepository for SqlSession {
    async fn search_trips(&mut self, query: &TripQuery) -> Result<Vec<Trip>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {TRIP_COLUMNS} FROM trips WHERE 1 = 1"));

        if !query.include_inactive {
            builder.push(" AND is_active = 1");
        }
        if let Some(origin) = query.origin_filter() {
            builder.push(" AND origin = ").push_bind(origin.to_string());
        }
        if let Some(destination) = query.destination_filter() {
            builder.push(" AND destination = ").push_bind(destination.to_string());
        }
        if let Some(depart_from) = query.depart_from {
            builder.push(" AND departure_time >= ").push_bind(format_timestamp(depart_from));
        }
        if let Some(depart_to) = query.depart_to {
            builder.push(" AND departure_time <= ").push_bind(format_timestamp(depart_to));
        }
        if let Some(max_price) = query.max_price {
            builder
                .push(" AND price IS NOT NULL AND CAST(price AS REAL) <= CAST(")
                .push_bind(max_price.to_string())
                .push(" AS REAL)");
        }
        if let Some(min_seats) = query.min_seats {
            builder
                .push(" AND available_seats IS NOT NULL AND available_seats >= ")
                .push_bind(i64::from(min_seats));
        }

        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        let rows = builder.build().fetch_all(&mut *self.conn).await?;
        rows.into_iter().map(trip_from_row).collect()
    }

    async fn find_trip(&mut self, id: TripId) -> Result<Option<Trip>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(trip_from_row).transpose()
    }

    async fn create_trip(&mut self, trip: NewTrip) -> Result<Trip, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO trips (
                title,
                origin,
                destination,
                departure_time,
                arrival_time,
                price,
                available_seats,
                is_active,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trip.title)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.departure_time.map(format_timestamp))
        .bind(trip.arrival_time.map(format_timestamp))
        .bind(trip.price.map(|price| price.to_string()))
        .bind(trip.available_seats.map(i64::from))
        .bind(trip.is_active)
        .bind(format_timestamp(created_at))
        .execute(&mut *self.conn)
        .await?;

        let id = TripId(result.last_insert_rowid());
        self.find_trip(id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("trip {id} missing after insert")))
    }
}

pub(crate) fn trip_from_row(row: SqliteRow) -> Result<Trip, RepositoryError> {
    let price = row
        .try_get::<Option<String>, _>("price")?
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("invalid decimal in `price`: `{raw}` ({error})"))
            })
        })
        .transpose()?;
    let available_seats = row
        .try_get::<Option<i64>, _>("available_seats")?
        .map(|seats| parse_u32("available_seats", seats))
        .transpose()?;

    Ok(Trip {
        id: TripId(row.try_get("id")?),
        title: row.try_get("title")?,
        origin: row.try_get("origin")?,
        destination: row.try_get("destination")?,
        departure_time: parse_optional_timestamp("departure_time", row.try_get("departure_time")?)?,
        arrival_time: parse_optional_timestamp("arrival_time", row.try_get("arrival_time")?)?,
        price,
        available_seats,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
