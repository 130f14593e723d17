use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Connection, Row};
use tracing::info;

use tripdesk_core::domain::booking::{Booking, BookingId, BookingStatus, NewBooking};
use tripdesk_core::domain::client::ClientId;
use tripdesk_core::domain::trip::TripId;
use tripdesk_core::errors::DomainError;

use super::session::{format_timestamp, parse_timestamp, parse_u32, SqlSession};
use super::trip::{trip_from_row, TRIP_COLUMNS};
use super::{BookingRepository, RepositoryError};

const BOOKING_COLUMNS: &str =
    "id, client_id, trip_id, status, passengers_count, contact_phone, notes, created_at";

#[async_trait::async_trait]
impl BookingRepository for SqlSession {
    async fn find_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(booking_from_row).transpose()
    }

    async fn create_booking(&mut self, request: NewBooking) -> Result<Booking, RepositoryError> {
        let passengers_count = request.validated_passengers()?;

        let client_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ?)")
                .bind(request.client_id.0)
                .fetch_one(&mut *self.conn)
                .await?;
        if !client_exists {
            return Err(DomainError::ClientNotFound(request.client_id).into());
        }

        let trip_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trips WHERE id = ?)")
                .bind(request.trip_id.0)
                .fetch_one(&mut *self.conn)
                .await?;
        if !trip_exists {
            return Err(DomainError::TripNotFound(request.trip_id).into());
        }

        let result = sqlx::query(
            "INSERT INTO bookings (
                client_id,
                trip_id,
                status,
                passengers_count,
                contact_phone,
                notes,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.client_id.0)
        .bind(request.trip_id.0)
        .bind(BookingStatus::Pending.as_str())
        .bind(i64::from(passengers_count))
        .bind(request.contact_phone.as_deref())
        .bind(request.notes.as_deref())
        .bind(format_timestamp(Utc::now()))
        .execute(&mut *self.conn)
        .await?;

        let id = BookingId(result.last_insert_rowid());
        self.find_booking(id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("booking {id} missing after insert")))
    }

    async fn confirm_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let Some(row) =
            sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };
        let mut booking = booking_from_row(row)?;

        if !booking.can_transition_to(BookingStatus::Confirmed) {
            return Err(DomainError::InvalidBookingTransition {
                booking_id: booking.id,
                from: booking.status,
                to: BookingStatus::Confirmed,
            }
            .into());
        }
        let trip_id = booking.trip_id.ok_or(DomainError::BookingWithoutTrip(booking.id))?;
        let mut trip = sqlx::query(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"))
            .bind(trip_id.0)
            .fetch_optional(&mut *tx)
            .await?
            .map(trip_from_row)
            .transpose()?
            .ok_or(DomainError::TripNotFound(trip_id))?;

        let seats_before = trip.available_seats;
        booking.confirm(&mut trip)?;

        if trip.available_seats != seats_before {
            sqlx::query("UPDATE trips SET available_seats = ? WHERE id = ?")
                .bind(trip.available_seats.map(i64::from))
                .bind(trip.id.0)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
            .bind(booking.status.as_str())
            .bind(booking.id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            event_name = "db.booking.confirmed",
            booking_id = booking.id.0,
            trip_id = trip.id.0,
            passengers_count = booking.passengers_count,
            remaining_seats = ?trip.available_seats,
            "booking confirmed"
        );
        Ok(Some(booking))
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let Some(mut booking) = self.find_booking(id).await? else {
            return Ok(None);
        };
        booking.cancel()?;

        sqlx::query("UPDATE bookings SET status = ? WHERE id = ? AND status = ?")
            .bind(booking.status.as_str())
            .bind(booking.id.0)
            .bind(BookingStatus::Pending.as_str())
            .execute(&mut *self.conn)
            .await?;

        Ok(Some(booking))
    }
}

fn booking_from_row(row: SqliteRow) -> Result<Booking, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = BookingStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown booking status `{status_raw}`")))?;

    Ok(Booking {
        id: BookingId(row.try_get("id")?),
        client_id: row.try_get::<Option<i64>, _>("client_id")?.map(ClientId),
        trip_id: row.try_get::<Option<i64>, _>("trip_id")?.map(TripId),
        status,
        passengers_count: parse_u32("passengers_count", row.try_get("passengers_count")?)?,
        contact_phone: row.try_get("contact_phone")?,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
