use async_trait::async_trait;
use thiserror::Error;

use tripdesk_core::domain::booking::{Booking, BookingId, NewBooking};
use tripdesk_core::domain::client::{Client, ClientId, ClientUpdate};
use tripdesk_core::domain::message::{Message, NewMessage};
use tripdesk_core::domain::trip::{NewTrip, Trip, TripId, TripQuery};
use tripdesk_core::errors::DomainError;

pub mod booking;
pub mod client;
pub mod memory;
pub mod message;
pub mod session;
pub mod trip;

pub use memory::{InMemoryInventory, InMemorySession};
pub use session::{SqlSession, SqlSessionFactory};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("session unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(error) => Some(error),
            Self::Database(_) | Self::Decode(_) | Self::Unavailable(_) => None,
        }
    }
}

#[async_trait]
pub trait ClientRepository: Send {
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, RepositoryError>;

    async fn find_client_by_identity(
        &mut self,
        channel_identity: &str,
    ) -> Result<Option<Client>, RepositoryError>;

    /// Returns the client registered for `channel_identity`, registering it first if needed.
    async fn resolve_or_create_client(
        &mut self,
        channel_identity: &str,
    ) -> Result<Client, RepositoryError>;

    async fn update_client(
        &mut self,
        id: ClientId,
        update: ClientUpdate,
    ) -> Result<Option<Client>, RepositoryError>;
}

#[async_trait]
pub trait TripRepository: Send {
    /// Newest trips first, paged by `query.limit` / `query.offset`.
    async fn search_trips(&mut self, query: &TripQuery) -> Result<Vec<Trip>, RepositoryError>;

    async fn find_trip(&mut self, id: TripId) -> Result<Option<Trip>, RepositoryError>;

    async fn create_trip(&mut self, trip: NewTrip) -> Result<Trip, RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send {
    async fn find_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;

    /// Creates a pending booking. Fails with a domain error when the passenger count is not
    /// positive or the referenced client or trip does not exist.
    async fn create_booking(&mut self, request: NewBooking) -> Result<Booking, RepositoryError>;

    /// Moves a pending booking to confirmed and takes its seats from the trip atomically.
    /// `Ok(None)` means the booking id is unknown.
    async fn confirm_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;

    async fn cancel_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send {
    async fn append_message(&mut self, message: NewMessage) -> Result<Message, RepositoryError>;

    /// Stores both halves of a turn, inbound first. Either both are stored or neither is.
    async fn append_exchange(
        &mut self,
        inbound: NewMessage,
        outbound: NewMessage,
    ) -> Result<(Message, Message), RepositoryError>;

    /// The latest `limit` messages of a client, oldest first.
    async fn recent_messages(
        &mut self,
        client_id: ClientId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError>;
}

/// One scoped data-access context. Whatever it holds is released when it is dropped.
pub trait Session: ClientRepository + TripRepository + BookingRepository + MessageRepository {}

impl<T> Session for T where
    T: ClientRepository + TripRepository + BookingRepository + MessageRepository
{
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Session>, RepositoryError>;
}
