use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use tripdesk_core::domain::booking::{Booking, BookingId, BookingStatus, NewBooking};
use tripdesk_core::domain::client::{Client, ClientId, ClientUpdate};
use tripdesk_core::domain::message::{Message, MessageId, NewMessage};
use tripdesk_core::domain::trip::{NewTrip, Trip, TripId, TripQuery};
use tripdesk_core::errors::DomainError;

use super::{
    BookingRepository, ClientRepository, MessageRepository, RepositoryError, Session,
    SessionFactory, TripRepository,
};

#[derive(Default)]
struct InventoryState {
    clients: BTreeMap<ClientId, Client>,
    trips: BTreeMap<TripId, Trip>,
    bookings: BTreeMap<BookingId, Booking>,
    messages: Vec<Message>,
    last_id: i64,
}

impl InventoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_trip(&mut self, trip: NewTrip) -> Trip {
        let trip = Trip {
            id: TripId(self.next_id()),
            title: trip.title,
            origin: trip.origin,
            destination: trip.destination,
            departure_time: trip.departure_time,
            arrival_time: trip.arrival_time,
            price: trip.price,
            available_seats: trip.available_seats,
            is_active: trip.is_active,
            created_at: Utc::now(),
        };
        self.trips.insert(trip.id, trip.clone());
        trip
    }

    fn push_message(&mut self, message: NewMessage) -> Message {
        let message = Message {
            id: MessageId(self.next_id()),
            client_id: message.client_id,
            direction: message.direction,
            content: message.content,
            created_at: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }
}

/// Process-local inventory with the same semantics as the SQL store. Used by tests and
/// by the CLI when no database is wanted.
#[derive(Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InventoryState>>,
    open_sessions: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> InMemorySession {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        InMemorySession { state: Arc::clone(&self.state), open_sessions: Arc::clone(&self.open_sessions) }
    }

    /// Number of sessions currently alive.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `open` fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn seed_trip(&self, trip: NewTrip) -> Trip {
        self.state.write().await.insert_trip(trip)
    }

    pub async fn trip(&self, id: TripId) -> Option<Trip> {
        self.state.read().await.trips.get(&id).cloned()
    }

    pub async fn clients(&self) -> Vec<Client> {
        self.state.read().await.clients.values().cloned().collect()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.read().await.bookings.values().cloned().collect()
    }

    /// Every stored message, oldest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }
}

#[async_trait::async_trait]
impl SessionFactory for InMemoryInventory {
    async fn open(&self) -> Result<Box<dyn Session>, RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("in-memory inventory is offline".to_string()));
        }
        Ok(Box::new(self.session()))
    }
}

pub struct InMemorySession {
    state: Arc<RwLock<InventoryState>>,
    open_sessions: Arc<AtomicUsize>,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ClientRepository for InMemorySession {
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, RepositoryError> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn find_client_by_identity(
        &mut self,
        channel_identity: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.clients.values().find(|client| client.channel_identity == channel_identity).cloned())
    }

    async fn resolve_or_create_client(
        &mut self,
        channel_identity: &str,
    ) -> Result<Client, RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(client) =
            state.clients.values().find(|client| client.channel_identity == channel_identity)
        {
            return Ok(client.clone());
        }

        let client = Client {
            id: ClientId(state.next_id()),
            channel_identity: channel_identity.to_string(),
            name: None,
            phone_number: None,
            national_id: None,
            created_at: Utc::now(),
        };
        state.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn update_client(
        &mut self,
        id: ClientId,
        update: ClientUpdate,
    ) -> Result<Option<Client>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(client) = state.clients.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(client);
        Ok(Some(client.clone()))
    }
}

#[async_trait::async_trait]
impl TripRepository for InMemorySession {
    async fn search_trips(&mut self, query: &TripQuery) -> Result<Vec<Trip>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .trips
            .values()
            .rev()
            .filter(|trip| query.matches(trip))
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn find_trip(&mut self, id: TripId) -> Result<Option<Trip>, RepositoryError> {
        Ok(self.state.read().await.trips.get(&id).cloned())
    }

    async fn create_trip(&mut self, trip: NewTrip) -> Result<Trip, RepositoryError> {
        Ok(self.state.write().await.insert_trip(trip))
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemorySession {
    async fn find_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn create_booking(&mut self, request: NewBooking) -> Result<Booking, RepositoryError> {
        let passengers_count = request.validated_passengers()?;
        let mut state = self.state.write().await;
        if !state.clients.contains_key(&request.client_id) {
            return Err(DomainError::ClientNotFound(request.client_id).into());
        }
        if !state.trips.contains_key(&request.trip_id) {
            return Err(DomainError::TripNotFound(request.trip_id).into());
        }

        let booking = Booking {
            id: BookingId(state.next_id()),
            client_id: Some(request.client_id),
            trip_id: Some(request.trip_id),
            status: BookingStatus::Pending,
            passengers_count,
            contact_phone: request.contact_phone,
            notes: request.notes,
            created_at: Utc::now(),
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn confirm_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(mut booking) = state.bookings.get(&id).cloned() else {
            return Ok(None);
        };
        if !booking.can_transition_to(BookingStatus::Confirmed) {
            return Err(DomainError::InvalidBookingTransition {
                booking_id: booking.id,
                from: booking.status,
                to: BookingStatus::Confirmed,
            }
            .into());
        }
        let trip_id = booking.trip_id.ok_or(DomainError::BookingWithoutTrip(booking.id))?;
        let mut trip = state.trips.get(&trip_id).cloned().ok_or(DomainError::TripNotFound(trip_id))?;

        // Work on copies so a failed confirmation leaves the stored state untouched.
        booking.confirm(&mut trip)?;
        state.trips.insert(trip.id, trip);
        state.bookings.insert(booking.id, booking.clone());
        Ok(Some(booking))
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<Option<Booking>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(booking) = state.bookings.get_mut(&id) else {
            return Ok(None);
        };
        booking.cancel()?;
        Ok(Some(booking.clone()))
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemorySession {
    async fn append_message(&mut self, message: NewMessage) -> Result<Message, RepositoryError> {
        Ok(self.state.write().await.push_message(message))
    }

    async fn append_exchange(
        &mut self,
        inbound: NewMessage,
        outbound: NewMessage,
    ) -> Result<(Message, Message), RepositoryError> {
        let mut state = self.state.write().await;
        let inbound = state.push_message(inbound);
        let outbound = state.push_message(outbound);
        Ok((inbound, outbound))
    }

    async fn recent_messages(
        &mut self,
        client_id: ClientId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let mut recent: Vec<Message> = state
            .messages
            .iter()
            .rev()
            .filter(|message| message.client_id == Some(client_id))
            .take(limit as usize)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}
