//! The fixed catalogue of inventory operations the oracle may call.
//!
//! Every operation is a variant of [`Operation`] with a typed parameter struct;
//! [`dispatch`] parses a request into a [`ToolInvocation`] and runs it against the
//! turn's session. Unknown names produce an error payload for the oracle instead of
//! failing the turn. Bad arguments and inventory errors do fail it.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use tripdesk_core::domain::booking::{Booking, BookingId, NewBooking};
use tripdesk_core::domain::client::{Client, ClientId, ClientUpdate};
use tripdesk_core::domain::trip::{Trip, TripId, TripQuery, DEFAULT_PAGE_LIMIT};
use tripdesk_db::repositories::{
    BookingRepository, ClientRepository, RepositoryError, Session, TripRepository,
};

use crate::llm::{ToolCallRequest, ToolDeclaration};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for `{tool}`: {message}")]
    InvalidArguments { tool: &'static str, message: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ToolError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Repository(error) => error.domain().map_or("repository", |domain| domain.code()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchTrips,
    ListTrips,
    GetTrip,
    GetClientProfile,
    CreateBooking,
    ConfirmBooking,
    CancelBooking,
    UpdateClientProfile,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Self::SearchTrips,
        Self::ListTrips,
        Self::GetTrip,
        Self::GetClientProfile,
        Self::CreateBooking,
        Self::ConfirmBooking,
        Self::CancelBooking,
        Self::UpdateClientProfile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SearchTrips => "search_trips",
            Self::ListTrips => "list_trips",
            Self::GetTrip => "get_trip",
            Self::GetClientProfile => "get_client_profile",
            Self::CreateBooking => "create_booking",
            Self::ConfirmBooking => "confirm_booking",
            Self::CancelBooking => "cancel_booking",
            Self::UpdateClientProfile => "update_client_profile",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|operation| operation.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::SearchTrips => {
                "Search trips using filters. depart_from/depart_to are ISO datetime strings. \
                 Returns a list of trips, newest first."
            }
            Self::ListTrips => "List trips with pagination, newest first.",
            Self::GetTrip => "Get a trip by id. Returns the trip or null.",
            Self::GetClientProfile => {
                "Fetch a client by their messaging channel identity. Returns the client or null."
            }
            Self::CreateBooking => "Create a booking with status pending. Returns the booking.",
            Self::ConfirmBooking => {
                "Confirm a pending booking and take its seats from the trip. \
                 Returns the updated booking, or null if not found."
            }
            Self::CancelBooking => {
                "Cancel a pending booking. Returns the updated booking, or null if not found."
            }
            Self::UpdateClientProfile => {
                "Update a client's profile fields. Returns the updated client, or null if not found."
            }
        }
    }

    pub fn parameters(self) -> Value {
        let paging = json!({
            "include_inactive": {"type": "boolean", "default": false},
            "limit": {"type": "integer", "default": DEFAULT_PAGE_LIMIT},
            "offset": {"type": "integer", "default": 0}
        });
        match self {
            Self::SearchTrips => {
                let mut properties = json!({
                    "origin": {"type": "string"},
                    "destination": {"type": "string"},
                    "depart_from": {"type": "string", "description": "ISO datetime, inclusive"},
                    "depart_to": {"type": "string", "description": "ISO datetime, inclusive"},
                    "max_price": {"type": "number"},
                    "min_seats": {"type": "integer"}
                });
                merge_properties(&mut properties, paging);
                object_schema(properties, &[])
            }
            Self::ListTrips => object_schema(paging, &[]),
            Self::GetTrip => object_schema(json!({"trip_id": {"type": "integer"}}), &["trip_id"]),
            Self::GetClientProfile => object_schema(
                json!({"channel_identity": {"type": "string"}}),
                &["channel_identity"],
            ),
            Self::CreateBooking => object_schema(
                json!({
                    "client_id": {"type": "integer"},
                    "trip_id": {"type": "integer"},
                    "passengers_count": {"type": "integer", "default": 1},
                    "contact_phone": {"type": "string"},
                    "notes": {"type": "string"}
                }),
                &["client_id", "trip_id"],
            ),
            Self::ConfirmBooking | Self::CancelBooking => {
                object_schema(json!({"booking_id": {"type": "integer"}}), &["booking_id"])
            }
            Self::UpdateClientProfile => object_schema(
                json!({
                    "client_id": {"type": "integer"},
                    "name": {"type": "string"},
                    "phone_number": {"type": "string"},
                    "national_id": {"type": "string"}
                }),
                &["client_id"],
            ),
        }
    }

    pub fn declaration(self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

pub fn declarations() -> Vec<ToolDeclaration> {
    Operation::ALL.into_iter().map(Operation::declaration).collect()
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

fn merge_properties(target: &mut Value, extra: Value) {
    if let (Value::Object(target), Value::Object(extra)) = (target, extra) {
        target.extend(extra);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SearchTripsParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub depart_from: Option<String>,
    pub depart_to: Option<String>,
    pub max_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub min_seats: Option<i64>,
    pub include_inactive: Option<bool>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub offset: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ListTripsParams {
    pub include_inactive: Option<bool>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub offset: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GetTripParams {
    #[serde(deserialize_with = "required_int")]
    pub trip_id: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GetClientProfileParams {
    pub channel_identity: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CreateBookingParams {
    #[serde(deserialize_with = "required_int")]
    pub client_id: i64,
    #[serde(deserialize_with = "required_int")]
    pub trip_id: i64,
    #[serde(default, deserialize_with = "lenient_int")]
    pub passengers_count: Option<i64>,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BookingRefParams {
    #[serde(deserialize_with = "required_int")]
    pub booking_id: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct UpdateClientProfileParams {
    #[serde(deserialize_with = "required_int")]
    pub client_id: i64,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
}

/// A request whose arguments have been coerced into the operation's parameter type.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolInvocation {
    SearchTrips(SearchTripsParams),
    ListTrips(ListTripsParams),
    GetTrip(GetTripParams),
    GetClientProfile(GetClientProfileParams),
    CreateBooking(CreateBookingParams),
    ConfirmBooking(BookingRefParams),
    CancelBooking(BookingRefParams),
    UpdateClientProfile(UpdateClientProfileParams),
}

impl ToolInvocation {
    /// `Ok(None)` when `name` is not in the catalogue.
    pub fn parse(name: &str, arguments: &Map<String, Value>) -> Result<Option<Self>, ToolError> {
        let Some(operation) = Operation::from_name(name) else {
            return Ok(None);
        };
        let invocation = match operation {
            Operation::SearchTrips => Self::SearchTrips(coerce(operation, arguments)?),
            Operation::ListTrips => Self::ListTrips(coerce(operation, arguments)?),
            Operation::GetTrip => Self::GetTrip(coerce(operation, arguments)?),
            Operation::GetClientProfile => Self::GetClientProfile(coerce(operation, arguments)?),
            Operation::CreateBooking => Self::CreateBooking(coerce(operation, arguments)?),
            Operation::ConfirmBooking => Self::ConfirmBooking(coerce(operation, arguments)?),
            Operation::CancelBooking => Self::CancelBooking(coerce(operation, arguments)?),
            Operation::UpdateClientProfile => {
                Self::UpdateClientProfile(coerce(operation, arguments)?)
            }
        };
        Ok(Some(invocation))
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::SearchTrips(_) => Operation::SearchTrips,
            Self::ListTrips(_) => Operation::ListTrips,
            Self::GetTrip(_) => Operation::GetTrip,
            Self::GetClientProfile(_) => Operation::GetClientProfile,
            Self::CreateBooking(_) => Operation::CreateBooking,
            Self::ConfirmBooking(_) => Operation::ConfirmBooking,
            Self::CancelBooking(_) => Operation::CancelBooking,
            Self::UpdateClientProfile(_) => Operation::UpdateClientProfile,
        }
    }

    /// Runs the operation and returns its JSON result. Absent records are `null`.
    pub async fn execute(self, session: &mut dyn Session) -> Result<Value, ToolError> {
        let operation = self.operation();
        let value = match self {
            Self::SearchTrips(params) => {
                let query = search_query(operation, params)?;
                trip_list(session.search_trips(&query).await?)
            }
            Self::ListTrips(params) => {
                let query = TripQuery::listing(
                    params.include_inactive.unwrap_or(false),
                    page_value(operation, "limit", params.limit, DEFAULT_PAGE_LIMIT)?,
                    page_value(operation, "offset", params.offset, 0)?,
                );
                trip_list(session.search_trips(&query).await?)
            }
            Self::GetTrip(params) => {
                to_value(session.find_trip(TripId(params.trip_id)).await?.as_ref().map(TripSummary::from))
            }
            Self::GetClientProfile(params) => to_value(
                session
                    .find_client_by_identity(&params.channel_identity)
                    .await?
                    .as_ref()
                    .map(ClientSummary::from),
            ),
            Self::CreateBooking(params) => {
                let booking = session
                    .create_booking(NewBooking {
                        client_id: ClientId(params.client_id),
                        trip_id: TripId(params.trip_id),
                        passengers_count: params.passengers_count.unwrap_or(1),
                        contact_phone: params.contact_phone,
                        notes: params.notes,
                    })
                    .await?;
                to_value(BookingSummary::from(&booking))
            }
            Self::ConfirmBooking(params) => to_value(
                session
                    .confirm_booking(BookingId(params.booking_id))
                    .await?
                    .as_ref()
                    .map(BookingSummary::from),
            ),
            Self::CancelBooking(params) => to_value(
                session
                    .cancel_booking(BookingId(params.booking_id))
                    .await?
                    .as_ref()
                    .map(BookingSummary::from),
            ),
            Self::UpdateClientProfile(params) => {
                let update = ClientUpdate {
                    name: params.name,
                    phone_number: params.phone_number,
                    national_id: params.national_id,
                };
                to_value(
                    session
                        .update_client(ClientId(params.client_id), update)
                        .await?
                        .as_ref()
                        .map(ClientSummary::from),
                )
            }
        };
        Ok(value)
    }
}

/// Dispatches one request and renders its result as the text fed back to the oracle.
pub async fn dispatch(
    session: &mut dyn Session,
    request: &ToolCallRequest,
) -> Result<String, ToolError> {
    let Some(invocation) = ToolInvocation::parse(&request.name, &request.arguments)? else {
        return Ok(render_result(&json!({"error": format!("unknown tool {}", request.name)})));
    };
    let value = invocation.execute(session).await?;
    Ok(render_result(&value))
}

/// Plain strings pass through unquoted; every other value is serialized as JSON.
pub fn render_result(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn coerce<T>(operation: Operation, arguments: &Map<String, Value>) -> Result<T, ToolError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(Value::Object(arguments.clone())).map_err(|error| {
        ToolError::InvalidArguments { tool: operation.name(), message: error.to_string() }
    })
}

fn search_query(operation: Operation, params: SearchTripsParams) -> Result<TripQuery, ToolError> {
    let min_seats = params
        .min_seats
        .map(|seats| {
            u32::try_from(seats).map_err(|_| invalid(operation, format!("min_seats must be >= 0 (got {seats})")))
        })
        .transpose()?;

    Ok(TripQuery {
        origin: params.origin,
        destination: params.destination,
        depart_from: params.depart_from.as_deref().map(|raw| parse_datetime(operation, "depart_from", raw)).transpose()?,
        depart_to: params.depart_to.as_deref().map(|raw| parse_datetime(operation, "depart_to", raw)).transpose()?,
        max_price: params.max_price,
        min_seats,
        include_inactive: params.include_inactive.unwrap_or(false),
        limit: page_value(operation, "limit", params.limit, DEFAULT_PAGE_LIMIT)?,
        offset: page_value(operation, "offset", params.offset, 0)?,
    })
}

fn page_value(
    operation: Operation,
    field: &str,
    value: Option<i64>,
    default: u32,
) -> Result<u32, ToolError> {
    match value {
        None => Ok(default),
        Some(raw) => u32::try_from(raw)
            .map_err(|_| invalid(operation, format!("{field} must be >= 0 (got {raw})"))),
    }
}

/// RFC 3339, or a naive ISO date-time / date read as UTC.
fn parse_datetime(operation: Operation, field: &str, raw: &str) -> Result<DateTime<Utc>, ToolError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    Err(invalid(operation, format!("{field} is not an ISO datetime: `{raw}`")))
}

fn invalid(operation: Operation, message: String) -> ToolError {
    ToolError::InvalidArguments { tool: operation.name(), message }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => int_from_value(&value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("expected an integer, got {value}"))
        }),
    }
}

fn required_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    int_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

/// Integers, integral floats (`2.0`) and numeric strings (`"2"`).
fn int_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number.as_f64().filter(|float| float.fract() == 0.0 && float.abs() < 9.0e15).map(|float| float as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn trip_list(trips: Vec<Trip>) -> Value {
    to_value(trips.iter().map(TripSummary::from).collect::<Vec<_>>())
}

fn iso(timestamp: Option<DateTime<Utc>>) -> Option<String> {
    timestamp.map(|value| value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripSummary {
    pub id: i64,
    pub title: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub price: Option<f64>,
    pub available_seats: Option<u32>,
    pub is_active: bool,
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id.0,
            title: trip.title.clone(),
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            departure_time: iso(trip.departure_time),
            arrival_time: iso(trip.arrival_time),
            price: trip.price.and_then(|price| price.to_f64()),
            available_seats: trip.available_seats,
            is_active: trip.is_active,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientSummary {
    pub id: i64,
    pub channel_identity: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.0,
            channel_identity: client.channel_identity.clone(),
            name: client.name.clone(),
            phone_number: client.phone_number.clone(),
            national_id: client.national_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookingSummary {
    pub id: i64,
    pub client_id: Option<i64>,
    pub trip_id: Option<i64>,
    pub status: &'static str,
    pub passengers_count: u32,
    pub contact_phone: Option<String>,
    pub notes: Option<String>,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id.0,
            client_id: booking.client_id.map(|id| id.0),
            trip_id: booking.trip_id.map(|id| id.0),
            status: booking.status.as_str(),
            passengers_count: booking.passengers_count,
            contact_phone: booking.contact_phone.clone(),
            notes: booking.notes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use tripdesk_core::domain::trip::NewTrip;
    use tripdesk_core::errors::DomainError;
    use tripdesk_db::repositories::{ClientRepository, InMemoryInventory, RepositoryError};

    use super::{declarations, dispatch, render_result, Operation, ToolError, ToolInvocation};
    use crate::llm::ToolCallRequest;

    fn paris_trip(seats: Option<u32>) -> NewTrip {
        NewTrip {
            title: "Tunis → Paris".to_string(),
            origin: "Tunis".to_string(),
            destination: "Paris".to_string(),
            departure_time: Some(Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()),
            arrival_time: None,
            price: Some(Decimal::new(100, 0)),
            available_seats: seats,
            is_active: true,
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest::new("call-1", name, arguments)
    }

    #[test]
    fn every_operation_is_declared_once_with_an_object_schema() {
        let declarations = declarations();
        assert_eq!(declarations.len(), 8);
        for operation in Operation::ALL {
            assert_eq!(Operation::from_name(operation.name()), Some(operation));
            let declaration = operation.declaration();
            assert_eq!(declaration.parameters["type"], "object");
            assert!(declarations.contains(&declaration));
        }
        assert_eq!(Operation::from_name("book_everything"), None);
    }

    #[test]
    fn search_schema_carries_filters_and_paging() {
        let schema = Operation::SearchTrips.parameters();
        for field in ["origin", "destination", "depart_from", "max_price", "min_seats", "limit", "offset"] {
            assert!(schema["properties"].get(field).is_some(), "missing {field}");
        }
        assert_eq!(Operation::CreateBooking.parameters()["required"], json!(["client_id", "trip_id"]));
    }

    #[test]
    fn plain_string_results_are_not_quoted() {
        assert_eq!(render_result(&json!("already text")), "already text");
        assert_eq!(render_result(&json!(null)), "null");
        assert_eq!(render_result(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn arguments_are_coerced_leniently() {
        let arguments = json!({"client_id": "3", "trip_id": 4.0, "passengers_count": 2})
            .as_object()
            .cloned()
            .unwrap_or_default();
        let invocation = ToolInvocation::parse("create_booking", &arguments)
            .expect("valid arguments")
            .expect("known tool");

        match invocation {
            ToolInvocation::CreateBooking(params) => {
                assert_eq!((params.client_id, params.trip_id, params.passengers_count), (3, 4, Some(2)));
            }
            other => panic!("unexpected invocation {other:?}"),
        }
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let arguments = json!({"trip_id": "soon"}).as_object().cloned().unwrap_or_default();
        let error = ToolInvocation::parse("get_trip", &arguments).expect_err("not an integer");
        assert!(matches!(error, ToolError::InvalidArguments { tool: "get_trip", .. }));
        assert_eq!(error.code(), "invalid_arguments");
    }

    #[tokio::test]
    async fn unknown_tools_become_error_results() {
        let inventory = InMemoryInventory::new();
        let mut session = inventory.session();

        let result = dispatch(&mut session, &call("teleport", json!({"to": "Paris"})))
            .await
            .expect("unknown tools never fail");

        assert_eq!(result, r#"{"error":"unknown tool teleport"}"#);
    }

    #[tokio::test]
    async fn search_filters_by_destination_and_reports_numeric_prices() {
        let inventory = InMemoryInventory::new();
        let paris = inventory.seed_trip(paris_trip(Some(5))).await;
        let mut rome = paris_trip(Some(5));
        rome.destination = "Rome".to_string();
        inventory.seed_trip(rome).await;
        let mut session = inventory.session();

        let result = dispatch(&mut session, &call("search_trips", json!({"destination": "Paris"})))
            .await
            .expect("search");
        let trips: Value = serde_json::from_str(&result).expect("json result");

        assert_eq!(trips.as_array().map(Vec::len), Some(1));
        assert_eq!(trips[0]["id"], paris.id.0);
        assert_eq!(trips[0]["price"], json!(100.0));
        assert_eq!(trips[0]["available_seats"], 5);
        assert_eq!(trips[0]["departure_time"], "2026-05-01T09:00:00Z");
    }

    #[tokio::test]
    async fn search_accepts_naive_dates_in_the_window() {
        let inventory = InMemoryInventory::new();
        inventory.seed_trip(paris_trip(Some(5))).await;
        let mut session = inventory.session();

        let inside = dispatch(
            &mut session,
            &call("search_trips", json!({"depart_from": "2026-05-01", "depart_to": "2026-05-01T09:00"})),
        )
        .await
        .expect("search");
        let outside = dispatch(
            &mut session,
            &call("search_trips", json!({"depart_from": "2026-05-01T09:00:01+00:00"})),
        )
        .await
        .expect("search");

        assert_ne!(inside, "[]");
        assert_eq!(outside, "[]");

        let error = dispatch(&mut session, &call("search_trips", json!({"depart_from": "next week"})))
            .await
            .expect_err("unparseable date");
        assert!(matches!(error, ToolError::InvalidArguments { tool: "search_trips", .. }));
    }

    #[tokio::test]
    async fn missing_records_render_as_null() {
        let inventory = InMemoryInventory::new();
        let mut session = inventory.session();

        for (name, arguments) in [
            ("get_trip", json!({"trip_id": 404})),
            ("get_client_profile", json!({"channel_identity": "nobody"})),
            ("confirm_booking", json!({"booking_id": 404})),
            ("cancel_booking", json!({"booking_id": 404})),
            ("update_client_profile", json!({"client_id": 404, "name": "Ghost"})),
        ] {
            let result = dispatch(&mut session, &call(name, arguments)).await.expect(name);
            assert_eq!(result, "null", "{name}");
        }
    }

    #[tokio::test]
    async fn booking_lifecycle_through_the_catalogue() {
        let inventory = InMemoryInventory::new();
        let trip = inventory.seed_trip(paris_trip(Some(3))).await;
        let mut session = inventory.session();
        let client = session.resolve_or_create_client("psid-42").await.expect("client");

        let created = dispatch(
            &mut session,
            &call(
                "create_booking",
                json!({"client_id": client.id.0, "trip_id": trip.id.0, "passengers_count": 3, "contact_phone": "999"}),
            ),
        )
        .await
        .expect("create");
        let created: Value = serde_json::from_str(&created).expect("json");
        assert_eq!(created["status"], "pending");

        let confirmed = dispatch(&mut session, &call("confirm_booking", json!({"booking_id": created["id"]})))
            .await
            .expect("confirm");
        let confirmed: Value = serde_json::from_str(&confirmed).expect("json");
        assert_eq!(confirmed["status"], "confirmed");
        assert_eq!(inventory.trip(trip.id).await.and_then(|trip| trip.available_seats), Some(0));

        let profile = dispatch(
            &mut session,
            &call("update_client_profile", json!({"client_id": client.id.0, "name": "Amira"})),
        )
        .await
        .expect("update");
        let profile: Value = serde_json::from_str(&profile).expect("json");
        assert_eq!(profile["name"], "Amira");
        assert_eq!(profile["channel_identity"], "psid-42");
    }

    #[tokio::test]
    async fn domain_errors_propagate_to_the_caller() {
        let inventory = InMemoryInventory::new();
        let trip = inventory.seed_trip(paris_trip(Some(1))).await;
        let mut session = inventory.session();
        let client = session.resolve_or_create_client("psid-7").await.expect("client");

        let error = dispatch(
            &mut session,
            &call("create_booking", json!({"client_id": client.id.0, "trip_id": trip.id.0, "passengers_count": 0})),
        )
        .await
        .expect_err("zero passengers");

        assert!(matches!(
            error,
            ToolError::Repository(RepositoryError::Domain(DomainError::InvalidPassengerCount(0)))
        ));
        assert_eq!(error.code(), "invalid_argument");
        assert!(inventory.bookings().await.is_empty());
    }
}
