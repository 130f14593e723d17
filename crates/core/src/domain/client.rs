use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub i64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An end user, keyed by the opaque identity the messaging channel assigns them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub channel_identity: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; `None` leaves the field unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub national_id: Option<String>,
}

impl ClientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone_number.is_none() && self.national_id.is_none()
    }

    pub fn apply(self, client: &mut Client) {
        if let Some(name) = self.name {
            client.name = Some(name);
        }
        if let Some(phone_number) = self.phone_number {
            client.phone_number = Some(phone_number);
        }
        if let Some(national_id) = self.national_id {
            client.national_id = Some(national_id);
        }
    }
}
