use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use tripdesk_core::domain::client::{Client, ClientId, ClientUpdate};

use super::session::{format_timestamp, parse_timestamp, SqlSession};
use super::{ClientRepository, RepositoryError};

const CLIENT_COLUMNS: &str = "id, channel_identity, name, phone_number, national_id, created_at";

#[async_trait::async_trait]
impl ClientRepository for SqlSession {
    async fn find_client(&mut self, id: ClientId) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&mut *self.conn)
            .await?;

        row.map(client_from_row).transpose()
    }

    async fn find_client_by_identity(
        &mut self,
        channel_identity: &str,
    ) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE channel_identity = ?"
        ))
        .bind(channel_identity)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(client_from_row).transpose()
    }

    async fn resolve_or_create_client(
        &mut self,
        channel_identity: &str,
    ) -> Result<Client, RepositoryError> {
        sqlx::query(
            "INSERT INTO clients (channel_identity, created_at) VALUES (?, ?)
             ON CONFLICT(channel_identity) DO NOTHING",
        )
        .bind(channel_identity)
        .bind(format_timestamp(Utc::now()))
        .execute(&mut *self.conn)
        .await?;

        self.find_client_by_identity(channel_identity).await?.ok_or_else(|| {
            RepositoryError::Decode(format!(
                "client `{channel_identity}` vanished right after registration"
            ))
        })
    }

    async fn update_client(
        &mut self,
        id: ClientId,
        update: ClientUpdate,
    ) -> Result<Option<Client>, RepositoryError> {
        let Some(mut client) = self.find_client(id).await? else {
            return Ok(None);
        };
        if update.is_empty() {
            return Ok(Some(client));
        }

        update.apply(&mut client);
        sqlx::query(
            "UPDATE clients SET name = ?, phone_number = ?, national_id = ? WHERE id = ?",
        )
        .bind(client.name.as_deref())
        .bind(client.phone_number.as_deref())
        .bind(client.national_id.as_deref())
        .bind(id.0)
        .execute(&mut *self.conn)
        .await?;

        Ok(Some(client))
    }
}

fn client_from_row(row: SqliteRow) -> Result<Client, RepositoryError> {
    Ok(Client {
        id: ClientId(row.try_get("id")?),
        channel_identity: row.try_get("channel_identity")?,
        name: row.try_get("name")?,
        phone_number: row.try_get("phone_number")?,
        national_id: row.try_get("national_id")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
