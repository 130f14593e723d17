use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use tracing::debug;

use super::{RepositoryError, Session, SessionFactory};
use crate::DbPool;

/// Hands out one pooled connection per session.
#[derive(Clone)]
pub struct SqlSessionFactory {
    pool: DbPool,
}

impl SqlSessionFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SessionFactory for SqlSessionFactory {
    async fn open(&self) -> Result<Box<dyn Session>, RepositoryError> {
        let conn = self.pool.acquire().await?;
        debug!(event_name = "db.session.opened", "acquired pooled connection for session");
        Ok(Box::new(SqlSession { conn }))
    }
}

/// A session bound to a single pooled connection; the connection goes back to the pool
/// when the session is dropped.
pub struct SqlSession {
    pub(crate) conn: PoolConnection<Sqlite>,
}

impl SqlSession {
    pub async fn acquire(pool: &DbPool) -> Result<Self, RepositoryError> {
        Ok(Self { conn: pool.acquire().await? })
    }
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}
