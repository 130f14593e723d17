use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Connection, Row, SqliteConnection};

use tripdesk_core::domain::client::ClientId;
use tripdesk_core::domain::message::{Message, MessageDirection, MessageId, NewMessage};

use super::session::{format_timestamp, parse_timestamp, SqlSession};
use super::{MessageRepository, RepositoryError};

#[async_trait::async_trait]
impl MessageRepository for SqlSession {
    async fn append_message(&mut self, message: NewMessage) -> Result<Message, RepositoryError> {
        insert_message(&mut self.conn, message).await
    }

    async fn append_exchange(
        &mut self,
        inbound: NewMessage,
        outbound: NewMessage,
    ) -> Result<(Message, Message), RepositoryError> {
        let mut tx = self.conn.begin().await?;
        let inbound = insert_message(&mut tx, inbound).await?;
        let outbound = insert_message(&mut tx, outbound).await?;
        tx.commit().await?;

        Ok((inbound, outbound))
    }

    async fn recent_messages(
        &mut self,
        client_id: ClientId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, client_id, direction, content, created_at
             FROM messages
             WHERE client_id = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(client_id.0)
        .bind(i64::from(limit))
        .fetch_all(&mut *self.conn)
        .await?;

        let mut messages = rows.into_iter().map(message_from_row).collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

async fn insert_message(
    conn: &mut SqliteConnection,
    message: NewMessage,
) -> Result<Message, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO messages (client_id, direction, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(message.client_id.map(|id| id.0))
    .bind(message.direction.as_str())
    .bind(message.content.as_deref())
    .bind(format_timestamp(Utc::now()))
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query(
        "SELECT id, client_id, direction, content, created_at FROM messages WHERE id = ?",
    )
    .bind(result.last_insert_rowid())
    .fetch_one(&mut *conn)
    .await?;

    message_from_row(row)
}

fn message_from_row(row: SqliteRow) -> Result<Message, RepositoryError> {
    let direction_raw = row.try_get::<String, _>("direction")?;
    let direction = MessageDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown message direction `{direction_raw}`"))
    })?;

    Ok(Message {
        id: MessageId(row.try_get("id")?),
        client_id: row.try_get::<Option<i64>, _>("client_id")?.map(ClientId),
        direction,
        content: row.try_get("content")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use tripdesk_core::domain::message::{MessageDirection, NewMessage};

    use crate::repositories::{ClientRepository, MessageRepository, SqlSession};
    use crate::test_support::setup_pool;

    #[tokio::test]
    async fn recent_messages_are_the_latest_window_in_chronological_order() {
        let pool = setup_pool().await;
        let mut session = SqlSession::acquire(&pool).await.expect("session");
        let client = session.resolve_or_create_client("psid-history").await.expect("client");
        let other = session.resolve_or_create_client("psid-other").await.expect("other client");

        for index in 0..5 {
            session
                .append_message(NewMessage::inbound(client.id, format!("question {index}")))
                .await
                .expect("append inbound");
            session
                .append_message(NewMessage::outbound(client.id, format!("answer {index}")))
                .await
                .expect("append outbound");
        }
        session.append_message(NewMessage::inbound(other.id, "noise")).await.expect("noise");

        let recent = session.recent_messages(client.id, 3).await.expect("recent");
        let contents: Vec<_> = recent.iter().filter_map(|message| message.content.as_deref()).collect();

        assert_eq!(contents, vec!["answer 3", "question 4", "answer 4"]);
        assert_eq!(recent[1].direction, MessageDirection::In);
        assert!(recent.windows(2).all(|pair| pair[0].id < pair[1].id));

        drop(session);
        pool.close().await;
    }

    #[tokio::test]
    async fn exchanges_store_inbound_before_outbound() {
        let pool = setup_pool().await;
        let mut session = SqlSession::acquire(&pool).await.expect("session");
        let client = session.resolve_or_create_client("psid-exchange").await.expect("client");

        let (inbound, outbound) = session
            .append_exchange(
                NewMessage::inbound(client.id, "Are there trips to Paris?"),
                NewMessage::outbound(client.id, "Yes, one on Friday."),
            )
            .await
            .expect("append exchange");

        assert!(inbound.id < outbound.id);
        let stored = session.recent_messages(client.id, 20).await.expect("recent");
        assert_eq!(stored, vec![inbound, outbound]);

        drop(session);
        pool.close().await;
    }

    #[tokio::test]
    async fn clients_without_history_get_an_empty_window() {
        let pool = setup_pool().await;
        let mut session = SqlSession::acquire(&pool).await.expect("session");
        let client = session.resolve_or_create_client("psid-quiet").await.expect("client");

        assert!(session.recent_messages(client.id, 20).await.expect("recent").is_empty());

        drop(session);
        pool.close().await;
    }
}
