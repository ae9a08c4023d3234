use cadence_core::chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use cadence_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, Message, Sender,
};

use super::{ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, title, status, created_at, updated_at \
             FROM conversations WHERE id = ?",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_raw: String = row.try_get("status").map_err(RepositoryError::Database)?;
        let status = match status_raw.as_str() {
            "active" => ConversationStatus::Active,
            "archived" => ConversationStatus::Archived,
            other => {
                return Err(RepositoryError::Decode(format!(
                    "unknown conversation status `{other}`"
                )))
            }
        };
        let created_raw: String = row.try_get("created_at").map_err(RepositoryError::Database)?;
        let updated_raw: String = row.try_get("updated_at").map_err(RepositoryError::Database)?;

        Ok(Some(Conversation {
            id: conversation_id.clone(),
            user_id: row.try_get("user_id").map_err(RepositoryError::Database)?,
            title: row.try_get("title").map_err(RepositoryError::Database)?,
            status,
            created_at: parse_datetime("created_at", &created_raw)?,
            updated_at: parse_datetime("updated_at", &updated_raw)?,
        }))
    }

    async fn last_message_at(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let row = sqlx::query(
            "SELECT created_at FROM messages WHERE conversation_id = ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("created_at").map_err(RepositoryError::Database)?;
                Ok(Some(parse_datetime("created_at", &raw)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn ensure_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, status, created_at, updated_at)
            VALUES (?, ?, 'active', ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&conversation_id.0)
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_turn(
        &self,
        conversation_id: &ConversationId,
        user_message: &str,
        assistant_message: &str,
        model_name: &str,
    ) -> Result<(), RepositoryError> {
        // created_at is strictly increasing within a conversation even when
        // the wall clock has not advanced since the last message.
        let floor = self
            .last_message_at(conversation_id)
            .await?
            .map(|last| last + Duration::milliseconds(1));
        let user_at = match floor {
            Some(floor) if floor > Utc::now() => floor,
            _ => Utc::now(),
        };
        let assistant_at = user_at + Duration::milliseconds(1);

        let metadata = serde_json::json!({ "model_name": model_name }).to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender, content, metadata, created_at)
            VALUES (?, 'user', ?, NULL, ?)
            "#,
        )
        .bind(&conversation_id.0)
        .bind(user_message)
        .bind(user_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO messages (conversation_id, sender, content, metadata, created_at)
            VALUES (?, 'assistant', ?, ?, ?)
            "#,
        )
        .bind(&conversation_id.0)
        .bind(assistant_message)
        .bind(&metadata)
        .bind(assistant_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(assistant_at.to_rfc3339())
            .bind(&conversation_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sender, content, metadata, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(&conversation_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(RepositoryError::Database)?;
            let sender_raw: String = row.try_get("sender").map_err(RepositoryError::Database)?;
            let content: String = row.try_get("content").map_err(RepositoryError::Database)?;
            let metadata_raw: Option<String> =
                row.try_get("metadata").map_err(RepositoryError::Database)?;
            let created_raw: String =
                row.try_get("created_at").map_err(RepositoryError::Database)?;

            let sender = Sender::parse(&sender_raw).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown message sender `{sender_raw}`"))
            })?;
            let metadata = match metadata_raw {
                Some(raw) => Some(serde_json::from_str(&raw).map_err(|error| {
                    RepositoryError::Decode(format!("invalid message metadata: {error}"))
                })?),
                None => None,
            };

            messages.push(Message {
                id,
                conversation_id: conversation_id.clone(),
                sender,
                content,
                metadata,
                created_at: parse_datetime("created_at", &created_raw)?,
            });
        }

        // Chronological order, oldest first.
        messages.reverse();
        Ok(messages)
    }
}

pub(crate) fn parse_datetime(
    column: &str,
    raw: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid {column} timestamp `{raw}`: {error}"))
        })
}
