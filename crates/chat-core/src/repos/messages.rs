use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::models::{Message, NewMessage};

use super::{Store, StoreError};

impl Store {
    /// Locks the parent session row so concurrent writers for the same
    /// session observe each other's sequence numbers.
    pub async fn insert_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("SELECT id FROM chat_sessions WHERE id = $1 FOR UPDATE")
            .bind(message.session_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound(format!(
                "session {} does not exist",
                message.session_id
            )));
        }

        let id = Uuid::new_v4();
        let row = sqlx::query(
            "INSERT INTO chat_messages (
                id,
                session_id,
                prompt,
                response,
                sequence_number,
                metadata,
                created_at
             )
             SELECT $1, $2, $3, $4, COALESCE(MAX(sequence_number), 0) + 1, $5, $6
             FROM chat_messages
             WHERE session_id = $2
             RETURNING sequence_number",
        )
        .bind(id)
        .bind(message.session_id)
        .bind(&message.prompt)
        .bind(&message.response)
        .bind(&message.metadata)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let sequence_number: i32 = row.try_get("sequence_number")?;

        tx.commit().await?;

        Ok(Message {
            id,
            session_id: message.session_id,
            prompt: message.prompt,
            response: message.response,
            sequence_number,
            metadata: message.metadata,
            created_at: message.created_at,
        })
    }

    pub async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, session_id, prompt, response, sequence_number, metadata, created_at
             FROM chat_messages
             WHERE session_id = $1
             ORDER BY sequence_number ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn last_message(&self, session_id: Uuid) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(
            "SELECT id, session_id, prompt, response, sequence_number, metadata, created_at
             FROM chat_messages
             WHERE session_id = $1
             ORDER BY sequence_number DESC
             LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    pub async fn update_message_metadata(
        &self,
        message_id: Uuid,
        metadata: Value,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE chat_messages SET metadata = $2 WHERE id = $1")
            .bind(message_id)
            .bind(metadata)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_messages_for_sessions(
        &self,
        session_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        if session_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn message_from_row(row: &PgRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        prompt: row.try_get("prompt")?,
        response: row.try_get("response")?,
        sequence_number: row.try_get("sequence_number")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}
