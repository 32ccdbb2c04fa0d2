use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use crate::models::{NewSummary, Summary};

use super::{Store, StoreError};

impl Store {
    pub async fn insert_summary(&self, summary: NewSummary) -> Result<Summary, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO context_summaries (
                id,
                session_id,
                summary_text,
                embedding,
                created_at
             ) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(summary.session_id)
        .bind(&summary.summary_text)
        .bind(summary.embedding.as_deref())
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;

        Ok(Summary {
            id,
            session_id: summary.session_id,
            summary_text: summary.summary_text,
            embedding: summary.embedding,
            created_at: summary.created_at,
        })
    }

    pub async fn get_summary(&self, summary_id: Uuid) -> Result<Option<Summary>, StoreError> {
        let row = sqlx::query(
            "SELECT id, session_id, summary_text, embedding, created_at
             FROM context_summaries
             WHERE id = $1",
        )
        .bind(summary_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(summary_from_row).transpose()
    }

    pub async fn recent_summaries(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Summary>, StoreError> {
        let limit = i64::try_from(limit).map_err(|_| {
            StoreError::InvalidData(format!("summary limit out of range: {limit}"))
        })?;

        let rows = sqlx::query(
            "SELECT id, session_id, summary_text, embedding, created_at
             FROM context_summaries
             WHERE session_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }

    pub async fn delete_summaries_for_sessions(
        &self,
        session_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        if session_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM context_summaries WHERE session_id = ANY($1)")
            .bind(session_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn summary_from_row(row: &PgRow) -> Result<Summary, StoreError> {
    Ok(Summary {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        summary_text: row.try_get("summary_text")?,
        embedding: row.try_get("embedding")?,
        created_at: row.try_get("created_at")?,
    })
}
