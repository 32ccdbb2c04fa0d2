use chrono::Utc;
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{AnalysisParameters, Session};

use super::{Store, StoreError};

const SESSION_COLUMNS: &str = "id, user_id, document_id, title, is_active, legal_topics,
     context_window, analysis_parameters, created_at, updated_at";

impl Store {
    pub async fn insert_session(&self, session: Session) -> Result<Session, StoreError> {
        sqlx::query(
            "INSERT INTO chat_sessions (
                id,
                user_id,
                document_id,
                title,
                is_active,
                legal_topics,
                context_window,
                analysis_parameters,
                created_at,
                updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.document_id)
        .bind(session.title.as_deref())
        .bind(session.is_active)
        .bind(&session.legal_topics)
        .bind(&session.context_window)
        .bind(Json(&session.analysis_parameters))
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| session_from_row(&row)).transpose()
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS}
             FROM chat_sessions
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    pub async fn update_session_details(
        &self,
        session_id: Uuid,
        legal_topics: &str,
        title: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE chat_sessions
             SET legal_topics = $2,
                 title = $3,
                 updated_at = $4
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(legal_topics)
        .bind(title)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_context_window(
        &self,
        session_id: Uuid,
        context_window: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE chat_sessions
             SET context_window = $2,
                 updated_at = $3
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(context_window)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_session_active(
        &self,
        session_id: Uuid,
        active: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE chat_sessions
             SET is_active = $2,
                 updated_at = $3
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_sessions_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let Json(analysis_parameters): Json<AnalysisParameters> =
        row.try_get("analysis_parameters").map_err(|err| {
            StoreError::InvalidData(format!("session analysis parameters invalid: {err}"))
        })?;

    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        document_id: row.try_get("document_id")?,
        title: row.try_get("title")?,
        is_active: row.try_get("is_active")?,
        legal_topics: row.try_get("legal_topics")?,
        context_window: row.try_get("context_window")?,
        analysis_parameters,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
