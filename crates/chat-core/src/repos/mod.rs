use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Message, NewMessage, NewSummary, Session, Summary};

mod memory;
mod messages;
mod sessions;
mod summaries;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Persistence for sessions, their messages and their summaries.
///
/// Children reference their session; implementations refuse to remove a
/// session row while messages or summaries still point at it.
pub trait ChatStore: Send + Sync {
    fn insert_session<'a>(&'a self, session: Session) -> StoreFuture<'a, Session>;

    fn get_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Session>>;

    /// Sessions owned by `user_id`, newest first.
    fn list_sessions<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Session>>;

    fn update_session_details<'a>(
        &'a self,
        session_id: Uuid,
        legal_topics: String,
        title: String,
    ) -> StoreFuture<'a, bool>;

    fn update_context_window<'a>(
        &'a self,
        session_id: Uuid,
        context_window: String,
    ) -> StoreFuture<'a, bool>;

    fn set_session_active<'a>(&'a self, session_id: Uuid, active: bool)
    -> StoreFuture<'a, bool>;

    fn delete_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, bool>;

    fn delete_sessions_for_user<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, u64>;

    /// Stores a message under the next per-session sequence number.
    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message>;

    /// Messages of a session in ascending sequence order.
    fn list_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Vec<Message>>;

    fn last_message<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Message>>;

    fn update_message_metadata<'a>(
        &'a self,
        message_id: Uuid,
        metadata: Value,
    ) -> StoreFuture<'a, bool>;

    fn delete_messages_for_sessions<'a>(&'a self, session_ids: &'a [Uuid])
    -> StoreFuture<'a, u64>;

    fn insert_summary<'a>(&'a self, summary: NewSummary) -> StoreFuture<'a, Summary>;

    fn get_summary<'a>(&'a self, summary_id: Uuid) -> StoreFuture<'a, Option<Summary>>;

    /// Up to `limit` summaries of a session, newest first.
    fn recent_summaries<'a>(
        &'a self,
        session_id: Uuid,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Summary>>;

    fn delete_summaries_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64>;
}

/// Postgres-backed [`ChatStore`].
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn run_migrations(&self, migrations_dir: &Path) -> Result<(), StoreError> {
        let migrator = sqlx::migrate::Migrator::new(migrations_dir).await?;
        migrator.run(&self.pool).await?;
        Ok(())
    }
}

impl ChatStore for Store {
    fn insert_session<'a>(&'a self, session: Session) -> StoreFuture<'a, Session> {
        Box::pin(Store::insert_session(self, session))
    }

    fn get_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Session>> {
        Box::pin(Store::get_session(self, session_id))
    }

    fn list_sessions<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(Store::list_sessions(self, user_id))
    }

    fn update_session_details<'a>(
        &'a self,
        session_id: Uuid,
        legal_topics: String,
        title: String,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            Store::update_session_details(self, session_id, &legal_topics, &title).await
        })
    }

    fn update_context_window<'a>(
        &'a self,
        session_id: Uuid,
        context_window: String,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            Store::update_context_window(self, session_id, &context_window).await
        })
    }

    fn set_session_active<'a>(
        &'a self,
        session_id: Uuid,
        active: bool,
    ) -> StoreFuture<'a, bool> {
        Box::pin(Store::set_session_active(self, session_id, active))
    }

    fn delete_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(Store::delete_session(self, session_id))
    }

    fn delete_sessions_for_user<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(Store::delete_sessions_for_user(self, user_id))
    }

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message> {
        Box::pin(Store::insert_message(self, message))
    }

    fn list_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(Store::list_messages(self, session_id))
    }

    fn last_message<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Message>> {
        Box::pin(Store::last_message(self, session_id))
    }

    fn update_message_metadata<'a>(
        &'a self,
        message_id: Uuid,
        metadata: Value,
    ) -> StoreFuture<'a, bool> {
        Box::pin(Store::update_message_metadata(self, message_id, metadata))
    }

    fn delete_messages_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        Box::pin(Store::delete_messages_for_sessions(self, session_ids))
    }

    fn insert_summary<'a>(&'a self, summary: NewSummary) -> StoreFuture<'a, Summary> {
        Box::pin(Store::insert_summary(self, summary))
    }

    fn get_summary<'a>(&'a self, summary_id: Uuid) -> StoreFuture<'a, Option<Summary>> {
        Box::pin(Store::get_summary(self, summary_id))
    }

    fn recent_summaries<'a>(
        &'a self,
        session_id: Uuid,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Summary>> {
        Box::pin(Store::recent_summaries(self, session_id, limit))
    }

    fn delete_summaries_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        Box::pin(Store::delete_summaries_for_sessions(self, session_ids))
    }
}
