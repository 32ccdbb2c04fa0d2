#![allow(dead_code)]

pub mod provider;

use chat_core::config::{ConfigError, StoreConfig};
use chat_core::repos::Store;
use sqlx::postgres::PgPool;
use tokio::sync::OnceCell;

static MIGRATIONS_APPLIED: OnceCell<()> = OnceCell::const_new();

/// Connects to `DATABASE_URL` with migrations applied, or returns `None` so
/// the calling test can skip when no database is configured.
pub async fn test_store() -> Option<Store> {
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::MissingVar(_)) => {
            eprintln!("DATABASE_URL is not set; skipping database-backed test");
            return None;
        }
        Err(err) => panic!("store config should load: {err}"),
    };

    let store = Store::connect(&config.database_url, config.database_max_connections)
        .await
        .expect("test store connection should succeed");
    MIGRATIONS_APPLIED
        .get_or_init(|| async {
            store
                .run_migrations(&config.migrations_dir)
                .await
                .expect("migrations should apply successfully");
        })
        .await;

    reset_database(store.pool()).await;
    Some(store)
}

pub async fn reset_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE context_summaries, chat_messages, chat_sessions")
        .execute(pool)
        .await
        .expect("database reset should succeed");
}
