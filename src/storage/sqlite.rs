use crate::models::{MatchTuple, VisitorRecord};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitor_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finger_print TEXT NOT NULL,
                browser TEXT NOT NULL,
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL UNIQUE,
                last_update INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_visitor_match
            ON visitor_data(finger_print, browser, city, state, country)
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_exact(&self, tuple: &MatchTuple) -> StorageResult<Option<VisitorRecord>> {
        let record = sqlx::query_as::<_, VisitorRecord>(
            r#"
            SELECT id, finger_print, browser, city, state, country, user_id, last_update
            FROM visitor_data
            WHERE finger_print = ? AND browser = ? AND city = ? AND state = ? AND country = ?
            LIMIT 1
            "#,
        )
        .bind(&tuple.fingerprint)
        .bind(tuple.browser.as_str())
        .bind(&tuple.city)
        .bind(&tuple.state)
        .bind(&tuple.country)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(record)
    }

    async fn insert(&self, tuple: &MatchTuple, user_id: &str) -> StorageResult<VisitorRecord> {
        let last_update = chrono::Utc::now().timestamp();

        let record = sqlx::query_as::<_, VisitorRecord>(
            r#"
            INSERT INTO visitor_data (finger_print, browser, city, state, country, user_id, last_update)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(finger_print, browser, city, state, country) DO NOTHING
            RETURNING id, finger_print, browser, city, state, country, user_id, last_update
            "#,
        )
        .bind(&tuple.fingerprint)
        .bind(tuple.browser.as_str())
        .bind(&tuple.city)
        .bind(&tuple.state)
        .bind(&tuple.country)
        .bind(user_id)
        .bind(last_update)
        .fetch_optional(self.pool.as_ref())
        .await?;

        record.ok_or(StorageError::Conflict)
    }

    async fn count_matching(&self, tuple: &MatchTuple) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM visitor_data
            WHERE finger_print = ? AND browser = ? AND city = ? AND state = ? AND country = ?
            "#,
        )
        .bind(&tuple.fingerprint)
        .bind(tuple.browser.as_str())
        .bind(&tuple.city)
        .bind(&tuple.state)
        .bind(&tuple.country)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }
}
