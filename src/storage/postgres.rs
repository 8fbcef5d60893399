use crate::models::{MatchTuple, VisitorRecord};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::with_options(PgConnectOptions::from_str(database_url)?, max_connections).await
    }

    pub async fn with_options(options: PgConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitor_data (
                id BIGSERIAL PRIMARY KEY,
                finger_print TEXT NOT NULL,
                browser TEXT NOT NULL,
                city TEXT NOT NULL DEFAULT '',
                state TEXT NOT NULL DEFAULT '',
                country TEXT NOT NULL DEFAULT '',
                user_id TEXT NOT NULL UNIQUE,
                last_update BIGINT NOT NULL
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
            WHERE finger_print = $1 AND browser = $2 AND city = $3 AND state = $4 AND country = $5
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
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (finger_print, browser, city, state, country) DO NOTHING
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
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM visitor_data
            WHERE finger_print = $1 AND browser = $2 AND city = $3 AND state = $4 AND country = $5
            "#,
        )
        .bind(&tuple.fingerprint)
        .bind(tuple.browser.as_str())
        .bind(&tuple.city)
        .bind(&tuple.state)
        .bind(&tuple.country)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count.0)
    }
}
