use crate::models::{MatchTuple, VisitorRecord};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("visitor tuple already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create table and indexes)
    async fn init(&self) -> Result<()>;

    /// Find the visitor recorded for exactly this tuple, if any
    async fn find_exact(&self, tuple: &MatchTuple) -> StorageResult<Option<VisitorRecord>>;

    /// Record a new visitor for `tuple` with the given user id.
    ///
    /// Returns `StorageError::Conflict` if a visitor with the same tuple
    /// already exists; the existing record is left untouched.
    async fn insert(&self, tuple: &MatchTuple, user_id: &str) -> StorageResult<VisitorRecord>;

    /// Count visitors recorded for exactly this tuple
    async fn count_matching(&self, tuple: &MatchTuple) -> Result<i64>;
}
