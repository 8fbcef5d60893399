//! Visitor matching
//!
//! Resolve-or-create over the identity store: an exact match on the
//! (fingerprint, browser, city, state, country) tuple returns the recorded
//! user id, anything else mints and persists a new one.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::MatchTuple;
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("failed to look up visitor: {0}")]
    Retrieval(#[source] StorageError),
    #[error("failed to create visitor: {0}")]
    Creation(#[source] StorageError),
}

#[derive(Clone)]
pub struct VisitorMatcher {
    storage: Arc<dyn Storage>,
}

impl VisitorMatcher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Return the user id recorded for `tuple`, creating one on first sight.
    ///
    /// A lookup fault is returned as [`MatchError::Retrieval`] without
    /// attempting creation. Every id returned has been durably stored.
    pub async fn resolve_or_create(&self, tuple: &MatchTuple) -> Result<String, MatchError> {
        if let Some(record) = self
            .storage
            .find_exact(tuple)
            .await
            .map_err(MatchError::Retrieval)?
        {
            debug!(user_id = %record.user_id, "matched existing visitor");
            return Ok(record.user_id);
        }

        let user_id = generate_user_id();

        match self.storage.insert(tuple, &user_id).await {
            Ok(record) => {
                info!(user_id = %record.user_id, browser = %tuple.browser, "created visitor");
                Ok(record.user_id)
            }
            Err(StorageError::Conflict) => {
                // Another request created the same tuple between our lookup and insert
                debug!("visitor created concurrently, re-reading");
                match self
                    .storage
                    .find_exact(tuple)
                    .await
                    .map_err(MatchError::Retrieval)?
                {
                    Some(record) => Ok(record.user_id),
                    None => Err(MatchError::Creation(StorageError::Other(anyhow::anyhow!(
                        "insert conflicted but no visitor matches the tuple"
                    )))),
                }
            }
            Err(e) => Err(MatchError::Creation(e)),
        }
    }
}

/// Random, collision-resistant visitor id (UUID v4, 32 lowercase hex chars).
pub fn generate_user_id() -> String {
    Uuid::new_v4().simple().to_string()
}
