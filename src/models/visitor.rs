use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::browser::Browser;

/// Coarse location derived from the visitor's IP, in a single locale.
///
/// Unresolved fields are empty strings rather than absent, so an
/// unresolvable IP still produces a matchable value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: String,
    pub country: String,
}

/// The exact-match key for visitor lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchTuple {
    pub fingerprint: String,
    pub browser: Browser,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl MatchTuple {
    pub fn new(fingerprint: impl Into<String>, browser: Browser, location: Location) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            browser,
            city: location.city,
            state: location.state,
            country: location.country,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VisitorRecord {
    pub id: i64,
    #[sqlx(rename = "finger_print")]
    pub fingerprint: String,
    pub browser: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub user_id: String,
    pub last_update: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub finger_print: String,
    pub ip: String,
    pub user_agent: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserIdResponse {
    pub id: String,
}
