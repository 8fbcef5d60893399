use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::browser::BrowserClassifier;
use crate::geo::GeoResolver;
use crate::matcher::VisitorMatcher;
use crate::models::{MatchTuple, UserIdQuery, UserIdResponse};

pub struct AppState {
    pub geo: GeoResolver,
    pub classifier: Arc<dyn BrowserClassifier>,
    pub matcher: VisitorMatcher,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Build the match tuple for a request.
///
/// An unresolvable IP contributes empty location fields.
pub fn build_match_tuple(state: &AppState, query: &UserIdQuery) -> Result<MatchTuple, ApiError> {
    let browser = state.classifier.classify(&query.user_agent);
    let location = state.geo.resolve(&query.ip)?.unwrap_or_default();

    Ok(MatchTuple::new(query.finger_print.clone(), browser, location))
}

/// Resolve the visitor behind a fingerprint/IP/user-agent triple
pub async fn get_user_id(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<UserIdResponse>, ApiError> {
    let tuple = build_match_tuple(&state, &query)?;
    let id = state.matcher.resolve_or_create(&tuple).await?;

    Ok(Json(UserIdResponse { id }))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
