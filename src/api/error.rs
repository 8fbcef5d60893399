use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::geo::GeoError;
use crate::matcher::MatchError;

/// Any failure while resolving a visitor.
///
/// Every variant is reported as a 500 with the error text as body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Match(#[from] MatchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "failed to resolve visitor");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
