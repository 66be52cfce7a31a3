//! Error responses for the station API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use beacon_db::DbError;
use beacon_station::{StationError, StoreError};
use serde::Serialize;

/// JSON error body: `{ "code": "WRONG_CELL", "message": "..." }`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION".to_string(),
            message: message.into(),
        }
    }
}

/// HTTP status for a station error category.
fn status_for(kind: &str) -> StatusCode {
    match kind {
        "validation" | "invalid_quantity" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "wrong_cell" | "unknown_item" => StatusCode::UNPROCESSABLE_ENTITY,
        "invalid_state" | "duplicate" | "commit_failed" | "capacity_exceeded" | "insufficient_stock" => {
            StatusCode::CONFLICT
        }
        // Nothing to do yet; the terminal retries later.
        "not_yet_retrievable" | "no_capacity" | "nothing_to_put_away" | "no_bin_available" => {
            StatusCode::CONFLICT
        }
        "transport_failure" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StationError> for ApiError {
    fn from(error: StationError) -> Self {
        let kind = error.kind();
        ApiError {
            status: status_for(kind),
            code: kind.to_ascii_uppercase(),
            message: error.to_string(),
        }
    }
}

/// Repository errors take the same route as store errors.
impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        StationError::Store(StoreError::from(error)).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
