use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::{protocols::error::ErrorResponse, serving::ServingError};

pub fn bad_request(message: impl Into<String>) -> Response {
    ErrorResponse::bad_request(message).into_response()
}

pub fn not_found(message: impl Into<String>) -> Response {
    ErrorResponse::not_found(message).into_response()
}

pub fn internal_error(message: impl Into<String>) -> Response {
    ErrorResponse::internal(message).into_response()
}

/// Serialize an error body under the status it carries
pub fn create_error(error: ErrorResponse) -> Response {
    let status =
        StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error)).into_response()
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        create_error(self)
    }
}

impl IntoResponse for ServingError {
    fn into_response(self) -> Response {
        match self {
            ServingError::Rejected(response) => create_error(response),
            ServingError::Internal(e) => {
                error!(error = ?e, "Internal error while serving request");
                internal_error(e.to_string())
            }
        }
    }
}
