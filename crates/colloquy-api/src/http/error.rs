//! Application error type mapping to HTTP status codes and the error body.
//!
//! Every non-2xx response carries `{code, message, details?}`. Internal
//! diagnostic context is logged here and never serialized.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use colloquy_types::error::{AuthError, ErrorDetail, ErrorKind, ServiceError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub struct AppError(pub ServiceError);

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        AppError(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError(ServiceError::validation("Invalid request body").with_internal(e.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "no_details")]
    details: &'a [ErrorDetail],
}

fn no_details(details: &&[ErrorDetail]) -> bool {
    details.is_empty()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match (err.kind, err.internal.as_deref()) {
            (ErrorKind::Server, Some(internal)) => {
                tracing::error!(code = err.kind.code(), internal, "{}", err.message);
            }
            (ErrorKind::Server, None) => {
                tracing::error!(code = err.kind.code(), "{}", err.message);
            }
            (_, Some(internal)) => {
                tracing::debug!(code = err.kind.code(), internal, "{}", err.message);
            }
            (_, None) => {
                tracing::debug!(code = err.kind.code(), "{}", err.message);
            }
        }

        let body = ErrorBody {
            code: err.kind.code(),
            message: &err.message,
            details: &err.details,
        };
        (status, Json(body)).into_response()
    }
}
