//! Error-to-HTTP response conversion.
//!
//! Wraps [`streamgate_common::Error`] so request handlers can return
//! `Result<Response, AppError>` and every failure becomes a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use streamgate_common::Error;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(Error);

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self(inner)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %self.0, "Request refused");
        }

        (status, self.0.to_string()).into_response()
    }
}
