//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Client(#[from] rapport_client::Error),
  #[error("configuration error: {0}")]
  Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    use rapport_client::Error as C;

    let status = match &self {
      Error::Client(C::NotFound(_)) => StatusCode::NOT_FOUND,
      Error::Client(C::Conflict(_)) => StatusCode::CONFLICT,
      Error::Client(C::Forbidden(_)) => StatusCode::FORBIDDEN,
      Error::Client(C::InvalidLink(_) | C::Invalid(_)) => StatusCode::BAD_REQUEST,
      Error::Client(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
      return (status, "Internal Server Error").into_response();
    }
    (status, self.to_string()).into_response()
  }
}
