//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure leaves the server as a JSON `{"error": "..."}` body.
//! Validation failures are the client's to fix (400); store failures are
//! 500s — the reconcile unit is atomic, so a transient 500 is safe to retry
//! wholesale.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Anything the backend reports: transaction conflicts, I/O failures, and
  /// cluster corruption surfaced by the view builder.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a backend error. Handlers use this as `.map_err(ApiError::store)`.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match self {
      Self::NotFound(m) | Self::BadRequest(m) => m,
      Self::Store(e) => e.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
