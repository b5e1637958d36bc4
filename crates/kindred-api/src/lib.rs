//! JSON REST API for Kindred.
//!
//! Exposes an axum [`Router`] backed by any
//! [`kindred_core::store::ContactStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kindred_api::api_router(store.clone()))
//! ```

pub mod contacts;
pub mod error;
pub mod identify;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use kindred_core::store::ContactStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ContactStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Reconciliation
    .route("/identify", post(identify::handler::<S>))
    // Read plumbing
    .route("/contacts", get(contacts::list::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/contacts/{id}/cluster", get(contacts::cluster::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
