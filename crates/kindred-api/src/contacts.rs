//! Handlers for `/contacts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/contacts` | All contact rows, oldest first |
//! | `GET`  | `/contacts/:id` | One raw row; 404 if not found |
//! | `GET`  | `/contacts/:id/cluster` | Consolidated view from any member id |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use kindred_core::{
  contact::{Contact, ContactId},
  store::ContactStore,
  view::ClusterView,
};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /contacts`
pub async fn list<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: ContactStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contacts = store
    .list_contacts()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contacts))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /contacts/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError>
where
  S: ContactStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let contact = store
    .get_contact(ContactId(id))
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}

// ─── Cluster view ─────────────────────────────────────────────────────────────

/// `GET /contacts/:id/cluster`
pub async fn cluster<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ClusterView>, ApiError>
where
  S: ContactStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let view = store
    .cluster_view(ContactId(id))
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(view))
}
