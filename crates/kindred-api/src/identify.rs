//! Handler for the `/identify` endpoint.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/identify` | Body: `{"email": ..., "phoneNumber": ...}`, either optional but not both absent |
//!
//! The response wraps the consolidated cluster view in a `contact` envelope:
//!
//! ```json
//! {"contact": {"primaryContactId": 1, "emails": [...],
//!              "phoneNumbers": [...], "secondaryContactIds": [...]}}
//! ```

use std::sync::Arc;

use axum::{Json, extract::State};
use kindred_core::{
  observation::Observation, store::ContactStore, view::ClusterView,
};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::error::ApiError;

// ─── Request body ────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /identify`. Clients are known to send the
/// phone number as a JSON number; it is coerced to its string form.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyBody {
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub phone_number: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<serde_json::Value>::deserialize(deserializer)? {
    None | Some(serde_json::Value::Null) => Ok(None),
    Some(serde_json::Value::String(s)) => Ok(Some(s)),
    Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
    Some(other) => Err(D::Error::custom(format!(
      "phoneNumber must be a string or number, got {other}"
    ))),
  }
}

// ─── Response ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
  pub contact: ClusterView,
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// `POST /identify`
pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<IdentifyBody>,
) -> Result<Json<IdentifyResponse>, ApiError>
where
  S: ContactStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  // Validation happens before any store access.
  let observation = Observation::new(body.email, body.phone_number)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

  let contact = store
    .identify(observation)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(IdentifyResponse { contact }))
}
