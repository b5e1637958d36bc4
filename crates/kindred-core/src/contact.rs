//! Contact — one identity fact-record.
//!
//! A contact is a single observed (email, phone) pairing. Contacts are
//! grouped into clusters: one primary (the canonical representative, always
//! the oldest member) and any number of secondaries linked to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::Observation;

/// Store-assigned monotonic identifier for a contact.
///
/// Assigned by the backend at insert time and never reused; ordering by id is
/// consistent with insertion order, which makes it usable as the tie-break
/// when two contacts share a `created_at`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl std::fmt::Display for ContactId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Whether a contact is its cluster's canonical representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

/// A persisted contact row.
///
/// `linked_id` is a weak reference: a plain id resolved by lookup, present
/// only on secondaries, pointing at the cluster's primary. It never owns the
/// record it names and deleting the target must not cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id:              ContactId,
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub link_precedence: LinkPrecedence,
  pub linked_id:       Option<ContactId>,
  /// Store-assigned at insert; immutable; the sole source of "which contact
  /// is older".
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  /// Soft-delete marker. Exposed for completeness; never written here.
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }
}

/// Input to [`crate::store::ContactTx::create`].
/// Id and both timestamps are always set by the store; they are not accepted
/// from callers.
#[derive(Debug, Clone)]
pub struct NewContact {
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub link_precedence: LinkPrecedence,
  pub linked_id:       Option<ContactId>,
}

impl NewContact {
  /// A fresh primary carrying the observation's fields.
  pub fn primary(observation: &Observation) -> Self {
    Self {
      email:           observation.email().map(str::to_owned),
      phone_number:    observation.phone_number().map(str::to_owned),
      link_precedence: LinkPrecedence::Primary,
      linked_id:       None,
    }
  }

  /// A secondary under `primary_id` carrying BOTH of the observation's
  /// fields, even when one of them duplicates a value already in the cluster.
  pub fn secondary(observation: &Observation, primary_id: ContactId) -> Self {
    Self {
      email:           observation.email().map(str::to_owned),
      phone_number:    observation.phone_number().map(str::to_owned),
      link_precedence: LinkPrecedence::Secondary,
      linked_id:       Some(primary_id),
    }
  }
}
