//! Error types for `kindred-core`.

use thiserror::Error;

use crate::contact::ContactId;

#[derive(Debug, Error)]
pub enum Error {
  /// Both identifying fields were absent or empty. Raised by
  /// [`crate::observation::Observation::new`] before any store access.
  #[error("at least one of email or phone number must be provided")]
  MissingIdentifier,

  #[error("contact not found: {0}")]
  ContactNotFound(ContactId),

  /// A secondary contact with no `linked_id` — pre-existing data corruption.
  #[error("secondary contact {0} has no linked primary")]
  UnlinkedSecondary(ContactId),

  /// A cluster was read back with zero or more than one primary, or with a
  /// link chain that does not terminate at its primary. Pre-existing data
  /// corruption; surfaced, never silently repaired.
  #[error("cluster around contact {contact} has {primaries} primaries")]
  CorruptCluster { contact: ContactId, primaries: usize },

  /// Transient failure from the underlying store (conflict, connection,
  /// timeout). Propagated unchanged; the whole reconcile unit is atomic, so
  /// the caller may retry it wholesale.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
