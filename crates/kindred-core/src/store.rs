//! The `ContactTx` and `ContactStore` traits.
//!
//! `ContactTx` is the synchronous, transaction-scoped surface the engine and
//! the view builder run against: every call made through one `ContactTx`
//! value belongs to one atomic unit, committed or rolled back as a whole by
//! the backend.
//!
//! `ContactStore` is the asynchronous facade that transports (HTTP handlers,
//! CLIs) depend on. Implemented by storage backends (e.g.
//! `kindred-store-sqlite`); higher layers depend on the abstraction, not on
//! any concrete backend.

use std::{collections::BTreeSet, future::Future};

use crate::{
  Result,
  contact::{Contact, ContactId, NewContact},
  observation::Observation,
  view::ClusterView,
};

// ─── Transaction-scoped trait ────────────────────────────────────────────────

/// Store operations available inside one transaction.
///
/// Implementations map backend failures into
/// [`Error::Store`](crate::Error::Store); domain errors pass through
/// untouched.
pub trait ContactTx {
  /// All contacts whose email or phone exactly equals the given value.
  /// An absent input field never matches (not even stored NULLs).
  /// Ordered by `created_at`, then id.
  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>>;

  /// The union of all clusters touched by `ids`: every contact whose id is
  /// in the set or whose `linked_id` is in the set, distinct, ordered by
  /// `created_at`, then id.
  fn find_by_ids_or_linked_id(
    &mut self,
    ids: &BTreeSet<ContactId>,
  ) -> Result<Vec<Contact>>;

  /// Fetch one contact. `None` if it does not exist.
  fn get(&mut self, id: ContactId) -> Result<Option<Contact>>;

  /// Persist a new contact. Id and both timestamps are store-assigned.
  fn create(&mut self, input: NewContact) -> Result<Contact>;

  /// Bulk re-link: set every listed contact to secondary precedence with
  /// `linked_id = new_linked_id`, touching `updated_at`. Idempotent.
  fn demote(
    &mut self,
    ids: &BTreeSet<ContactId>,
    new_linked_id: ContactId,
  ) -> Result<()>;
}

// ─── Async facade ────────────────────────────────────────────────────────────

/// Abstraction over a Kindred contact store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run the reconciliation algorithm for one observation inside one
  /// transaction and return the cluster's true primary id.
  fn reconcile(
    &self,
    observation: Observation,
  ) -> impl Future<Output = Result<ContactId, Self::Error>> + Send + '_;

  /// The canonical consolidated view of the cluster containing `id`.
  /// `None` if the contact does not exist.
  fn cluster_view(
    &self,
    id: ContactId,
  ) -> impl Future<Output = Result<Option<ClusterView>, Self::Error>> + Send + '_;

  /// Reconcile one observation and build the resulting cluster view in the
  /// SAME transaction — the atomic unit behind one inbound request. A
  /// conflict rolls the whole unit back; no partial mutation is observable.
  fn identify(
    &self,
    observation: Observation,
  ) -> impl Future<Output = Result<ClusterView, Self::Error>> + Send + '_;

  /// Retrieve a contact row by id. `None` if not found.
  fn get_contact(
    &self,
    id: ContactId,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// List all contact rows, ordered by `created_at`, then id.
  fn list_contacts(
    &self,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;
}
