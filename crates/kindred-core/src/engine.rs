//! The reconciliation engine.
//!
//! Given a store of contacts linked in primary/secondary clusters and one new
//! observation, compute the minimal set of mutations (creations, demotions)
//! that keeps the store consistent, and return the id of the cluster's true
//! primary.
//!
//! The whole function runs against a [`ContactTx`], so a backend can execute
//! it inside a single transaction; partial application is never observable.

use std::collections::BTreeSet;

use crate::{
  Error, Result,
  contact::{ContactId, LinkPrecedence, NewContact},
  observation::Observation,
  store::ContactTx,
};

/// Reconcile one observation against the store.
///
/// Decides between three outcomes:
/// - no existing contact matches either field → a fresh primary is created;
/// - the observation links previously-independent clusters → the younger
///   primaries are demoted under the oldest one (a merge);
/// - the observation carries a field value new to its cluster → exactly one
///   secondary is created, carrying both input fields.
///
/// A merge also re-points secondaries that were linked to a demoted primary,
/// so every secondary's `linked_id` names the cluster's true primary and the
/// view builder can resolve membership in a single hop.
pub fn reconcile<T: ContactTx + ?Sized>(
  tx: &mut T,
  observation: &Observation,
) -> Result<ContactId> {
  let matched = tx
    .find_by_email_or_phone(observation.email(), observation.phone_number())?;

  // No match: a brand-new customer. Terminal case.
  let Some(first_match) = matched.first() else {
    let created = tx.create(NewContact::primary(observation))?;
    return Ok(created.id);
  };
  let anchor = first_match.id;

  // Resolve each match to its cluster's primary id.
  let mut candidates = BTreeSet::new();
  for contact in &matched {
    match contact.link_precedence {
      LinkPrecedence::Primary => {
        candidates.insert(contact.id);
      }
      LinkPrecedence::Secondary => {
        let linked = contact
          .linked_id
          .ok_or(Error::UnlinkedSecondary(contact.id))?;
        candidates.insert(linked);
      }
    }
  }

  // The union of every cluster touched by the match, oldest first. The
  // fetch cannot come back empty while matches exist, but a dangling link
  // chain is data corruption, not a panic.
  let cluster = tx.find_by_ids_or_linked_id(&candidates)?;
  let Some(primary) = cluster.first().cloned() else {
    return Err(Error::ContactNotFound(anchor));
  };

  // Merge: demote every rival primary, and flatten any secondary still
  // pointing at one, in a single bulk update.
  let stale: BTreeSet<ContactId> = cluster
    .iter()
    .filter(|c| c.id != primary.id)
    .filter(|c| c.is_primary() || c.linked_id != Some(primary.id))
    .map(|c| c.id)
    .collect();
  if !stale.is_empty() {
    tx.demote(&stale, primary.id)?;
  }

  // Augment: one new secondary iff the observation carries a value the
  // cluster has not seen, on either field. The created row stores both
  // fields regardless of which one was novel.
  let novel_email = observation
    .email()
    .is_some_and(|e| !cluster.iter().any(|c| c.email.as_deref() == Some(e)));
  let novel_phone = observation.phone_number().is_some_and(|p| {
    !cluster.iter().any(|c| c.phone_number.as_deref() == Some(p))
  });
  if novel_email || novel_phone {
    tx.create(NewContact::secondary(observation, primary.id))?;
  }

  Ok(primary.id)
}
