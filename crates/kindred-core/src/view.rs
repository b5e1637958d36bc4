//! The consolidated cluster view — never stored, always derived.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  contact::{Contact, ContactId, LinkPrecedence},
  store::ContactTx,
};

/// The canonical projection of one cluster: the primary's id, every distinct
/// email and phone value in first-seen order (primary's own values first),
/// and the secondary member ids in age order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
  pub primary_contact_id:    ContactId,
  pub emails:                Vec<String>,
  pub phone_numbers:         Vec<String>,
  pub secondary_contact_ids: Vec<ContactId>,
}

/// Build the view of the cluster containing `id`, which may name any member.
///
/// Returns `None` when the contact does not exist. Fails with
/// [`Error::CorruptCluster`] when the cluster read back does not have exactly
/// one primary, or its primary is not the contact the link resolved to —
/// corruption is surfaced, never repaired here.
pub fn cluster_view<T: ContactTx + ?Sized>(
  tx: &mut T,
  id: ContactId,
) -> Result<Option<ClusterView>> {
  let Some(contact) = tx.get(id)? else {
    return Ok(None);
  };

  // One hop at most: merges flatten chains, so a secondary's linked_id names
  // the true primary directly.
  let primary_id = match contact.link_precedence {
    LinkPrecedence::Primary => contact.id,
    LinkPrecedence::Secondary => {
      contact.linked_id.ok_or(Error::UnlinkedSecondary(contact.id))?
    }
  };

  let mut ids = BTreeSet::new();
  ids.insert(primary_id);
  let cluster = tx.find_by_ids_or_linked_id(&ids)?;

  let primaries: Vec<&Contact> =
    cluster.iter().filter(|c| c.is_primary()).collect();
  if primaries.len() != 1 || primaries[0].id != primary_id {
    return Err(Error::CorruptCluster {
      contact:   id,
      primaries: primaries.len(),
    });
  }

  Ok(Some(build(primary_id, &cluster)))
}

/// Project an already-fetched, `created_at`-ordered cluster. The primary has
/// the earliest timestamp, so it contributes its values first.
fn build(primary_id: ContactId, cluster: &[Contact]) -> ClusterView {
  let mut emails = Vec::new();
  let mut phone_numbers = Vec::new();
  let mut secondary_contact_ids = Vec::new();

  for contact in cluster {
    if let Some(email) = &contact.email
      && !emails.contains(email)
    {
      emails.push(email.clone());
    }
    if let Some(phone) = &contact.phone_number
      && !phone_numbers.contains(phone)
    {
      phone_numbers.push(phone.clone());
    }
    if contact.id != primary_id {
      secondary_contact_ids.push(contact.id);
    }
  }

  ClusterView {
    primary_contact_id: primary_id,
    emails,
    phone_numbers,
    secondary_contact_ids,
  }
}
