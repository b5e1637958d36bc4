//! In-memory `ContactTx` used by the engine and view unit tests.
//!
//! The clock is controllable: the default advances one second per insert so
//! `created_at` ordering matches insertion order; the frozen variant stamps
//! every row identically, forcing primary selection onto the id tie-break.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
  Result,
  contact::{Contact, ContactId, LinkPrecedence, NewContact},
  store::ContactTx,
};

pub struct MemTx {
  contacts: Vec<Contact>,
  now:      DateTime<Utc>,
  tick:     Duration,
}

impl MemTx {
  pub fn new() -> Self {
    Self {
      contacts: Vec::new(),
      now:      Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
      tick:     Duration::seconds(1),
    }
  }

  /// Every row gets the identical `created_at`.
  pub fn with_frozen_clock() -> Self {
    Self { tick: Duration::zero(), ..Self::new() }
  }

  pub fn len(&self) -> usize { self.contacts.len() }

  pub fn all(&self) -> &[Contact] { &self.contacts }

  /// Corruption helper: turn a contact into a secondary with no link.
  pub fn corrupt_unlink(&mut self, id: ContactId) {
    let c = self.find_mut(id);
    c.link_precedence = LinkPrecedence::Secondary;
    c.linked_id = None;
  }

  /// Corruption helper: mark a contact primary without clearing its link.
  pub fn corrupt_promote(&mut self, id: ContactId) {
    self.find_mut(id).link_precedence = LinkPrecedence::Primary;
  }

  fn find_mut(&mut self, id: ContactId) -> &mut Contact {
    self
      .contacts
      .iter_mut()
      .find(|c| c.id == id)
      .expect("contact exists")
  }

  fn sorted(&self, mut rows: Vec<Contact>) -> Vec<Contact> {
    rows.sort_by(|a, b| {
      a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    });
    rows
  }
}

impl ContactTx for MemTx {
  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>> {
    let rows = self
      .contacts
      .iter()
      .filter(|c| {
        (email.is_some() && c.email.as_deref() == email)
          || (phone_number.is_some()
            && c.phone_number.as_deref() == phone_number)
      })
      .cloned()
      .collect();
    Ok(self.sorted(rows))
  }

  fn find_by_ids_or_linked_id(
    &mut self,
    ids: &BTreeSet<ContactId>,
  ) -> Result<Vec<Contact>> {
    let rows = self
      .contacts
      .iter()
      .filter(|c| {
        ids.contains(&c.id)
          || c.linked_id.is_some_and(|linked| ids.contains(&linked))
      })
      .cloned()
      .collect();
    Ok(self.sorted(rows))
  }

  fn get(&mut self, id: ContactId) -> Result<Option<Contact>> {
    Ok(self.contacts.iter().find(|c| c.id == id).cloned())
  }

  fn create(&mut self, input: NewContact) -> Result<Contact> {
    let contact = Contact {
      id:              ContactId(self.contacts.len() as i64 + 1),
      email:           input.email,
      phone_number:    input.phone_number,
      link_precedence: input.link_precedence,
      linked_id:       input.linked_id,
      created_at:      self.now,
      updated_at:      self.now,
      deleted_at:      None,
    };
    self.now = self.now + self.tick;
    self.contacts.push(contact.clone());
    Ok(contact)
  }

  fn demote(
    &mut self,
    ids: &BTreeSet<ContactId>,
    new_linked_id: ContactId,
  ) -> Result<()> {
    let now = self.now;
    for contact in &mut self.contacts {
      if ids.contains(&contact.id) {
        contact.link_precedence = LinkPrecedence::Secondary;
        contact.linked_id = Some(new_linked_id);
        contact.updated_at = now;
      }
    }
    Ok(())
  }
}
