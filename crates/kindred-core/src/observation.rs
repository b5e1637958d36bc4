//! Observation — one validated inbound (email, phone) pair.
//!
//! The construction rule is the reconciliation precondition: at least one of
//! the two fields must be present and non-empty. Keeping the fields private
//! makes the precondition hold for every `Observation` that exists, so the
//! engine never has to re-check it.

use serde::Serialize;

use crate::{Error, Result};

/// A single identity observation submitted for reconciliation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Observation {
  /// Build an observation, normalising empty strings to absent fields.
  ///
  /// Returns [`Error::MissingIdentifier`] when neither field carries a
  /// value — before any store access can happen.
  pub fn new(
    email: Option<String>,
    phone_number: Option<String>,
  ) -> Result<Self> {
    let email = email.filter(|e| !e.is_empty());
    let phone_number = phone_number.filter(|p| !p.is_empty());

    if email.is_none() && phone_number.is_none() {
      return Err(Error::MissingIdentifier);
    }

    Ok(Self { email, phone_number })
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }
}
