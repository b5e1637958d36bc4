//! [`SqliteStore`] — the SQLite implementation of [`ContactStore`].
//!
//! The engine and the view builder run as plain functions over a
//! [`TxContact`] scope, inside one `rusqlite` transaction on the dedicated
//! connection thread. `identify` reconciles and builds the view in the SAME
//! transaction, so a conflict rolls the whole request unit back and partial
//! application is never observable.

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior, types::Value};

use kindred_core::{
  contact::{Contact, ContactId, NewContact},
  engine, observation::Observation, store::{ContactStore, ContactTx},
  view::{self, ClusterView},
};

use crate::{
  Error, Result,
  encode::{CONTACT_COLUMNS, RawContact, encode_dt, encode_precedence},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Kindred contact store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside one transaction with the given behavior. A domain error
  /// from `f` rolls the transaction back (drop without commit); only a clean
  /// return commits.
  async fn in_tx<R, F>(&self, behavior: TransactionBehavior, f: F) -> Result<R>
  where
    F: FnOnce(&mut TxContact<'_>) -> kindred_core::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let outcome: kindred_core::Result<R> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(behavior)?;
        let mut scope = TxContact { tx: &tx };
        match f(&mut scope) {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          Err(e) => Ok(Err(e)),
        }
      })
      .await?;
    Ok(outcome?)
  }

  /// Mutating unit: takes the write lock up front so two concurrent
  /// first-time requests for the same customer serialise instead of both
  /// deciding "no match".
  async fn write_tx<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut TxContact<'_>) -> kindred_core::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.in_tx(TransactionBehavior::Immediate, f).await
  }

  /// Read-only unit: a consistent snapshot is enough.
  async fn read_tx<R, F>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut TxContact<'_>) -> kindred_core::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    self.in_tx(TransactionBehavior::Deferred, f).await
  }

  /// Test seam for planting hand-corrupted rows.
  #[cfg(test)]
  pub(crate) async fn raw_execute(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction scope ───────────────────────────────────────────────────────

/// One open transaction, seen through the core's [`ContactTx`] trait.
/// Backend failures are carried as
/// [`kindred_core::Error::Store`] so the engine's signatures stay
/// backend-free.
struct TxContact<'a> {
  tx: &'a rusqlite::Transaction<'a>,
}

fn store_err(
  e: impl std::error::Error + Send + Sync + 'static,
) -> kindred_core::Error {
  kindred_core::Error::Store(Box::new(e))
}

impl TxContact<'_> {
  fn select_contacts(
    &self,
    where_clause: &str,
    params: impl rusqlite::Params,
  ) -> kindred_core::Result<Vec<Contact>> {
    let sql = format!(
      "SELECT {CONTACT_COLUMNS} FROM contacts
       WHERE {where_clause}
       ORDER BY created_at, id"
    );
    let mut stmt = self.tx.prepare(&sql).map_err(store_err)?;
    let raws = stmt
      .query_map(params, RawContact::from_row)
      .map_err(store_err)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(store_err)?;

    raws
      .into_iter()
      .map(|raw| raw.into_contact().map_err(store_err))
      .collect()
  }
}

impl ContactTx for TxContact<'_> {
  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> kindred_core::Result<Vec<Contact>> {
    // An absent input field never matches; stored NULLs never equal anything.
    self.select_contacts(
      "(?1 IS NOT NULL AND email = ?1)
         OR (?2 IS NOT NULL AND phone_number = ?2)",
      rusqlite::params![email, phone_number],
    )
  }

  fn find_by_ids_or_linked_id(
    &mut self,
    ids: &BTreeSet<ContactId>,
  ) -> kindred_core::Result<Vec<Contact>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let placeholders =
      ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let params: Vec<Value> = ids
      .iter()
      .chain(ids.iter())
      .map(|id| Value::from(id.0))
      .collect();
    self.select_contacts(
      &format!("id IN ({placeholders}) OR linked_id IN ({placeholders})"),
      rusqlite::params_from_iter(params),
    )
  }

  fn get(&mut self, id: ContactId) -> kindred_core::Result<Option<Contact>> {
    let sql =
      format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1");
    let raw = self
      .tx
      .query_row(&sql, rusqlite::params![id.0], RawContact::from_row)
      .optional()
      .map_err(store_err)?;
    raw.map(|r| r.into_contact().map_err(store_err)).transpose()
  }

  fn create(&mut self, input: NewContact) -> kindred_core::Result<Contact> {
    let now = Utc::now();
    let now_str = encode_dt(now);
    self
      .tx
      .execute(
        "INSERT INTO contacts
           (email, phone_number, link_precedence, linked_id,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![
          input.email,
          input.phone_number,
          encode_precedence(input.link_precedence),
          input.linked_id.map(|id| id.0),
          now_str,
        ],
      )
      .map_err(store_err)?;

    Ok(Contact {
      id:              ContactId(self.tx.last_insert_rowid()),
      email:           input.email,
      phone_number:    input.phone_number,
      link_precedence: input.link_precedence,
      linked_id:       input.linked_id,
      created_at:      now,
      updated_at:      now,
      deleted_at:      None,
    })
  }

  fn demote(
    &mut self,
    ids: &BTreeSet<ContactId>,
    new_linked_id: ContactId,
  ) -> kindred_core::Result<()> {
    if ids.is_empty() {
      return Ok(());
    }
    let placeholders =
      ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let mut params: Vec<Value> = Vec::with_capacity(ids.len() + 2);
    params.push(Value::from(new_linked_id.0));
    params.push(Value::from(encode_dt(Utc::now())));
    params.extend(ids.iter().map(|id| Value::from(id.0)));

    self
      .tx
      .execute(
        &format!(
          "UPDATE contacts
           SET link_precedence = 'secondary', linked_id = ?, updated_at = ?
           WHERE id IN ({placeholders})"
        ),
        rusqlite::params_from_iter(params),
      )
      .map_err(store_err)?;
    Ok(())
  }
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  type Error = Error;

  async fn reconcile(&self, observation: Observation) -> Result<ContactId> {
    self
      .write_tx(move |tx| engine::reconcile(tx, &observation))
      .await
  }

  async fn cluster_view(&self, id: ContactId) -> Result<Option<ClusterView>> {
    self.read_tx(move |tx| view::cluster_view(tx, id)).await
  }

  async fn identify(&self, observation: Observation) -> Result<ClusterView> {
    self
      .write_tx(move |tx| {
        let primary_id = engine::reconcile(tx, &observation)?;
        view::cluster_view(tx, primary_id)?
          .ok_or(kindred_core::Error::ContactNotFound(primary_id))
      })
      .await
  }

  async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
    self.read_tx(move |tx| tx.get(id)).await
  }

  async fn list_contacts(&self) -> Result<Vec<Contact>> {
    let raws: Vec<RawContact> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY created_at, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawContact::into_contact).collect()
  }
}
