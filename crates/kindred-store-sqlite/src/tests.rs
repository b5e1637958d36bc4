//! Integration tests for `SqliteStore` against an in-memory database.

use kindred_core::{
  contact::{ContactId, LinkPrecedence},
  observation::Observation,
  store::ContactStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn obs(email: Option<&str>, phone: Option<&str>) -> Observation {
  Observation::new(email.map(str::to_owned), phone.map(str::to_owned))
    .expect("valid observation")
}

// ─── New identity ────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_observation_creates_one_primary() {
  let s = store().await;

  let id = s.reconcile(obs(Some("a@x.com"), None)).await.unwrap();

  let contact = s.get_contact(id).await.unwrap().unwrap();
  assert_eq!(contact.link_precedence, LinkPrecedence::Primary);
  assert_eq!(contact.linked_id, None);
  assert_eq!(contact.deleted_at, None);

  let view = s.cluster_view(id).await.unwrap().unwrap();
  assert_eq!(view.primary_contact_id, id);
  assert_eq!(view.emails, ["a@x.com"]);
  assert!(view.phone_numbers.is_empty());
  assert!(view.secondary_contact_ids.is_empty());

  assert_eq!(s.list_contacts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn ids_are_assigned_monotonically() {
  let s = store().await;

  let first = s.reconcile(obs(Some("a@x.com"), None)).await.unwrap();
  let second = s.reconcile(obs(Some("b@x.com"), None)).await.unwrap();
  let third = s.reconcile(obs(Some("c@x.com"), None)).await.unwrap();

  assert!(first < second && second < third);
}

// ─── Augmentation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn novel_phone_creates_secondary_and_view_keeps_order() {
  let s = store().await;

  let primary = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();
  let again = s
    .reconcile(obs(Some("a@x.com"), Some("222")))
    .await
    .unwrap();
  assert_eq!(primary, again);

  let all = s.list_contacts().await.unwrap();
  assert_eq!(all.len(), 2);
  let secondary = &all[1];
  assert_eq!(secondary.link_precedence, LinkPrecedence::Secondary);
  assert_eq!(secondary.linked_id, Some(primary));
  // The secondary stores both fields even though only the phone was novel.
  assert_eq!(secondary.email.as_deref(), Some("a@x.com"));
  assert_eq!(secondary.phone_number.as_deref(), Some("222"));

  let view = s.cluster_view(primary).await.unwrap().unwrap();
  assert_eq!(view.phone_numbers, ["111", "222"]);
  assert_eq!(view.emails, ["a@x.com"]);
  assert_eq!(view.secondary_contact_ids, [secondary.id]);
}

// ─── Idempotence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeating_a_known_pair_mutates_nothing() {
  let s = store().await;

  let first = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();
  let before = s.list_contacts().await.unwrap();

  let second = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();

  assert_eq!(first, second);
  let after = s.list_contacts().await.unwrap();
  assert_eq!(before.len(), after.len());
  for (b, a) in before.iter().zip(after.iter()) {
    assert_eq!(b.updated_at, a.updated_at);
  }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn linking_observation_merges_and_creates_nothing() {
  let s = store().await;

  let p1 = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();
  let p2 = s
    .reconcile(obs(Some("b@x.com"), Some("222")))
    .await
    .unwrap();
  assert_ne!(p1, p2);

  // Both values already exist across the union: merge only, no creation.
  let winner = s
    .reconcile(obs(Some("a@x.com"), Some("222")))
    .await
    .unwrap();
  assert_eq!(winner, p1);
  assert_eq!(s.list_contacts().await.unwrap().len(), 2);

  let demoted = s.get_contact(p2).await.unwrap().unwrap();
  assert_eq!(demoted.link_precedence, LinkPrecedence::Secondary);
  assert_eq!(demoted.linked_id, Some(p1));

  // The view is the same regardless of which member id is asked about.
  for member in [p1, p2] {
    let view = s.cluster_view(member).await.unwrap().unwrap();
    assert_eq!(view.primary_contact_id, p1);
    assert_eq!(view.emails, ["a@x.com", "b@x.com"]);
    assert_eq!(view.phone_numbers, ["111", "222"]);
    assert_eq!(view.secondary_contact_ids, [p2]);
  }
}

#[tokio::test]
async fn merge_flattens_stale_secondary_chains() {
  let s = store().await;

  let p1 = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();
  let p2 = s
    .reconcile(obs(Some("b@x.com"), Some("222")))
    .await
    .unwrap();
  // Grow the second cluster before merging it away.
  s.reconcile(obs(Some("b@x.com"), Some("333"))).await.unwrap();
  s.reconcile(obs(Some("c@x.com"), Some("222"))).await.unwrap();

  s.reconcile(obs(Some("a@x.com"), Some("222"))).await.unwrap();

  // No surviving secondary may point at the demoted primary; every link
  // lands directly on the true primary.
  for contact in s.list_contacts().await.unwrap() {
    if contact.id == p1 {
      assert_eq!(contact.link_precedence, LinkPrecedence::Primary);
    } else {
      assert_eq!(contact.link_precedence, LinkPrecedence::Secondary);
      assert_eq!(
        contact.linked_id,
        Some(p1),
        "contact {} still chained through {}",
        contact.id,
        p2
      );
    }
  }

  let view = s.cluster_view(p2).await.unwrap().unwrap();
  assert_eq!(view.primary_contact_id, p1);
  assert_eq!(view.emails, ["a@x.com", "b@x.com", "c@x.com"]);
  assert_eq!(view.phone_numbers, ["111", "222", "333"]);
}

#[tokio::test]
async fn identify_is_one_atomic_unit() {
  let s = store().await;

  s.reconcile(obs(Some("a@x.com"), Some("111"))).await.unwrap();
  let view = s.identify(obs(Some("a@x.com"), Some("222"))).await.unwrap();

  assert_eq!(view.emails, ["a@x.com"]);
  assert_eq!(view.phone_numbers, ["111", "222"]);
  assert_eq!(view.secondary_contact_ids.len(), 1);
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_contact_missing_returns_none() {
  let s = store().await;
  assert!(s.get_contact(ContactId(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn cluster_view_missing_returns_none() {
  let s = store().await;
  assert!(s.cluster_view(ContactId(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn email_match_is_exact() {
  let s = store().await;

  s.reconcile(obs(Some("a@x.com"), Some("111"))).await.unwrap();
  // Prefix/case variants are different customers: matching is exact.
  let other = s.reconcile(obs(Some("A@x.com"), None)).await.unwrap();

  let contact = s.get_contact(other).await.unwrap().unwrap();
  assert_eq!(contact.link_precedence, LinkPrecedence::Primary);
  assert_eq!(s.list_contacts().await.unwrap().len(), 2);
}

// ─── Corruption detection ────────────────────────────────────────────────────

#[tokio::test]
async fn two_primaries_in_one_cluster_is_surfaced_not_repaired() {
  let s = store().await;

  let p = s
    .reconcile(obs(Some("a@x.com"), Some("111")))
    .await
    .unwrap();
  // Plant a second primary inside the same cluster behind the store's back.
  s.raw_execute(format!(
    "INSERT INTO contacts
       (email, phone_number, link_precedence, linked_id, created_at, updated_at)
     VALUES ('b@x.com', NULL, 'primary', {p},
             '2030-01-01T00:00:00+00:00', '2030-01-01T00:00:00+00:00');"
  ))
  .await
  .unwrap();

  let err = s.cluster_view(p).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(kindred_core::Error::CorruptCluster {
      primaries: 2,
      ..
    })
  ));

  // Nothing was rewritten by the failed read.
  let planted = s.list_contacts().await.unwrap();
  assert_eq!(planted.len(), 2);
  assert!(planted.iter().all(|c| c.is_primary()));
}

#[tokio::test]
async fn unlinked_secondary_is_surfaced_as_corruption() {
  let s = store().await;

  let p = s.reconcile(obs(Some("a@x.com"), None)).await.unwrap();
  s.raw_execute(format!(
    "UPDATE contacts SET link_precedence = 'secondary', linked_id = NULL
     WHERE id = {p};"
  ))
  .await
  .unwrap();

  let err = s.cluster_view(p).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(kindred_core::Error::UnlinkedSecondary(id)) if id == p
  ));
}
