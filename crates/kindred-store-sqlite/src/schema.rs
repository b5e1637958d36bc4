//! SQL schema for the Kindred SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per identity fact-record. `linked_id` is a weak reference to the
-- cluster primary's rowid: a plain indexed integer resolved by lookup, with
-- no foreign-key ownership and no cascade.
CREATE TABLE IF NOT EXISTS contacts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    email           TEXT,
    phone_number    TEXT,
    link_precedence TEXT NOT NULL,   -- 'primary' | 'secondary'
    linked_id       INTEGER,         -- set only on secondaries
    created_at      TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    updated_at      TEXT NOT NULL,
    deleted_at      TEXT             -- soft delete; never written here
);

CREATE INDEX IF NOT EXISTS contacts_email_idx  ON contacts(email);
CREATE INDEX IF NOT EXISTS contacts_phone_idx  ON contacts(phone_number);
CREATE INDEX IF NOT EXISTS contacts_linked_idx ON contacts(linked_id);

PRAGMA user_version = 1;
";
