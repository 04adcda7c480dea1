//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system: an ordered registry maps each
//! version to one SQL batch. The store's version lives in the `sys_params`
//! metadata table; a database without that table has never been migrated
//! and reads as version 0.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version this build targets.
pub const SCHEMA_VERSION: u32 = 1;

/// Migration v1: initial schema.
const CREATE_V1: &str = r#"
    -- Reserved metadata area. Holds the schema version.
    CREATE TABLE sys_params (
        name TEXT PRIMARY KEY,
        val  INTEGER NOT NULL
    );
    INSERT INTO sys_params (name, val) VALUES ('schema_ver', 0);

    -- Local bot accounts and mirrored feed accounts, keyed by handle.
    CREATE TABLE accounts (
        id                INTEGER PRIMARY KEY,
        created_at        INTEGER NOT NULL,
        user_url          TEXT NOT NULL,
        handle            TEXT NOT NULL UNIQUE,
        name              TEXT NOT NULL DEFAULT '',
        summary           TEXT NOT NULL DEFAULT '',
        profile_image_url TEXT NOT NULL DEFAULT '',
        site_url          TEXT NOT NULL DEFAULT '',
        feed_url          TEXT NOT NULL DEFAULT '',
        feed_last_updated INTEGER NOT NULL DEFAULT 0,
        next_check_due    INTEGER NOT NULL DEFAULT 0,
        pubkey            TEXT NOT NULL DEFAULT '',
        privkey           TEXT NOT NULL DEFAULT ''
    );

    -- One row per (account, follower) pair; a set, not a log. The pair is
    -- UNIQUE, not the primary key: primary keys report a different
    -- extended code on duplicate inserts.
    CREATE TABLE followers (
        account_id   INTEGER NOT NULL,
        user_url     TEXT NOT NULL,
        handle       TEXT NOT NULL,
        host         TEXT NOT NULL,
        shared_inbox TEXT NOT NULL,
        UNIQUE (account_id, user_url)
    );

    -- Append-only history of locally authored posts. No dedup at this
    -- layer; the posting path only toots a feed entry once per cycle.
    CREATE TABLE toots (
        account_id INTEGER NOT NULL,
        guid_hash  INTEGER NOT NULL,
        tooted_at  INTEGER NOT NULL,
        status_id  INTEGER NOT NULL,
        content    TEXT NOT NULL
    );

    -- Ingested feed entries; the unique pair makes re-polling idempotent.
    CREATE TABLE feed_posts (
        account_id  INTEGER NOT NULL,
        guid_hash   INTEGER NOT NULL,
        post_time   INTEGER NOT NULL,
        link        TEXT NOT NULL DEFAULT '',
        title       TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (account_id, guid_hash)
    );

    -- Pending outbound deliveries. AUTOINCREMENT so ids are never reused
    -- after the newest row is deleted; drain cursors depend on that.
    CREATE TABLE toot_queue (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        sending_handle TEXT NOT NULL,
        to_inbox       TEXT NOT NULL,
        tooted_at      INTEGER NOT NULL,
        status_id      INTEGER NOT NULL,
        content        TEXT NOT NULL
    );

    -- Indexes for the scheduler and per-account listings.
    CREATE INDEX idx_accounts_next_check_due ON accounts(next_check_due);
    CREATE INDEX idx_followers_account ON followers(account_id);
    CREATE INDEX idx_toots_account ON toots(account_id);
"#;

/// The registered batch for a version, if any.
fn batch_for(version: u32) -> Option<&'static str> {
    match version {
        1 => Some(CREATE_V1),
        _ => None,
    }
}

/// Read the schema version of an open database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let has_params: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'sys_params')",
        [],
        |row| row.get(0),
    )?;

    if !has_params {
        return Ok(0);
    }

    conn.query_row(
        "SELECT val FROM sys_params WHERE name = 'schema_ver'",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration(format!("schema_ver row unreadable: {}", e)))
}

/// Bring the database to [`SCHEMA_VERSION`].
///
/// Idempotent when nothing is pending. Each pending batch commits together
/// with its version bump, so a failure leaves the store at a well-defined
/// earlier version. Failures are fatal to startup; there is no retry and
/// no rollback of versions already applied.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let current = current_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at version {} but this build targets {}",
            current, SCHEMA_VERSION
        )));
    }
    if current == SCHEMA_VERSION {
        return Ok(());
    }

    tracing::info!(
        "migrating database schema from version {} to {}",
        current,
        SCHEMA_VERSION
    );

    for version in (current + 1)..=SCHEMA_VERSION {
        let batch = batch_for(version).ok_or_else(|| {
            StoreError::Migration(format!("no migration registered for version {}", version))
        })?;

        let tx = conn.transaction()?;
        tx.execute_batch(batch)
            .map_err(|e| StoreError::Migration(format!("applying version {}: {}", version, e)))?;
        tx.execute(
            "UPDATE sys_params SET val = ?1 WHERE name = 'schema_ver'",
            rusqlite::params![version],
        )
        .map_err(|e| StoreError::Migration(format!("recording version {}: {}", version, e)))?;
        tx.commit()
            .map_err(|e| StoreError::Migration(format!("committing version {}: {}", version, e)))?;

        tracing::info!("applied schema migration {}", version);
    }

    Ok(())
}
