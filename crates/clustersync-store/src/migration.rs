//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated chain store schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Blocks table: one row per stored block
        CREATE TABLE blocks (
            hash BLOB PRIMARY KEY,            -- 32 bytes, Blake3 of the sealed header
            number INTEGER NOT NULL,          -- block height
            parent_hash BLOB NOT NULL,        -- 32 bytes
            header BLOB NOT NULL,             -- canonical header bytes (content || seal)
            body BLOB NOT NULL,               -- CBOR-encoded BlockBody
            stored_at INTEGER NOT NULL        -- local insertion time (Unix ms)
        );

        CREATE INDEX idx_blocks_number ON blocks(number);
        CREATE INDEX idx_blocks_parent ON blocks(parent_hash);

        -- Single-row table holding the current tip
        CREATE TABLE chain_tip (
            id INTEGER PRIMARY KEY CHECK (id = 0),
            hash BLOB NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
