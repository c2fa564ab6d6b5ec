//! Database schema migrations for vigil.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current migration
//! version.
//!
//! The v1 baseline carries the early single-channel escalation shape
//! (`channel` + `delay_minutes` columns on `escalation_plans`). v2 moves to
//! the ordered steps-array shape and backfills existing plans; v3 adds the
//! dispatcher's resume columns; v4 adds the subscriptions table.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current schema
/// version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    // Ensure schema_version table exists
    create_schema_version_table(conn)?;

    // Get current version
    let current_version = get_schema_version(conn);

    // Apply migrations sequentially
    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }
    if current_version < 4 {
        migrate_v4(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub(crate) fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            0
        } else {
            tracing::warn!("failed to read schema_version: {e}");
            0
        }
    })
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: Initial schema (baseline).
///
/// The base tables are created by `Store::migrate()` directly, so this only
/// marks the version.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration v2: steps-array escalation plans.
///
/// The early model stored exactly one (channel, delay_minutes) pair per
/// plan. v2 adds the ordered `steps` JSON column and backfills it from the
/// old columns. The old columns are left in place; the store never reads
/// them past this point.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE escalation_plans ADD COLUMN steps TEXT NOT NULL DEFAULT '[]';",
    )?;

    // Backfill: one old pair becomes a single-step plan.
    tx.execute(
        "UPDATE escalation_plans
         SET steps = json_array(json_object('channel', channel, 'delay_min', delay_minutes))
         WHERE steps = '[]' AND channel IS NOT NULL",
        [],
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;

    tx.commit()?;
    Ok(())
}

/// Migration v3: dispatcher resume columns.
///
/// Adds:
/// - checkins.escalating_since: anchor for step delays
/// - escalation_events.attempts: retry counter within a step
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE checkins ADD COLUMN escalating_since TEXT;
         ALTER TABLE escalation_events ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0;",
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [3])?;

    tx.commit()?;
    Ok(())
}

/// Migration v4: subscription rows.
///
/// Billing happens on the store platforms; the row carries the tier flag
/// for entitlement checks and rides along in exports.
fn migrate_v4(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id                      TEXT PRIMARY KEY,
            user_id                 TEXT NOT NULL,
            platform                TEXT NOT NULL,
            product_id              TEXT NOT NULL,
            tier                    TEXT NOT NULL DEFAULT 'free',
            status                  TEXT NOT NULL DEFAULT 'active',
            current_period_start    TEXT,
            current_period_end      TEXT,
            external_transaction_id TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );",
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [4])?;

    tx.commit()?;
    Ok(())
}
