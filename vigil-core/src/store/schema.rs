//! Telemetry store schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! A failed migration is fatal: the caller must abort initialization
//! rather than operate against a half-migrated schema.

use crate::error::{Error, Result};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: query event log
    r#"
    CREATE TABLE IF NOT EXISTS query_events (
        id            TEXT PRIMARY KEY,
        session_id    TEXT NOT NULL,
        agent_type    TEXT NOT NULL,
        source        TEXT NOT NULL,
        start_time    INTEGER NOT NULL,
        duration      INTEGER NOT NULL,
        project_path  TEXT,
        tab_id        TEXT,
        is_remote     INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_query_events_start ON query_events(start_time);
    CREATE INDEX IF NOT EXISTS idx_query_events_session ON query_events(session_id);
    CREATE INDEX IF NOT EXISTS idx_query_events_agent ON query_events(agent_type);
    "#,
    // Version 2: Auto Run batch tracking
    r#"
    CREATE TABLE IF NOT EXISTS auto_run_sessions (
        id               TEXT PRIMARY KEY,
        doc_path         TEXT NOT NULL,
        started_at       INTEGER NOT NULL,
        ended_at         INTEGER,
        total_tasks      INTEGER NOT NULL,
        completed_tasks  INTEGER NOT NULL DEFAULT 0,
        failed_tasks     INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS auto_run_tasks (
        id          TEXT PRIMARY KEY,
        run_id      TEXT NOT NULL REFERENCES auto_run_sessions(id),
        task_index  INTEGER NOT NULL,
        started_at  INTEGER NOT NULL,
        ended_at    INTEGER,
        status      TEXT NOT NULL,
        error       TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_auto_run_tasks_run ON auto_run_tasks(run_id, task_index);
    CREATE INDEX IF NOT EXISTS idx_auto_run_sessions_started ON auto_run_sessions(started_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking telemetry store migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)
                .map_err(|e| Error::Migration(format!("migration to v{} failed: {}", version, e)))?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])
                .map_err(|e| {
                    Error::Migration(format!("failed to record version {}: {}", version, e))
                })?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // All tables present
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('query_events', 'auto_run_sessions', 'auto_run_tasks')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_partial_upgrade_applies_remaining() {
        let conn = Connection::open_in_memory().unwrap();
        // Apply only v1, as an old install would have
        conn.execute_batch(MIGRATIONS[0]).unwrap();
        conn.execute("PRAGMA user_version = 1", []).unwrap();

        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'auto_run_tasks'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
