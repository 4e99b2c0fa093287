//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: metric points
    r#"
    -- ============================================
    -- Aggregated metric points
    -- ============================================

    CREATE TABLE IF NOT EXISTS metric_points (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        organization_id  TEXT NOT NULL,
        account_id       TEXT NOT NULL,
        product_id       TEXT,
        question_id      TEXT,
        metric_type      TEXT NOT NULL,
        metric_name      TEXT NOT NULL,
        value            REAL NOT NULL,
        count            INTEGER NOT NULL,
        timestamp        TEXT NOT NULL,
        granularity      TEXT NOT NULL,
        metadata         JSON
    );

    CREATE INDEX IF NOT EXISTS idx_metric_points_org_ts
        ON metric_points(organization_id, timestamp);
    CREATE INDEX IF NOT EXISTS idx_metric_points_type
        ON metric_points(organization_id, metric_type, timestamp);
    CREATE INDEX IF NOT EXISTS idx_metric_points_ts
        ON metric_points(timestamp);
    "#,
    // Version 2: versioned recomputes
    r#"
    -- ============================================
    -- Versioned snapshots
    -- ============================================
    -- Every recompute writes under a fresh version. Reads only see rows whose
    -- version matches the organization's active_version.

    ALTER TABLE metric_points ADD COLUMN version INTEGER NOT NULL DEFAULT 0;

    CREATE INDEX IF NOT EXISTS idx_metric_points_version
        ON metric_points(organization_id, version);

    CREATE TABLE IF NOT EXISTS metric_snapshots (
        organization_id  TEXT PRIMARY KEY,
        active_version   INTEGER,
        last_version     INTEGER NOT NULL,
        fingerprint      TEXT,
        point_count      INTEGER NOT NULL DEFAULT 0,
        computed_at      TEXT
    );

    -- Rows written before versioning become each organization's version 0
    INSERT OR IGNORE INTO metric_snapshots (organization_id, active_version, last_version, point_count)
        SELECT organization_id, 0, 0, COUNT(*) FROM metric_points GROUP BY organization_id;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
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
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
