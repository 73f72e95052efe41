//! SQL DDL for all mnemo tables.
//!
//! Defines the `memory_units`, `unit_dependencies`, `related_units`,
//! `memory_log`, and `schema_meta` tables. All DDL uses `IF NOT EXISTS` for
//! idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for mnemo's core tables.
const SCHEMA_SQL: &str = r#"
-- Cached query results
CREATE TABLE IF NOT EXISTS memory_units (
    id TEXT PRIMARY KEY,
    tool_name TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    original_params TEXT NOT NULL,
    abstract_params TEXT NOT NULL,
    complexity REAL NOT NULL DEFAULT 0.0,
    is_compound INTEGER NOT NULL DEFAULT 0,
    context_id TEXT,
    payload TEXT NOT NULL,
    computed_at TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 1.0 CHECK(confidence >= 0.0 AND confidence <= 1.0),
    validated INTEGER NOT NULL DEFAULT 0,
    access_count INTEGER NOT NULL DEFAULT 0,
    hit_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    tier TEXT NOT NULL DEFAULT 'short_term' CHECK(tier IN ('short_term','mid_term','long_term','archived')),
    expires_at TEXT,
    tags TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_units_fingerprint ON memory_units(fingerprint);
CREATE INDEX IF NOT EXISTS idx_units_tool ON memory_units(tool_name);
CREATE INDEX IF NOT EXISTS idx_units_context ON memory_units(context_id);
CREATE INDEX IF NOT EXISTS idx_units_tier_expires ON memory_units(tier, expires_at);
CREATE INDEX IF NOT EXISTS idx_units_confidence ON memory_units(confidence);

-- Entity dependency links
CREATE TABLE IF NOT EXISTS unit_dependencies (
    unit_id TEXT NOT NULL REFERENCES memory_units(id) ON DELETE CASCADE,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    relationship TEXT NOT NULL CHECK(relationship IN ('primary','secondary','reference')),
    position INTEGER NOT NULL DEFAULT 0,
    UNIQUE(unit_id, entity_type, entity_id)
);

CREATE INDEX IF NOT EXISTS idx_deps_entity ON unit_dependencies(entity_type, entity_id);

-- Undirected unit associations (a < b)
CREATE TABLE IF NOT EXISTS related_units (
    unit_a TEXT NOT NULL REFERENCES memory_units(id) ON DELETE CASCADE,
    unit_b TEXT NOT NULL REFERENCES memory_units(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    UNIQUE(unit_a, unit_b)
);

CREATE INDEX IF NOT EXISTS idx_related_a ON related_units(unit_a);
CREATE INDEX IF NOT EXISTS idx_related_b ON related_units(unit_b);

-- Audit log
CREATE TABLE IF NOT EXISTS memory_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('create','hit','validate','invalidate','cascade','promote','archive','delete','link')),
    unit_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
