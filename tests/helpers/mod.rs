#![allow(dead_code)]

use mnemo::config::MnemoConfig;
use mnemo::db;
use mnemo::engine::MemoryEngine;
use rusqlite::{params, Connection};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

/// Build an engine over a fresh in-memory database with default config.
pub fn test_engine() -> MemoryEngine {
    MemoryEngine::new(test_db(), MnemoConfig::default())
}

/// Backdate a unit's timestamps to simulate aging.
pub fn backdate(conn: &Connection, id: &str, days_ago: i64) {
    let old = (chrono::Utc::now() - chrono::Duration::days(days_ago)).to_rfc3339();
    conn.execute(
        "UPDATE memory_units SET created_at = ?1, updated_at = ?1, last_accessed = NULL WHERE id = ?2",
        params![old, id],
    )
    .unwrap();
}

/// An RFC 3339 instant `days` in the past.
pub fn days_ago(days: i64) -> String {
    (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339()
}

/// An RFC 3339 instant `days` in the future.
pub fn days_from_now(days: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::days(days)).to_rfc3339()
}
