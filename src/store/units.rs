//! Memory-unit CRUD and indexed queries.
//!
//! [`insert_unit`] is the single write entry point; it runs inside a
//! transaction (unit row, dependency rows, audit log) so a concurrent reader
//! sees either the whole record or nothing. Lookups come in the index shapes
//! the retrieval pipeline and the invalidation engine need: by fingerprint,
//! by context, by tool recency, by dependency key, by confidence range.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{MemoryError, Result};
use crate::store::types::{dedupe_dependencies, Dependency, MemoryUnit, Tier};
use crate::store::now_rfc3339;

/// Input to [`insert_unit`]. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub tool_name: String,
    pub fingerprint: String,
    pub original_params: Value,
    pub abstract_params: Value,
    pub complexity: f64,
    pub is_compound: bool,
    pub context_id: Option<String>,
    pub payload: Value,
    pub confidence: f64,
    pub tier: Tier,
    pub expires_at: Option<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<Dependency>,
}

/// Full write path: unit row → dependency rows → audit log, in one transaction.
///
/// Creation counts as the first access (`access_count = 1`): the result was
/// just computed for the caller.
pub fn insert_unit(conn: &mut Connection, new: NewUnit) -> Result<MemoryUnit> {
    let tx = conn.transaction()?;

    let id = uuid::Uuid::now_v7().to_string();
    let now = now_rfc3339();
    let dependencies = dedupe_dependencies(new.dependencies);

    tx.execute(
        "INSERT INTO memory_units (id, tool_name, fingerprint, original_params, abstract_params, \
         complexity, is_compound, context_id, payload, computed_at, confidence, validated, \
         access_count, hit_count, last_accessed, created_at, updated_at, tier, expires_at, tags) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 1, 0, NULL, ?10, ?10, ?12, ?13, ?14)",
        params![
            id,
            new.tool_name,
            new.fingerprint,
            new.original_params.to_string(),
            new.abstract_params.to_string(),
            new.complexity,
            new.is_compound,
            new.context_id,
            new.payload.to_string(),
            now,
            new.confidence,
            new.tier.as_str(),
            new.expires_at,
            serde_json::to_string(&new.tags)?,
        ],
    )?;

    for (position, dep) in dependencies.iter().enumerate() {
        tx.execute(
            "INSERT INTO unit_dependencies (unit_id, entity_type, entity_id, relationship, position) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                dep.entity_type,
                dep.entity_id,
                dep.relationship.as_str(),
                position as i64
            ],
        )?;
    }

    write_audit_log(&tx, "create", &id, None)?;
    tx.commit()?;

    Ok(MemoryUnit {
        id,
        tool_name: new.tool_name,
        fingerprint: new.fingerprint,
        original_params: new.original_params,
        abstract_params: new.abstract_params,
        complexity: new.complexity,
        is_compound: new.is_compound,
        context_id: new.context_id,
        payload: new.payload,
        computed_at: now.clone(),
        confidence: new.confidence,
        validated: false,
        access_count: 1,
        hit_count: 0,
        last_accessed: None,
        created_at: now.clone(),
        updated_at: now,
        tier: new.tier,
        expires_at: new.expires_at,
        tags: new.tags,
        dependencies,
        related: Vec::new(),
    })
}

/// Fetch a single unit by id, with dependencies and related ids hydrated.
pub fn get_unit(conn: &Connection, id: &str) -> Result<Option<MemoryUnit>> {
    let unit = conn
        .query_row(
            &format!("SELECT {UNIT_COLUMNS} FROM memory_units WHERE id = ?1"),
            params![id],
            unit_from_row,
        )
        .optional()?;

    match unit {
        Some(mut unit) => {
            unit.dependencies = load_dependencies(conn, &unit.id)?;
            unit.related = load_related(conn, &unit.id)?;
            Ok(Some(unit))
        }
        None => Ok(None),
    }
}

/// Returnable units matching a fingerprint: not archived, not expired,
/// confidence at or above `min_confidence` (and strictly positive).
/// Most recently touched first.
pub fn find_by_fingerprint(
    conn: &Connection,
    fingerprint: &str,
    min_confidence: f64,
    now: &str,
) -> Result<Vec<MemoryUnit>> {
    let sql = format!(
        "SELECT {UNIT_COLUMNS} FROM memory_units \
         WHERE fingerprint = ?1 {ACTIVE_FILTER} \
         ORDER BY COALESCE(last_accessed, created_at) DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map(params![fingerprint, min_confidence, now], unit_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    hydrate(conn, units)
}

/// Returnable units sharing a context id, most recently touched first.
pub fn find_by_context(
    conn: &Connection,
    context_id: &str,
    min_confidence: f64,
    now: &str,
) -> Result<Vec<MemoryUnit>> {
    let sql = format!(
        "SELECT {UNIT_COLUMNS} FROM memory_units \
         WHERE context_id = ?1 {ACTIVE_FILTER} \
         ORDER BY COALESCE(last_accessed, created_at) DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map(params![context_id, min_confidence, now], unit_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    hydrate(conn, units)
}

/// Bounded most-recent-first scan of returnable same-tool units — the fuzzy
/// fallback's candidate set.
pub fn find_recent_by_tool(
    conn: &Connection,
    tool_name: &str,
    min_confidence: f64,
    now: &str,
    limit: usize,
) -> Result<Vec<MemoryUnit>> {
    let sql = format!(
        "SELECT {UNIT_COLUMNS} FROM memory_units \
         WHERE tool_name = ?1 AND is_compound = 0 {ACTIVE_FILTER} \
         ORDER BY COALESCE(last_accessed, created_at) DESC LIMIT ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map(
            params![tool_name, min_confidence, now, limit as i64],
            unit_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    hydrate(conn, units)
}

/// All units (any state) depending on `(entity_type, entity_id)`, with the
/// relationship of that link.
pub fn find_by_dependency(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<(String, f64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.confidence, d.relationship \
         FROM memory_units u JOIN unit_dependencies d ON u.id = d.unit_id \
         WHERE d.entity_type = ?1 AND d.entity_id = ?2",
    )?;
    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Units within a confidence band (inclusive bounds), any state.
pub fn find_by_confidence_range(
    conn: &Connection,
    min: f64,
    max: f64,
) -> Result<Vec<MemoryUnit>> {
    let sql = format!(
        "SELECT {UNIT_COLUMNS} FROM memory_units \
         WHERE confidence >= ?1 AND confidence <= ?2 \
         ORDER BY confidence DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map(params![min, max], unit_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    hydrate(conn, units)
}

/// Record an access: bump counters and `last_accessed`. Hits also get an
/// audit row.
pub fn record_access(conn: &Connection, id: &str, hit: bool) -> Result<()> {
    let now = now_rfc3339();
    let affected = conn.execute(
        "UPDATE memory_units SET access_count = access_count + 1, \
         hit_count = hit_count + ?1, last_accessed = ?2, updated_at = ?2 WHERE id = ?3",
        params![hit as i64, now, id],
    )?;
    if affected == 0 {
        return Err(MemoryError::NotFound(id.to_string()));
    }
    if hit {
        write_audit_log(conn, "hit", id, None)?;
    }
    Ok(())
}

/// Set a unit's confidence (clamped to `[0, 1]`). Returns `false` for an
/// unknown id. Audit is the caller's concern — cascade and validate log
/// different operations.
pub fn set_confidence(conn: &Connection, id: &str, confidence: f64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memory_units SET confidence = ?1, updated_at = ?2 WHERE id = ?3",
        params![confidence.clamp(0.0, 1.0), now_rfc3339(), id],
    )?;
    Ok(affected > 0)
}

/// Force-expire a unit: confidence 0, expired now. Returns `false` for an
/// unknown id.
pub fn force_expire(conn: &Connection, id: &str) -> Result<bool> {
    let now = now_rfc3339();
    let affected = conn.execute(
        "UPDATE memory_units SET confidence = 0.0, expires_at = ?1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(affected > 0)
}

/// Mark a unit validated: confidence 1.0, validated flag set.
pub fn mark_validated(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memory_units SET confidence = 1.0, validated = 1, updated_at = ?1 WHERE id = ?2",
        params![now_rfc3339(), id],
    )?;
    if affected > 0 {
        write_audit_log(conn, "validate", id, None)?;
    }
    Ok(affected > 0)
}

/// Move a unit to a tier, recomputing its expiry. Audit is the caller's
/// concern (`promote` vs `archive`).
pub fn set_tier(
    conn: &Connection,
    id: &str,
    tier: Tier,
    expires_at: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE memory_units SET tier = ?1, expires_at = ?2, updated_at = ?3 WHERE id = ?4",
        params![tier.as_str(), expires_at, now_rfc3339(), id],
    )?;
    Ok(affected > 0)
}

/// Associate two units (undirected). Idempotent; returns `true` when a new
/// link was created.
pub fn link_related(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    if a == b {
        return Ok(false);
    }
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO related_units (unit_a, unit_b, created_at) VALUES (?1, ?2, ?3)",
        params![first, second, now_rfc3339()],
    )?;
    if inserted > 0 {
        write_audit_log(
            conn,
            "link",
            first,
            Some(&serde_json::json!({ "related": second })),
        )?;
    }
    Ok(inserted > 0)
}

/// Hard delete a unit. Dependency and related rows cascade via FK.
pub fn hard_delete_unit(conn: &mut Connection, id: &str) -> Result<()> {
    let tx = conn.transaction()?;
    write_audit_log(&tx, "delete", id, Some(&serde_json::json!({"hard_delete": true})))?;
    let affected = tx.execute("DELETE FROM memory_units WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(MemoryError::NotFound(id.to_string()));
    }
    tx.commit()?;
    Ok(())
}

/// Write an entry to the memory_log audit table.
pub(crate) fn write_audit_log(
    conn: &Connection,
    operation: &str,
    unit_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO memory_log (operation, unit_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, unit_id, details_json, now_rfc3339()],
    )?;
    Ok(())
}

/// Audit log entries for a unit, oldest first.
pub fn audit_log(conn: &Connection, unit_id: &str) -> Result<Vec<(String, Option<Value>, String)>> {
    let mut stmt = conn.prepare(
        "SELECT operation, details, created_at FROM memory_log \
         WHERE unit_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![unit_id], |row| {
            let details_str: Option<String> = row.get(1)?;
            Ok((
                row.get::<_, String>(0)?,
                details_str.and_then(|s| serde_json::from_str(&s).ok()),
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── row mapping ──────────────────────────────────────────────────────────────

/// Column list shared by every unit SELECT; must match [`unit_from_row`].
const UNIT_COLUMNS: &str = "id, tool_name, fingerprint, original_params, abstract_params, \
    complexity, is_compound, context_id, payload, computed_at, confidence, validated, \
    access_count, hit_count, last_accessed, created_at, updated_at, tier, expires_at, tags";

/// Filter appended to candidate queries: active tier, positive qualifying
/// confidence, not expired. Binds `?2` = min confidence, `?3` = now.
const ACTIVE_FILTER: &str = " AND tier != 'archived' AND confidence > 0.0 \
    AND confidence >= ?2 AND (expires_at IS NULL OR expires_at > ?3)";

fn unit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryUnit> {
    let original_params: String = row.get(3)?;
    let abstract_params: String = row.get(4)?;
    let payload: String = row.get(8)?;
    let tier: String = row.get(17)?;
    let tags: String = row.get(19)?;

    Ok(MemoryUnit {
        id: row.get(0)?,
        tool_name: row.get(1)?,
        fingerprint: row.get(2)?,
        original_params: serde_json::from_str(&original_params).unwrap_or(Value::Null),
        abstract_params: serde_json::from_str(&abstract_params).unwrap_or(Value::Null),
        complexity: row.get(5)?,
        is_compound: row.get(6)?,
        context_id: row.get(7)?,
        payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
        computed_at: row.get(9)?,
        confidence: row.get(10)?,
        validated: row.get(11)?,
        access_count: row.get(12)?,
        hit_count: row.get(13)?,
        last_accessed: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        tier: tier.parse().unwrap_or(Tier::ShortTerm),
        expires_at: row.get(18)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        dependencies: Vec::new(),
        related: Vec::new(),
    })
}

fn hydrate(conn: &Connection, mut units: Vec<MemoryUnit>) -> Result<Vec<MemoryUnit>> {
    for unit in &mut units {
        unit.dependencies = load_dependencies(conn, &unit.id)?;
        unit.related = load_related(conn, &unit.id)?;
    }
    Ok(units)
}

fn load_dependencies(conn: &Connection, unit_id: &str) -> Result<Vec<Dependency>> {
    let mut stmt = conn.prepare(
        "SELECT entity_type, entity_id, relationship FROM unit_dependencies \
         WHERE unit_id = ?1 ORDER BY position",
    )?;
    let deps = stmt
        .query_map(params![unit_id], |row| {
            let relationship: String = row.get(2)?;
            Ok(Dependency {
                entity_type: row.get(0)?,
                entity_id: row.get(1)?,
                relationship: relationship
                    .parse()
                    .unwrap_or(crate::store::types::Relationship::Reference),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(deps)
}

fn load_related(conn: &Connection, unit_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT CASE WHEN unit_a = ?1 THEN unit_b ELSE unit_a END \
         FROM related_units WHERE unit_a = ?1 OR unit_b = ?1",
    )?;
    let related = stmt
        .query_map(params![unit_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::types::Relationship;
    use serde_json::json;

    fn test_db() -> Connection {
        db::open_memory_database().unwrap()
    }

    fn new_unit(tool: &str, fingerprint: &str) -> NewUnit {
        NewUnit {
            tool_name: tool.to_string(),
            fingerprint: fingerprint.to_string(),
            original_params: json!({"q": "x"}),
            abstract_params: json!({"q": "x"}),
            complexity: 3.0,
            is_compound: false,
            context_id: None,
            payload: json!({"answer": 42}),
            confidence: 0.9,
            tier: Tier::MidTerm,
            expires_at: Some(crate::store::days_from_now_rfc3339(30)),
            tags: vec![],
            dependencies: vec![],
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let mut conn = test_db();
        let mut new = new_unit("find_item", "fp-1");
        new.dependencies = vec![
            Dependency::new("item", "i-1", Relationship::Primary),
            Dependency::new("location", "l-1", Relationship::Secondary),
        ];

        let unit = insert_unit(&mut conn, new).unwrap();
        assert_eq!(unit.access_count, 1);
        assert_eq!(unit.hit_count, 0);
        assert!(!unit.validated);

        let fetched = get_unit(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(fetched.tool_name, "find_item");
        assert_eq!(fetched.fingerprint, "fp-1");
        assert_eq!(fetched.payload, json!({"answer": 42}));
        assert_eq!(fetched.tier, Tier::MidTerm);
        assert_eq!(fetched.dependencies.len(), 2);
        assert_eq!(fetched.dependencies[0].relationship, Relationship::Primary);
    }

    #[test]
    fn insert_dedupes_conflicting_dependencies() {
        let mut conn = test_db();
        let mut new = new_unit("find_item", "fp-dep");
        new.dependencies = vec![
            Dependency::new("item", "i-1", Relationship::Reference),
            Dependency::new("item", "i-1", Relationship::Primary),
        ];

        let unit = insert_unit(&mut conn, new).unwrap();
        assert_eq!(unit.dependencies.len(), 1);
        assert_eq!(unit.dependencies[0].relationship, Relationship::Primary);

        let fetched = get_unit(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(fetched.dependencies.len(), 1);
        assert_eq!(fetched.dependencies[0].relationship, Relationship::Primary);
    }

    #[test]
    fn get_unknown_unit_returns_none() {
        let conn = test_db();
        assert!(get_unit(&conn, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn fingerprint_lookup_filters_confidence_and_expiry() {
        let mut conn = test_db();
        let now = now_rfc3339();

        let strong = insert_unit(&mut conn, new_unit("find_item", "fp-f")).unwrap();

        let mut weak = new_unit("find_item", "fp-f");
        weak.confidence = 0.3;
        let weak = insert_unit(&mut conn, weak).unwrap();

        let mut expired = new_unit("find_item", "fp-f");
        expired.expires_at = Some(crate::store::days_ago_rfc3339(1));
        let expired = insert_unit(&mut conn, expired).unwrap();

        let found = find_by_fingerprint(&conn, "fp-f", 0.8, &now).unwrap();
        let ids: Vec<&str> = found.iter().map(|u| u.id.as_str()).collect();
        assert!(ids.contains(&strong.id.as_str()));
        assert!(!ids.contains(&weak.id.as_str()));
        assert!(!ids.contains(&expired.id.as_str()));
    }

    #[test]
    fn zero_confidence_units_are_never_returnable() {
        let mut conn = test_db();
        let now = now_rfc3339();

        let unit = insert_unit(&mut conn, new_unit("find_item", "fp-z")).unwrap();
        set_confidence(&conn, &unit.id, 0.0).unwrap();

        // Even a permissive threshold of 0 must not surface it
        let found = find_by_fingerprint(&conn, "fp-z", 0.0, &now).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn record_access_bumps_counters() {
        let mut conn = test_db();
        let unit = insert_unit(&mut conn, new_unit("find_item", "fp-a")).unwrap();

        record_access(&conn, &unit.id, true).unwrap();

        let fetched = get_unit(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(fetched.access_count, 2);
        assert_eq!(fetched.hit_count, 1);
        assert!(fetched.last_accessed.is_some());

        // hit writes an audit row
        let log = audit_log(&conn, &unit.id).unwrap();
        assert!(log.iter().any(|(op, _, _)| op == "hit"));
    }

    #[test]
    fn record_access_unknown_id_errors() {
        let conn = test_db();
        let err = record_access(&conn, "nope", true).unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn force_expire_zeroes_confidence() {
        let mut conn = test_db();
        let now = now_rfc3339();
        let unit = insert_unit(&mut conn, new_unit("find_item", "fp-e")).unwrap();

        assert!(force_expire(&conn, &unit.id).unwrap());

        let fetched = get_unit(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(fetched.confidence, 0.0);
        assert!(fetched.expires_at.is_some());

        assert!(find_by_fingerprint(&conn, "fp-e", 0.0, &now).unwrap().is_empty());
        assert!(!force_expire(&conn, "nope").unwrap());
    }

    #[test]
    fn mark_validated_sets_full_confidence() {
        let mut conn = test_db();
        let mut new = new_unit("find_item", "fp-v");
        new.confidence = 0.5;
        let unit = insert_unit(&mut conn, new).unwrap();

        assert!(mark_validated(&conn, &unit.id).unwrap());

        let fetched = get_unit(&conn, &unit.id).unwrap().unwrap();
        assert_eq!(fetched.confidence, 1.0);
        assert!(fetched.validated);

        let log = audit_log(&conn, &unit.id).unwrap();
        assert!(log.iter().any(|(op, _, _)| op == "validate"));
    }

    #[test]
    fn dependency_lookup_returns_relationship() {
        let mut conn = test_db();
        let mut new = new_unit("query_contact", "fp-d");
        new.dependencies = vec![Dependency::new("contact", "c-9", Relationship::Primary)];
        let unit = insert_unit(&mut conn, new).unwrap();

        let hits = find_by_dependency(&conn, "contact", "c-9").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, unit.id);
        assert_eq!(hits[0].2, "primary");

        assert!(find_by_dependency(&conn, "contact", "c-0").unwrap().is_empty());
    }

    #[test]
    fn confidence_range_query() {
        let mut conn = test_db();
        for (fp, conf) in [("fp-r1", 0.2), ("fp-r2", 0.5), ("fp-r3", 0.9)] {
            let mut new = new_unit("find_item", fp);
            new.confidence = conf;
            insert_unit(&mut conn, new).unwrap();
        }

        let mid = find_by_confidence_range(&conn, 0.4, 0.6).unwrap();
        assert_eq!(mid.len(), 1);
        assert!((mid[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn link_related_is_undirected_and_idempotent() {
        let mut conn = test_db();
        let a = insert_unit(&mut conn, new_unit("find_item", "fp-la")).unwrap();
        let b = insert_unit(&mut conn, new_unit("find_item", "fp-lb")).unwrap();

        assert!(link_related(&conn, &a.id, &b.id).unwrap());
        assert!(!link_related(&conn, &b.id, &a.id).unwrap()); // already linked
        assert!(!link_related(&conn, &a.id, &a.id).unwrap()); // self link ignored

        let fetched_a = get_unit(&conn, &a.id).unwrap().unwrap();
        let fetched_b = get_unit(&conn, &b.id).unwrap().unwrap();
        assert_eq!(fetched_a.related, vec![b.id.clone()]);
        assert_eq!(fetched_b.related, vec![a.id.clone()]);
    }

    #[test]
    fn hard_delete_cascades_dependencies_and_links() {
        let mut conn = test_db();
        let mut new = new_unit("find_item", "fp-hd");
        new.dependencies = vec![Dependency::new("item", "i-1", Relationship::Primary)];
        let a = insert_unit(&mut conn, new).unwrap();
        let b = insert_unit(&mut conn, new_unit("find_item", "fp-hd2")).unwrap();
        link_related(&conn, &a.id, &b.id).unwrap();

        hard_delete_unit(&mut conn, &a.id).unwrap();

        assert!(get_unit(&conn, &a.id).unwrap().is_none());
        let dep_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM unit_dependencies WHERE unit_id = ?1",
                params![a.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dep_count, 0);
        let rel_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM related_units WHERE unit_a = ?1 OR unit_b = ?1",
                params![a.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rel_count, 0);

        // audit row survives the delete
        let log = audit_log(&conn, &a.id).unwrap();
        assert!(log.iter().any(|(op, _, _)| op == "delete"));
    }
}
