//! Entity-change cascades.
//!
//! Entities elsewhere in the system emit one event per mutation; this module
//! maps those events onto the units that depend on the entity. Deletion
//! force-expires, updates decay confidence by relationship strength, creation
//! only lightly discounts reference links (a new sibling entity rarely
//! invalidates an existing specific result). Each unit is adjusted in an
//! isolated read-modify-write — one bad record never aborts the batch.

use rusqlite::Connection;

use crate::config::InvalidationConfig;
use crate::error::Result;
use crate::store::types::{ChangeKind, Relationship};
use crate::store::units;

/// Apply an entity-change event to every dependent unit. Returns the number
/// of units affected.
pub fn on_entity_change(
    conn: &Connection,
    cfg: &InvalidationConfig,
    entity_type: &str,
    entity_id: &str,
    kind: ChangeKind,
) -> Result<usize> {
    let dependents = units::find_by_dependency(conn, entity_type, entity_id)?;
    if dependents.is_empty() {
        return Ok(0);
    }

    let mut affected = 0usize;
    for (unit_id, confidence, relationship) in dependents {
        let relationship: Relationship = match relationship.parse() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(unit = %unit_id, error = %e, "skipping corrupt dependency row");
                continue;
            }
        };

        match apply_change(conn, cfg, &unit_id, confidence, relationship, kind) {
            Ok(true) => affected += 1,
            Ok(false) => {}
            Err(e) => {
                // isolated per record — log and keep cascading
                tracing::warn!(unit = %unit_id, error = %e, "cascade update failed");
            }
        }
    }

    tracing::info!(
        entity_type,
        entity_id,
        change = ?kind,
        affected,
        "entity change cascaded"
    );
    Ok(affected)
}

/// Adjust one unit for one event. Returns whether the unit was touched.
fn apply_change(
    conn: &Connection,
    cfg: &InvalidationConfig,
    unit_id: &str,
    confidence: f64,
    relationship: Relationship,
    kind: ChangeKind,
) -> Result<bool> {
    match kind {
        ChangeKind::Deleted => {
            units::force_expire(conn, unit_id)?;
            units::write_audit_log(
                conn,
                "cascade",
                unit_id,
                Some(&serde_json::json!({"change": "deleted"})),
            )?;
            Ok(true)
        }
        ChangeKind::Updated => {
            let factor = match relationship {
                Relationship::Primary => cfg.primary_factor,
                Relationship::Secondary => cfg.secondary_factor,
                Relationship::Reference => cfg.reference_factor,
            };
            units::set_confidence(conn, unit_id, confidence * factor)?;
            units::write_audit_log(
                conn,
                "cascade",
                unit_id,
                Some(&serde_json::json!({
                    "change": "updated",
                    "relationship": relationship.as_str(),
                    "factor": factor,
                })),
            )?;
            Ok(true)
        }
        ChangeKind::Created => {
            // primary/secondary units still describe the entities they
            // were computed from
            if relationship != Relationship::Reference {
                return Ok(false);
            }
            units::set_confidence(conn, unit_id, confidence * cfg.created_reference_factor)?;
            units::write_audit_log(
                conn,
                "cascade",
                unit_id,
                Some(&serde_json::json!({
                    "change": "created",
                    "factor": cfg.created_reference_factor,
                })),
            )?;
            Ok(true)
        }
    }
}
