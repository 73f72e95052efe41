//! Lifecycle sweeps and tier promotion.
//!
//! Three independent, idempotent sweeps: decay (stale, unused, low-confidence
//! short_term units are archived), expiry (expired units are archived), and
//! purge (long-archived units are hard-deleted). Each record transitions
//! independently, so a sweep is safe to abandon mid-batch and safe to run
//! concurrently with retrieval. Promotion runs opportunistically on access.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::store::types::Tier;
use crate::store::units::{self, write_audit_log};
use crate::store::{days_ago_rfc3339, days_from_now_rfc3339, now_rfc3339};

#[derive(Debug, Serialize)]
pub struct PurgeResult {
    pub candidates: Vec<PurgeCandidate>,
    pub deleted: usize,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct PurgeCandidate {
    pub id: String,
    pub tool_name: String,
    pub confidence: f64,
    pub updated_at: String,
}

/// Combined report for one sweep run (CLI and scheduler output).
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub archived_by_decay: usize,
    pub archived_by_expiry: usize,
    pub purged: usize,
    pub dry_run: bool,
}

// ── Decay ────────────────────────────────────────────────────────────────────

/// Archive short_term units that went stale: idle past the window, rarely
/// accessed, low confidence.
pub fn decay_sweep(conn: &Connection, cfg: &LifecycleConfig) -> Result<usize> {
    let cutoff = days_ago_rfc3339(cfg.decay_idle_days);

    let candidates: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM memory_units \
             WHERE tier = 'short_term' \
               AND COALESCE(last_accessed, created_at) < ?1 \
               AND access_count < ?2 \
               AND confidence < ?3",
        )?;
        let rows = stmt.query_map(
            params![cutoff, cfg.decay_max_access, cfg.decay_confidence_floor],
            |row| row.get(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut archived = 0usize;
    for id in candidates {
        match archive_unit(conn, &id, "decay") {
            Ok(()) => archived += 1,
            Err(e) => tracing::warn!(unit = %id, error = %e, "decay archive failed"),
        }
    }

    if archived > 0 {
        tracing::info!(archived, "decay sweep archived stale units");
    }
    Ok(archived)
}

// ── Expiry ───────────────────────────────────────────────────────────────────

/// Archive every non-archived unit whose expiry has passed. long_term units
/// carry no expiry and survive unconditionally.
pub fn expiry_sweep(conn: &Connection) -> Result<usize> {
    let now = now_rfc3339();

    let candidates: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM memory_units \
             WHERE expires_at IS NOT NULL AND expires_at < ?1 AND tier != 'archived'",
        )?;
        let rows = stmt.query_map(params![now], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut archived = 0usize;
    for id in candidates {
        match archive_unit(conn, &id, "expired") {
            Ok(()) => archived += 1,
            Err(e) => tracing::warn!(unit = %id, error = %e, "expiry archive failed"),
        }
    }

    if archived > 0 {
        tracing::info!(archived, "expiry sweep archived expired units");
    }
    Ok(archived)
}

// ── Purge ────────────────────────────────────────────────────────────────────

/// Hard-delete archived units that have been untouched past the purge window.
/// In dry-run mode, returns candidates without deleting.
pub fn purge_sweep(
    conn: &mut Connection,
    cfg: &LifecycleConfig,
    dry_run: bool,
) -> Result<PurgeResult> {
    let cutoff = days_ago_rfc3339(cfg.purge_age_days);

    let candidates: Vec<PurgeCandidate> = {
        let mut stmt = conn.prepare(
            "SELECT id, tool_name, confidence, updated_at FROM memory_units \
             WHERE tier = 'archived' AND updated_at < ?1",
        )?;
        let rows = stmt.query_map(params![cutoff], |row| {
            Ok(PurgeCandidate {
                id: row.get(0)?,
                tool_name: row.get(1)?,
                confidence: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    if dry_run {
        return Ok(PurgeResult {
            deleted: 0,
            dry_run: true,
            candidates,
        });
    }

    let mut deleted = 0usize;
    for candidate in &candidates {
        match units::hard_delete_unit(conn, &candidate.id) {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(unit = %candidate.id, error = %e, "purge delete failed"),
        }
    }

    if deleted > 0 {
        tracing::info!(deleted, "purge sweep deleted stale archived units");
    }
    Ok(PurgeResult {
        deleted,
        dry_run: false,
        candidates,
    })
}

/// Run all three sweeps in order: decay, expiry, purge.
pub fn run_sweeps(
    conn: &mut Connection,
    cfg: &LifecycleConfig,
    dry_run: bool,
) -> Result<SweepReport> {
    let archived_by_decay = decay_sweep(conn, cfg)?;
    let archived_by_expiry = expiry_sweep(conn)?;
    let purge = purge_sweep(conn, cfg, dry_run)?;
    Ok(SweepReport {
        archived_by_decay,
        archived_by_expiry,
        purged: purge.deleted,
        dry_run,
    })
}

// ── Promotion ────────────────────────────────────────────────────────────────

/// Usage-driven tier promotion, invoked opportunistically on access.
///
/// short_term → mid_term when heavily accessed or old enough; mid_term →
/// long_term likewise. Expiry is recomputed on each transition (long_term
/// drops it entirely). Returns the new tier when a promotion happened.
pub fn maybe_promote(
    conn: &Connection,
    cfg: &LifecycleConfig,
    unit_id: &str,
) -> Result<Option<Tier>> {
    let row: Option<(String, u32, String)> = {
        use rusqlite::OptionalExtension;
        conn.query_row(
            "SELECT tier, access_count, created_at FROM memory_units WHERE id = ?1",
            params![unit_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
    };
    let Some((tier, access_count, created_at)) = row else {
        return Ok(None);
    };

    let age_days = age_in_days(&created_at);
    let tier: Tier = tier.parse().unwrap_or(Tier::ShortTerm);

    let next = match tier {
        Tier::ShortTerm
            if access_count > cfg.promote_mid_access || age_days > cfg.promote_mid_age_days =>
        {
            Some((Tier::MidTerm, Some(days_from_now_rfc3339(cfg.mid_term_expiry_days))))
        }
        Tier::MidTerm
            if access_count > cfg.promote_long_access || age_days > cfg.promote_long_age_days =>
        {
            Some((Tier::LongTerm, None))
        }
        _ => None,
    };

    let Some((next_tier, expires_at)) = next else {
        return Ok(None);
    };

    units::set_tier(conn, unit_id, next_tier, expires_at.as_deref())?;
    write_audit_log(
        conn,
        "promote",
        unit_id,
        Some(&serde_json::json!({
            "from": tier.as_str(),
            "to": next_tier.as_str(),
            "access_count": access_count,
        })),
    )?;
    tracing::debug!(unit = %unit_id, from = %tier, to = %next_tier, "tier promoted");
    Ok(Some(next_tier))
}

/// Archive transition shared by the decay and expiry sweeps.
fn archive_unit(conn: &Connection, id: &str, reason: &str) -> Result<()> {
    units::set_tier(conn, id, Tier::Archived, None)?;
    write_audit_log(
        conn,
        "archive",
        id,
        Some(&serde_json::json!({ "reason": reason })),
    )?;
    Ok(())
}

/// Whole days since an RFC 3339 timestamp (0 when unparseable).
fn age_in_days(created_at: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(created_at)
        .map(|t| (chrono::Utc::now() - t.with_timezone(&chrono::Utc)).num_days())
        .unwrap_or(0)
}
