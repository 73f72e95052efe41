use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashMap;

use crate::error::Result;
use crate::store::now_rfc3339;

/// Aggregate store statistics.
#[derive(Debug, Serialize)]
pub struct EngineStats {
    pub total: u64,
    pub by_tier: HashMap<String, u64>,
    pub by_confidence_band: HashMap<String, u64>,
    /// Units past their expiry that no sweep has archived yet.
    pub expired_count: u64,
    pub validated_count: u64,
    /// Lifetime hit ratio: Σ hit_count / Σ access_count.
    pub hit_rate: f64,
}

const TIERS: &[&str] = &["short_term", "mid_term", "long_term", "archived"];
const BANDS: &[&str] = &["high", "medium", "low", "zero"];

/// Compute store statistics in one pass per aggregate.
pub fn engine_stats(conn: &Connection) -> Result<EngineStats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM memory_units", [], |row| row.get(0))?;

    let mut by_tier: HashMap<String, u64> =
        TIERS.iter().map(|t| (t.to_string(), 0)).collect();
    {
        let mut stmt =
            conn.prepare("SELECT tier, COUNT(*) FROM memory_units GROUP BY tier")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (tier, count) in rows {
            by_tier.insert(tier, count as u64);
        }
    }

    let mut by_confidence_band: HashMap<String, u64> =
        BANDS.iter().map(|b| (b.to_string(), 0)).collect();
    {
        let mut stmt = conn.prepare(
            "SELECT CASE \
                 WHEN confidence >= 0.8 THEN 'high' \
                 WHEN confidence >= 0.5 THEN 'medium' \
                 WHEN confidence > 0.0 THEN 'low' \
                 ELSE 'zero' END AS band, COUNT(*) \
             FROM memory_units GROUP BY band",
        )?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (band, count) in rows {
            by_confidence_band.insert(band, count as u64);
        }
    }

    let expired_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memory_units \
         WHERE expires_at IS NOT NULL AND expires_at < ?1 AND tier != 'archived'",
        params![now_rfc3339()],
        |row| row.get(0),
    )?;

    let validated_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memory_units WHERE validated = 1",
        [],
        |row| row.get(0),
    )?;

    let (hits, accesses): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(hit_count), 0), COALESCE(SUM(access_count), 0) FROM memory_units",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let hit_rate = if accesses > 0 {
        hits as f64 / accesses as f64
    } else {
        0.0
    };

    Ok(EngineStats {
        total: total as u64,
        by_tier,
        by_confidence_band,
        expired_count: expired_count as u64,
        validated_count: validated_count as u64,
        hit_rate,
    })
}

/// Render stats as human-readable lines (CLI output).
pub fn render_stats(stats: &EngineStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("total units:      {}\n", stats.total));
    for tier in TIERS {
        out.push_str(&format!("  {:<14} {}\n", format!("{tier}:"), stats.by_tier[*tier]));
    }
    out.push_str(&format!("expired (unswept): {}\n", stats.expired_count));
    out.push_str(&format!("validated:        {}\n", stats.validated_count));
    for band in BANDS {
        out.push_str(&format!(
            "  confidence {:<7} {}\n",
            format!("{band}:"),
            stats.by_confidence_band[*band]
        ));
    }
    out.push_str(&format!("hit rate:         {:.2}\n", stats.hit_rate));
    out
}
