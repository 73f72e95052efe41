//! The lookup pipeline: exact → context-scoped → fuzzy.
//!
//! A query first passes a complexity gate (trivial queries without a context
//! are never cache candidates), then tries an exact fingerprint match, then —
//! when a context id is supplied — the context preference chain over compound
//! units, and finally a bounded fuzzy scan over recent same-tool units.

use serde_json::Value;

use crate::canonical::{self, rules::AbstractionRules};
use crate::config::{RetrievalConfig, SimilarityConfig};
use crate::error::Result;
use crate::similarity::similarity;
use crate::store::types::MemoryUnit;
use crate::store::{now_rfc3339, units};

/// How a lookup hit was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Fingerprint equality.
    Exact,
    /// A compound unit embeds a step with this exact fingerprint.
    ContextStep,
    /// A compound unit embeds a same-tool step above the similarity bar.
    ContextSimilar,
    /// A compound unit agrees on the tool's key parameters.
    ContextKeyParam,
    /// Fallback: the most recently accessed unit in the context.
    ContextRecent,
    /// Fuzzy parameter similarity against a recent same-tool unit.
    Fuzzy,
}

/// A successful lookup: the unit, how it matched, and the similarity score
/// for fuzzy/context-similar matches.
#[derive(Debug, Clone)]
pub struct LookupHit {
    pub unit: MemoryUnit,
    pub kind: MatchKind,
    pub score: Option<f64>,
}

/// Abstract-parameter keys whose agreement earns the fuzzy metadata bonus.
const DISCRIMINATING_TAGS: &[&str] = &[
    "category",
    "item_category",
    "route_tag",
    "subject_tag",
    "metric_category",
    "task_category",
];

/// Run the full lookup pipeline. Does not record the access — that is the
/// caller's (fire-and-forget) concern.
#[allow(clippy::too_many_arguments)]
pub fn lookup(
    conn: &rusqlite::Connection,
    rules: &AbstractionRules,
    sim_cfg: &SimilarityConfig,
    retr_cfg: &RetrievalConfig,
    tool: &str,
    params: &Value,
    context_id: Option<&str>,
    threshold: f64,
) -> Result<Option<LookupHit>> {
    // 1. Complexity gate — trivial queries produce false-positive hits on
    //    noise, so they are only considered inside an explicit context.
    let complexity = canonical::complexity_score(rules, tool, params);
    if complexity < retr_cfg.min_complexity && context_id.is_none() {
        tracing::debug!(tool, complexity, "below complexity gate, skipping cache");
        return Ok(None);
    }

    let fingerprint = canonical::fingerprint(rules, tool, params)?;
    let now = now_rfc3339();

    // 2. Exact fingerprint match
    let exact = units::find_by_fingerprint(conn, &fingerprint, threshold, &now)?;
    if let Some(unit) = exact.into_iter().next() {
        tracing::debug!(tool, fingerprint = %fingerprint, "exact cache hit");
        return Ok(Some(LookupHit {
            unit,
            kind: MatchKind::Exact,
            score: None,
        }));
    }

    // 3. Context-scoped match
    if let Some(ctx) = context_id {
        if let Some(hit) = context_match(
            conn, rules, sim_cfg, retr_cfg, tool, params, &fingerprint, ctx, threshold, &now,
        )? {
            return Ok(Some(hit));
        }
    }

    // 4. Fuzzy fallback
    fuzzy_match(conn, rules, sim_cfg, retr_cfg, tool, params, threshold, &now)
}

// ── context matching ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn context_match(
    conn: &rusqlite::Connection,
    rules: &AbstractionRules,
    sim_cfg: &SimilarityConfig,
    retr_cfg: &RetrievalConfig,
    tool: &str,
    params: &Value,
    fingerprint: &str,
    context_id: &str,
    threshold: f64,
    now: &str,
) -> Result<Option<LookupHit>> {
    let candidates = units::find_by_context(conn, context_id, threshold, now)?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let compounds: Vec<&MemoryUnit> = candidates.iter().filter(|u| u.is_compound).collect();

    // (a) a compound whose embedded steps contain this exact sub-query
    for unit in &compounds {
        if step_fingerprints(unit).any(|f| f == fingerprint) {
            tracing::debug!(tool, context_id, "context hit: embedded step fingerprint");
            return Ok(Some(LookupHit {
                unit: (*unit).clone(),
                kind: MatchKind::ContextStep,
                score: None,
            }));
        }
    }

    // (b) a compound with a same-tool step above the similarity bar
    let mut best: Option<(&MemoryUnit, f64)> = None;
    for unit in &compounds {
        for step_params in same_tool_step_params(unit, tool) {
            let score = similarity(sim_cfg, params, step_params);
            if score > retr_cfg.context_similarity
                && best.map(|(_, s)| score > s).unwrap_or(true)
            {
                best = Some((unit, score));
            }
        }
    }
    if let Some((unit, score)) = best {
        tracing::debug!(tool, context_id, score, "context hit: similar step");
        return Ok(Some(LookupHit {
            unit: unit.clone(),
            kind: MatchKind::ContextSimilar,
            score: Some(score),
        }));
    }

    // (c) key-parameter heuristics: the query's subject values all appear in
    //     a compound's signature
    let key_values = key_param_values(rules, tool, params);
    if !key_values.is_empty() {
        for unit in &compounds {
            if let Some(signature) = unit.abstract_params.get("signature").and_then(Value::as_str)
            {
                if key_values.iter().all(|v| signature.contains(v.as_str())) {
                    tracing::debug!(tool, context_id, "context hit: key parameters");
                    return Ok(Some(LookupHit {
                        unit: (*unit).clone(),
                        kind: MatchKind::ContextKeyParam,
                        score: None,
                    }));
                }
            }
        }
    }

    // (d) otherwise the most recently accessed unit in the context
    let unit = candidates[0].clone();
    tracing::debug!(tool, context_id, unit = %unit.id, "context hit: most recent");
    Ok(Some(LookupHit {
        unit,
        kind: MatchKind::ContextRecent,
        score: None,
    }))
}

/// Fingerprints of a compound unit's embedded steps.
fn step_fingerprints(unit: &MemoryUnit) -> impl Iterator<Item = &str> {
    unit.abstract_params
        .get("steps")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| s.get("fingerprint").and_then(Value::as_str))
}

/// Raw parameters of a compound unit's steps that used the given tool.
fn same_tool_step_params<'u>(
    unit: &'u MemoryUnit,
    tool: &'u str,
) -> impl Iterator<Item = &'u Value> {
    unit.original_params
        .get("steps")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(move |s| s.get("tool").and_then(Value::as_str) == Some(tool))
        .filter_map(|s| s.get("parameters"))
}

/// Normalized string values of the tool's key parameters.
fn key_param_values(rules: &AbstractionRules, tool: &str, params: &Value) -> Vec<String> {
    rules
        .key_fields(tool)
        .iter()
        .filter_map(|field| params.get(*field))
        .filter_map(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── fuzzy fallback ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn fuzzy_match(
    conn: &rusqlite::Connection,
    rules: &AbstractionRules,
    sim_cfg: &SimilarityConfig,
    retr_cfg: &RetrievalConfig,
    tool: &str,
    params: &Value,
    threshold: f64,
    now: &str,
) -> Result<Option<LookupHit>> {
    let min_confidence = retr_cfg.fuzzy_confidence_factor * threshold;
    let candidates = units::find_recent_by_tool(
        conn,
        tool,
        min_confidence,
        now,
        retr_cfg.fuzzy_scan_limit,
    )?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let query_abstract = canonical::abstract_params(rules, tool, params)?;

    let mut best: Option<(MemoryUnit, f64)> = None;
    for candidate in candidates {
        let mut score = similarity(sim_cfg, params, &candidate.original_params);
        if tags_agree(&query_abstract, &candidate.abstract_params) {
            score += retr_cfg.fuzzy_metadata_bonus;
        }
        if score > retr_cfg.fuzzy_accept_score
            && best.as_ref().map(|(_, s)| score > *s).unwrap_or(true)
        {
            best = Some((candidate, score));
        }
    }

    Ok(best.map(|(unit, score)| {
        tracing::debug!(tool, unit = %unit.id, score, "fuzzy cache hit");
        LookupHit {
            unit,
            kind: MatchKind::Fuzzy,
            score: Some(score),
        }
    }))
}

/// Whether any discriminating tag is present on both sides and equal.
fn tags_agree(a: &Value, b: &Value) -> bool {
    DISCRIMINATING_TAGS.iter().any(|key| {
        match (a.get(*key).and_then(Value::as_str), b.get(*key).and_then(Value::as_str)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    })
}
