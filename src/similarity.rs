//! Structural similarity between two JSON parameter trees.
//!
//! Recursive by type: primitives compare by equality, strings by token
//! overlap or normalized edit distance (with a strict rule for sensitive
//! values), arrays by greedy best-match intersection, objects by key-coverage
//! weighted value similarity. All scores are in `[0, 1]`; every threshold
//! lives in [`SimilarityConfig`].

use serde_json::Value;
use std::collections::HashSet;

pub use crate::config::SimilarityConfig;

/// Substrings that mark a value as identity/credential-like. Sensitive data
/// must not fuzzy-match loosely.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "passport",
    "credential",
    "secret",
    "token",
    "api_key",
    "apikey",
    "ssn",
    "id_card",
    "idcard",
    "license",
    "身份证",
    "护照",
    "驾照",
];

/// Keys whose mismatch marks two queries as categorically different,
/// overriding the generic object computation.
const DISCRIMINATING_KEYS: &[&str] = &[
    "category",
    "item_category",
    "route_tag",
    "subject_tag",
    "metric_category",
    "task_category",
    "type",
];

/// Score forced when a discriminating key disagrees.
const DISCRIMINATING_MISMATCH_SCORE: f64 = 0.1;

/// Structural similarity in `[0, 1]` between two parameter trees.
pub fn similarity(cfg: &SimilarityConfig, a: &Value, b: &Value) -> f64 {
    match (a, b) {
        (Value::Null, Value::Null) => 1.0,
        (Value::Bool(x), Value::Bool(y)) => {
            if x == y {
                1.0
            } else {
                0.0
            }
        }
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            if (x - y).abs() < 1e-9 {
                1.0
            } else {
                0.0
            }
        }
        (Value::String(x), Value::String(y)) => string_similarity(cfg, x, y),
        (Value::Array(x), Value::Array(y)) => array_similarity(cfg, x, y),
        (Value::Object(_), Value::Object(_)) => object_similarity(cfg, a, b),
        _ => 0.0,
    }
}

// ── strings ──────────────────────────────────────────────────────────────────

fn string_similarity(cfg: &SimilarityConfig, a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 1.0;
    }

    // Strict rule: sensitive values only match on a shared core keyword,
    // at a fixed moderate score.
    if is_sensitive(&a) || is_sensitive(&b) {
        let ta = tokens(&a);
        let tb = tokens(&b);
        return if ta.intersection(&tb).next().is_some() {
            cfg.sensitive_score
        } else {
            0.0
        };
    }

    let ta = tokens(&a);
    let tb = tokens(&b);
    let score = if !ta.is_empty() && !tb.is_empty() {
        let shared = ta.intersection(&tb).count() as f64;
        let total = ta.union(&tb).count() as f64;
        shared / total
    } else {
        edit_similarity(&a, &b)
    };

    if score < cfg.string_floor {
        0.0
    } else {
        score
    }
}

fn is_sensitive(s: &str) -> bool {
    SENSITIVE_PATTERNS.iter().any(|p| s.contains(p))
}

/// Multi-character alphanumeric tokens.
fn tokens(s: &str) -> HashSet<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .collect()
}

/// Normalized Levenshtein similarity: `1 - distance / max_len`.
fn edit_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// ── arrays ───────────────────────────────────────────────────────────────────

/// Greedy best-match intersection size over the longer length.
fn array_similarity(cfg: &SimilarityConfig, a: &[Value], b: &[Value]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut unmatched: Vec<&Value> = b.iter().collect();
    let mut matched = 0usize;

    for item in a {
        let best = unmatched
            .iter()
            .enumerate()
            .map(|(i, candidate)| (i, similarity(cfg, item, candidate)))
            .max_by(|(_, x), (_, y)| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((idx, score)) = best {
            if score > cfg.array_match_threshold {
                matched += 1;
                unmatched.swap_remove(idx);
            }
        }
    }

    matched as f64 / a.len().max(b.len()) as f64
}

// ── objects ──────────────────────────────────────────────────────────────────

fn object_similarity(cfg: &SimilarityConfig, a: &Value, b: &Value) -> f64 {
    let (ma, mb) = match (a.as_object(), b.as_object()) {
        (Some(x), Some(y)) => (x, y),
        _ => return 0.0,
    };

    let common: Vec<&String> = ma.keys().filter(|k| mb.contains_key(*k)).collect();
    if common.is_empty() {
        return 0.0;
    }

    // Category-discriminating keys veto the generic computation.
    for key in &common {
        if DISCRIMINATING_KEYS.contains(&key.as_str())
            && similarity(cfg, &ma[*key], &mb[*key]) < 1.0
        {
            return DISCRIMINATING_MISMATCH_SCORE;
        }
    }

    let coverage = common.len() as f64 / ma.len().max(mb.len()) as f64;
    let mean: f64 = common
        .iter()
        .map(|k| similarity(cfg, &ma[*k], &mb[*k]))
        .sum::<f64>()
        / common.len() as f64;

    coverage * mean
}
