//! Compound context aggregation.
//!
//! A session's sequential tool calls are cached as one aggregate unit whose
//! cacheability depends on total, not individual, complexity. A chain of
//! related lookups earns a relational bonus; tier and initial confidence are
//! derived from the aggregate via fixed breakpoints. A signature string built
//! from each step's key fields supports later context matching.

use rusqlite::Connection;
use serde_json::{json, Value};

use crate::canonical::{self, rules::AbstractionRules};
use crate::config::{CompoundConfig, LifecycleConfig};
use crate::error::Result;
use crate::store::types::{Dependency, MemoryUnit, Tier};
use crate::store::units::{insert_unit, NewUnit};
use crate::store::days_from_now_rfc3339;

/// One step of a compound context: a tool call and its result.
#[derive(Debug, Clone)]
pub struct CompoundStep {
    pub tool: String,
    pub parameters: Value,
    pub result: Value,
}

/// The tool name compound units are stored under.
pub const COMPOUND_TOOL: &str = "compound_context";

/// Build and store a compound unit from a context's steps.
///
/// Returns `None` for an empty step list — there is nothing to aggregate.
pub fn build_compound(
    conn: &mut Connection,
    rules: &AbstractionRules,
    compound_cfg: &CompoundConfig,
    lifecycle_cfg: &LifecycleConfig,
    context_id: &str,
    steps: &[CompoundStep],
    dependencies: Vec<Dependency>,
) -> Result<Option<MemoryUnit>> {
    if steps.is_empty() {
        return Ok(None);
    }

    let mut total_complexity = 0.0;
    let mut original_steps = Vec::with_capacity(steps.len());
    let mut abstract_steps = Vec::with_capacity(steps.len());
    let mut signature_parts = Vec::new();

    for step in steps {
        total_complexity += canonical::complexity_score(rules, &step.tool, &step.parameters);

        let abstracted = canonical::abstract_params(rules, &step.tool, &step.parameters)?;
        let fingerprint = canonical::fingerprint_abstract(&step.tool, &abstracted);

        original_steps.push(json!({
            "tool": step.tool,
            "parameters": step.parameters,
            "result": step.result,
        }));
        abstract_steps.push(json!({
            "tool": step.tool,
            "fingerprint": fingerprint,
        }));

        for field in rules.key_fields(&step.tool) {
            if let Some(v) = step.parameters.get(*field).and_then(Value::as_str) {
                let v = v.trim().to_lowercase();
                if !v.is_empty() {
                    signature_parts.push(v);
                }
            }
        }
    }

    let relational_bonus = (compound_cfg.relational_bonus_per_step * steps.len() as f64)
        .min(compound_cfg.relational_bonus_cap);
    let complexity = total_complexity + relational_bonus;

    let (tier, confidence) = tier_for_complexity(compound_cfg, complexity);
    let expires_at = match tier {
        Tier::LongTerm => None,
        Tier::MidTerm => Some(days_from_now_rfc3339(lifecycle_cfg.mid_term_expiry_days)),
        _ => Some(days_from_now_rfc3339(lifecycle_cfg.short_term_expiry_days)),
    };

    let signature = signature_parts.join("|");
    let abstract_params = json!({
        "steps": abstract_steps,
        "signature": signature,
    });
    let original_params = json!({ "steps": original_steps });
    let fingerprint = canonical::fingerprint_abstract(COMPOUND_TOOL, &abstract_params);
    let payload = json!({
        "steps": steps
            .iter()
            .map(|s| json!({"tool": s.tool, "result": s.result}))
            .collect::<Vec<_>>(),
    });

    tracing::debug!(
        context_id,
        steps = steps.len(),
        complexity,
        tier = %tier,
        "storing compound context unit"
    );

    let unit = insert_unit(
        conn,
        NewUnit {
            tool_name: COMPOUND_TOOL.to_string(),
            fingerprint,
            original_params,
            abstract_params,
            complexity,
            is_compound: true,
            context_id: Some(context_id.to_string()),
            payload,
            confidence,
            tier,
            expires_at,
            tags: vec!["compound".to_string()],
            dependencies,
        },
    )?;

    Ok(Some(unit))
}

/// Aggregate complexity → (tier, initial confidence) breakpoints.
fn tier_for_complexity(cfg: &CompoundConfig, complexity: f64) -> (Tier, f64) {
    if complexity >= cfg.long_term_complexity {
        (Tier::LongTerm, cfg.long_term_confidence)
    } else if complexity >= cfg.mid_term_complexity {
        (Tier::MidTerm, cfg.mid_term_confidence)
    } else {
        (Tier::ShortTerm, cfg.short_term_confidence)
    }
}
