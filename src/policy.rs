//! Tool/category caching policy.
//!
//! A pure lookup table mapping `(tool, category)` to default tier, initial
//! confidence, and expiry, with a global default row. `memory_enabled = false`
//! rows short-circuit both the read and the write path — live data sources
//! and identity-document categories must never be served from cache.

use crate::config::PolicyOverride;
use crate::store::types::Tier;

/// Resolved policy for one tool/category.
#[derive(Debug, Clone)]
pub struct PolicyRow {
    pub tier: Tier,
    pub initial_confidence: f64,
    pub expiry_days: Option<i64>,
    pub memory_enabled: bool,
}

impl PolicyRow {
    fn enabled(tier: Tier, initial_confidence: f64, expiry_days: Option<i64>) -> Self {
        Self {
            tier,
            initial_confidence,
            expiry_days,
            memory_enabled: true,
        }
    }

    fn disabled() -> Self {
        Self {
            tier: Tier::ShortTerm,
            initial_confidence: 0.0,
            expiry_days: Some(0),
            memory_enabled: false,
        }
    }
}

/// Matches any tool when used in an entry's `tool` slot.
const ANY_TOOL: &str = "*";

#[derive(Debug, Clone)]
struct PolicyEntry {
    tool: String,
    category: Option<String>,
    row: PolicyRow,
}

/// The policy table. Lookup precedence: `(tool, category)` →
/// `(*, category)` → `(tool, _)` → global default.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: Vec<PolicyEntry>,
    default_row: PolicyRow,
}

impl PolicyTable {
    /// Built-in table for the assistant's tool surface.
    pub fn builtin() -> Self {
        let mut table = Self {
            entries: Vec::new(),
            default_row: PolicyRow::enabled(Tier::ShortTerm, 0.7, Some(7)),
        };

        table.insert("find_item", None, PolicyRow::enabled(Tier::MidTerm, 0.9, Some(30)));
        table.insert(
            "query_item_location",
            None,
            PolicyRow::enabled(Tier::MidTerm, 0.9, Some(30)),
        );
        table.insert(
            "query_contact",
            None,
            PolicyRow::enabled(Tier::LongTerm, 0.9, None),
        );
        table.insert(
            "estimate_time",
            None,
            PolicyRow::enabled(Tier::ShortTerm, 0.8, Some(7)),
        );
        table.insert(
            "plan_route",
            None,
            PolicyRow::enabled(Tier::ShortTerm, 0.8, Some(7)),
        );
        table.insert(
            "query_biometric",
            None,
            PolicyRow::enabled(Tier::ShortTerm, 0.7, Some(7)),
        );
        table.insert(
            "query_task",
            None,
            PolicyRow::enabled(Tier::MidTerm, 0.8, Some(14)),
        );

        // Live data sources — answers go stale the moment they are computed.
        table.insert("query_weather", None, PolicyRow::disabled());
        table.insert("query_datetime", None, PolicyRow::disabled());

        // Identity documents are never cached, whichever tool touches them.
        table.insert(ANY_TOOL, Some("identity_document"), PolicyRow::disabled());

        table
    }

    /// Built-in table with config-file overrides merged on top.
    pub fn with_overrides(overrides: &[PolicyOverride]) -> Self {
        let mut table = Self::builtin();
        for o in overrides {
            let base = table.policy_for(&o.tool, o.category.as_deref()).clone();
            let row = PolicyRow {
                tier: o
                    .tier
                    .as_deref()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(base.tier),
                initial_confidence: o.initial_confidence.unwrap_or(base.initial_confidence),
                expiry_days: match o.expiry_days {
                    Some(d) if d <= 0 => None,
                    Some(d) => Some(d),
                    None => base.expiry_days,
                },
                memory_enabled: o.memory_enabled.unwrap_or(base.memory_enabled),
            };
            table.insert(&o.tool, o.category.as_deref(), row);
        }
        table
    }

    fn insert(&mut self, tool: &str, category: Option<&str>, row: PolicyRow) {
        let tool = tool.to_string();
        let category = category.map(str::to_string);
        // Replace an existing entry for the same key
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.tool == tool && e.category == category)
        {
            existing.row = row;
        } else {
            self.entries.push(PolicyEntry { tool, category, row });
        }
    }

    /// Resolve the policy for a tool and optional entity category.
    pub fn policy_for(&self, tool: &str, category: Option<&str>) -> &PolicyRow {
        if let Some(cat) = category {
            if let Some(entry) = self.find(tool, Some(cat)) {
                return &entry.row;
            }
            if let Some(entry) = self.find(ANY_TOOL, Some(cat)) {
                return &entry.row;
            }
        }
        if let Some(entry) = self.find(tool, None) {
            return &entry.row;
        }
        &self.default_row
    }

    fn find(&self, tool: &str, category: Option<&str>) -> Option<&PolicyEntry> {
        self.entries
            .iter()
            .find(|e| e.tool == tool && e.category.as_deref() == category)
    }
}
