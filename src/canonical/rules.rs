//! Per-tool abstraction rules.
//!
//! Each rule describes how a tool's identifying parameter values are replaced
//! with placeholders and category tags before fingerprinting, which fields
//! identify the query subject for context matching, and the tool's base
//! complexity weight. Unknown tools fall through with generic normalization
//! only.

use std::collections::HashMap;

/// What to do with a named parameter field during abstraction.
#[derive(Debug, Clone)]
pub enum FieldAction {
    /// Remove the field entirely (volatile noise).
    Drop,
    /// Replace the value with a fixed placeholder marker.
    Placeholder(&'static str),
}

/// How a discriminating tag is derived and inserted into the abstract params.
///
/// Tags carry the identity a placeholder erased: two queries only share a
/// fingerprint when their tags agree.
#[derive(Debug, Clone)]
pub enum TagRule {
    /// Copy the `source` field's (normalized) string value into `tag_key`.
    /// When absent, fall back to a short digest of the `fallback_sources`
    /// values, or `"general"` when those are absent too.
    CategoryOf {
        source: &'static str,
        tag_key: &'static str,
        fallback_sources: &'static [&'static str],
    },
    /// Insert a short stable digest of the named fields into `tag_key`
    /// (groups e.g. route endpoints without retaining the raw values).
    DigestOf {
        sources: &'static [&'static str],
        tag_key: &'static str,
    },
}

/// Abstraction rule for a single tool.
#[derive(Debug, Clone)]
pub struct ToolRule {
    /// Base complexity weight added to the parameter-shape weight.
    pub base_weight: f64,
    /// Field-level rewrites applied to top-level parameters.
    pub actions: Vec<(&'static str, FieldAction)>,
    /// Fields whose values identify the query subject (context matching).
    pub key_fields: Vec<&'static str>,
    /// Discriminating tag derivations.
    pub tags: Vec<TagRule>,
}

impl Default for ToolRule {
    fn default() -> Self {
        Self {
            base_weight: 1.0,
            actions: Vec::new(),
            key_fields: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Fields stripped from every tool's parameters before fingerprinting.
pub const VOLATILE_FIELDS: &[&str] = &[
    "timestamp",
    "ts",
    "now",
    "session_id",
    "sessionId",
    "request_id",
    "requestId",
    "trace_id",
    "traceId",
];

/// The pluggable `tool name -> abstraction rule` table.
#[derive(Debug, Clone, Default)]
pub struct AbstractionRules {
    rules: HashMap<String, ToolRule>,
}

impl AbstractionRules {
    /// Empty table — every tool falls through with generic normalization.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table for the assistant's tool surface.
    pub fn builtin() -> Self {
        let mut table = Self::new();

        let item_rule = ToolRule {
            base_weight: 2.0,
            actions: vec![
                ("itemName", FieldAction::Placeholder("<item>")),
                ("item_name", FieldAction::Placeholder("<item>")),
            ],
            key_fields: vec!["itemName", "item_name"],
            tags: vec![TagRule::CategoryOf {
                source: "category",
                tag_key: "item_category",
                fallback_sources: &["itemName", "item_name"],
            }],
        };
        table.register("find_item", item_rule.clone());
        table.register("query_item_location", item_rule);

        let route_rule = ToolRule {
            base_weight: 2.5,
            actions: vec![
                ("origin", FieldAction::Placeholder("<origin>")),
                ("destination", FieldAction::Placeholder("<destination>")),
            ],
            key_fields: vec!["origin", "destination"],
            tags: vec![TagRule::DigestOf {
                sources: &["origin", "destination"],
                tag_key: "route_tag",
            }],
        };
        table.register("estimate_time", route_rule.clone());
        table.register("plan_route", route_rule);

        table.register(
            "query_contact",
            ToolRule {
                base_weight: 2.5,
                actions: vec![
                    ("search", FieldAction::Placeholder("<subject>")),
                    ("name", FieldAction::Placeholder("<subject>")),
                ],
                key_fields: vec!["search", "name"],
                tags: vec![TagRule::DigestOf {
                    sources: &["search", "name"],
                    tag_key: "subject_tag",
                }],
            },
        );

        table.register(
            "query_biometric",
            ToolRule {
                base_weight: 2.0,
                actions: vec![
                    ("person", FieldAction::Placeholder("<subject>")),
                    // raw readings are per-measurement noise, not query shape
                    ("reading_id", FieldAction::Drop),
                ],
                key_fields: vec!["metric", "person"],
                tags: vec![
                    TagRule::CategoryOf {
                        source: "metric",
                        tag_key: "metric_category",
                        fallback_sources: &[],
                    },
                    TagRule::DigestOf {
                        sources: &["person"],
                        tag_key: "subject_tag",
                    },
                ],
            },
        );

        table.register(
            "query_task",
            ToolRule {
                base_weight: 2.0,
                actions: vec![("title", FieldAction::Placeholder("<task>"))],
                key_fields: vec!["title"],
                tags: vec![TagRule::CategoryOf {
                    source: "category",
                    tag_key: "task_category",
                    fallback_sources: &["title"],
                }],
            },
        );

        table
    }

    /// Register (or replace) the rule for a tool.
    pub fn register(&mut self, tool: impl Into<String>, rule: ToolRule) {
        self.rules.insert(tool.into(), rule);
    }

    /// Look up the rule for a tool, if any.
    pub fn get(&self, tool: &str) -> Option<&ToolRule> {
        self.rules.get(tool)
    }

    /// Base complexity weight for a tool (1.0 for unknown tools).
    pub fn base_weight(&self, tool: &str) -> f64 {
        self.rules.get(tool).map(|r| r.base_weight).unwrap_or(1.0)
    }

    /// Subject-identifying field names for a tool (empty for unknown tools).
    pub fn key_fields(&self, tool: &str) -> &[&'static str] {
        self.rules
            .get(tool)
            .map(|r| r.key_fields.as_slice())
            .unwrap_or(&[])
    }
}
