//! The memory engine service object.
//!
//! Explicitly constructed with a database handle and config, then shared by
//! callers — no global state. Exposes the external interface (lookup, store,
//! store_compound, validate, invalidate, on_entity_change, stats) and owns
//! the bounded background queue for fire-and-forget work: hit recording with
//! opportunistic tier promotion, and post-store link discovery. Queue
//! failures are logged and counted, never silently dropped; without an
//! attached worker every task applies inline.

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::canonical::{self, rules::AbstractionRules};
use crate::config::MnemoConfig;
use crate::error::{MemoryError, Result};
use crate::policy::PolicyTable;
use crate::store::retrieval::{self, LookupHit};
use crate::store::stats::{engine_stats, EngineStats};
use crate::store::types::{ChangeKind, Dependency, MemoryUnit, Tier};
use crate::store::units::{self, NewUnit};
use crate::store::{compound, days_from_now_rfc3339, invalidation, lifecycle};

/// Options for [`MemoryEngine::store`]. Unset fields fall back to the policy
/// table.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub context_id: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub tier: Option<Tier>,
    pub expiry_days: Option<i64>,
    pub initial_confidence: Option<f64>,
    /// Entity category for policy resolution; falls back to a `category`
    /// parameter when absent.
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Fire-and-forget work dispatched off the request path.
#[derive(Debug)]
enum Task {
    /// Record a retrieval hit and evaluate tier promotion.
    RecordHit { unit_id: String },
    /// Associate a fresh unit with others sharing its dependency entities.
    DiscoverLinks { unit_id: String },
}

/// Counters for the background queue. Failures here are observability data,
/// not errors for the caller.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub dispatched: AtomicU64,
    pub applied_inline: AtomicU64,
    pub failures: AtomicU64,
}

/// Full unit view with its audit trail (CLI `inspect`).
#[derive(Debug, Serialize)]
pub struct InspectView {
    pub unit: MemoryUnit,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
pub struct LogEntry {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub created_at: String,
}

/// The service object. Cheap to share behind an `Arc`.
pub struct MemoryEngine {
    db: Arc<Mutex<Connection>>,
    config: Arc<MnemoConfig>,
    policy: PolicyTable,
    rules: AbstractionRules,
    queue: Option<mpsc::Sender<Task>>,
    metrics: Arc<QueueMetrics>,
}

impl MemoryEngine {
    /// Build an engine over an open database with the built-in abstraction
    /// rules and the config's policy overrides applied.
    pub fn new(conn: Connection, config: MnemoConfig) -> Self {
        let policy = PolicyTable::with_overrides(&config.policy);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            policy,
            rules: AbstractionRules::builtin(),
            queue: None,
            metrics: Arc::new(QueueMetrics::default()),
        }
    }

    /// Replace the abstraction rule table (callers may register their own
    /// tools).
    pub fn with_rules(mut self, rules: AbstractionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Attach a bounded background queue. The returned worker must be driven
    /// (`worker.run().await`) on a runtime; until then, or when the queue is
    /// full, tasks apply inline.
    pub fn attach_background(&mut self, capacity: usize) -> BackgroundWorker {
        let (tx, rx) = mpsc::channel(capacity);
        self.queue = Some(tx);
        BackgroundWorker {
            rx,
            db: Arc::clone(&self.db),
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
        }
    }

    pub fn config(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn queue_metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── external interface ───────────────────────────────────────────────────

    /// Look up a cached result for a tool invocation.
    ///
    /// The cache is an optimization, never a dependency: store failures and
    /// malformed parameters degrade to a miss. The returned unit reflects the
    /// access optimistically; the durable stat update is fire-and-forget.
    pub fn lookup(
        &self,
        tool: &str,
        params: &Value,
        context_id: Option<&str>,
        threshold: f64,
    ) -> Option<LookupHit> {
        let category = resolve_category(None, params);
        if !self.policy.policy_for(tool, category.as_deref()).memory_enabled {
            tracing::debug!(tool, "memory disabled by policy, skipping lookup");
            return None;
        }

        let result = {
            let conn = self.conn();
            retrieval::lookup(
                &conn,
                &self.rules,
                &self.config.similarity,
                &self.config.retrieval,
                tool,
                params,
                context_id,
                threshold,
            )
        };

        let hit = match result {
            Ok(hit) => hit,
            Err(MemoryError::Validation(reason)) => {
                tracing::debug!(tool, reason, "unfingerprintable query, treating as miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(tool, error = %e, "lookup failed, degrading to miss");
                return None;
            }
        };

        hit.map(|mut hit| {
            hit.unit.access_count += 1;
            hit.unit.hit_count += 1;
            self.dispatch(Task::RecordHit {
                unit_id: hit.unit.id.clone(),
            });
            hit
        })
    }

    /// Cache a freshly computed tool result. Returns `None` when policy
    /// disables memory for this tool/category.
    pub fn store(
        &self,
        tool: &str,
        params: &Value,
        payload: Value,
        options: StoreOptions,
    ) -> Result<Option<MemoryUnit>> {
        let category = resolve_category(options.category.as_deref(), params);
        let row = self.policy.policy_for(tool, category.as_deref());
        if !row.memory_enabled {
            tracing::debug!(tool, ?category, "memory disabled by policy, store is a no-op");
            return Ok(None);
        }

        let abstract_params = canonical::abstract_params(&self.rules, tool, params)?;
        let fingerprint = canonical::fingerprint_abstract(tool, &abstract_params);
        let complexity = canonical::complexity_score(&self.rules, tool, params);

        let tier = options.tier.unwrap_or(row.tier);
        let confidence = options
            .initial_confidence
            .unwrap_or(row.initial_confidence)
            .clamp(0.0, 1.0);
        let expires_at = match tier {
            Tier::LongTerm => None,
            _ => {
                let days = options
                    .expiry_days
                    .or(row.expiry_days)
                    .unwrap_or(match tier {
                        Tier::MidTerm => self.config.lifecycle.mid_term_expiry_days,
                        _ => self.config.lifecycle.short_term_expiry_days,
                    });
                Some(days_from_now_rfc3339(days))
            }
        };

        let unit = {
            let mut conn = self.conn();
            units::insert_unit(
                &mut conn,
                NewUnit {
                    tool_name: tool.to_string(),
                    fingerprint,
                    original_params: params.clone(),
                    abstract_params,
                    complexity,
                    is_compound: false,
                    context_id: options.context_id,
                    payload,
                    confidence,
                    tier,
                    expires_at,
                    tags: options.tags,
                    dependencies: options.dependencies,
                },
            )?
        };

        tracing::debug!(tool, unit = %unit.id, tier = %unit.tier, "stored memory unit");
        self.dispatch(Task::DiscoverLinks {
            unit_id: unit.id.clone(),
        });
        Ok(Some(unit))
    }

    /// Aggregate a session's tool calls into one compound unit. Returns
    /// `None` for an empty step list.
    pub fn store_compound(
        &self,
        context_id: &str,
        steps: &[compound::CompoundStep],
        dependencies: Vec<Dependency>,
    ) -> Result<Option<MemoryUnit>> {
        let unit = {
            let mut conn = self.conn();
            compound::build_compound(
                &mut conn,
                &self.rules,
                &self.config.compound,
                &self.config.lifecycle,
                context_id,
                steps,
                dependencies,
            )?
        };

        if let Some(unit) = &unit {
            self.dispatch(Task::DiscoverLinks {
                unit_id: unit.id.clone(),
            });
        }
        Ok(unit)
    }

    /// Confirm a cached result: confidence back to 1.0, validated flag set.
    /// Returns `false` for an unknown id.
    pub fn validate(&self, unit_id: &str) -> Result<bool> {
        let conn = self.conn();
        units::mark_validated(&conn, unit_id)
    }

    /// Force-expire a cached result (confidence 0, expired now). Returns
    /// `false` for an unknown id.
    pub fn invalidate(&self, unit_id: &str) -> Result<bool> {
        let conn = self.conn();
        let found = units::force_expire(&conn, unit_id)?;
        if found {
            units::write_audit_log(&conn, "invalidate", unit_id, None)?;
        }
        Ok(found)
    }

    /// Propagate an entity change into dependent units. Returns the number
    /// affected.
    pub fn on_entity_change(
        &self,
        entity_type: &str,
        entity_id: &str,
        kind: ChangeKind,
    ) -> Result<usize> {
        let conn = self.conn();
        invalidation::on_entity_change(&conn, &self.config.invalidation, entity_type, entity_id, kind)
    }

    /// Aggregate store statistics.
    pub fn stats(&self) -> Result<EngineStats> {
        let conn = self.conn();
        engine_stats(&conn)
    }

    /// Fetch a unit by id.
    pub fn get(&self, unit_id: &str) -> Result<Option<MemoryUnit>> {
        let conn = self.conn();
        units::get_unit(&conn, unit_id)
    }

    /// Full unit view with its audit trail.
    pub fn inspect(&self, unit_id: &str) -> Result<InspectView> {
        let conn = self.conn();
        let unit = units::get_unit(&conn, unit_id)?
            .ok_or_else(|| MemoryError::NotFound(unit_id.to_string()))?;
        let log = units::audit_log(&conn, unit_id)?
            .into_iter()
            .map(|(operation, details, created_at)| LogEntry {
                operation,
                details,
                created_at,
            })
            .collect();
        Ok(InspectView { unit, log })
    }

    /// Run the three lifecycle sweeps once. The connection lock is taken per
    /// sweep, not across all three, so retrieval interleaves between them.
    pub fn sweep(&self, dry_run: bool) -> Result<lifecycle::SweepReport> {
        let archived_by_decay = {
            let conn = self.conn();
            lifecycle::decay_sweep(&conn, &self.config.lifecycle)?
        };
        let archived_by_expiry = {
            let conn = self.conn();
            lifecycle::expiry_sweep(&conn)?
        };
        let purged = {
            let mut conn = self.conn();
            lifecycle::purge_sweep(&mut conn, &self.config.lifecycle, dry_run)?.deleted
        };
        Ok(lifecycle::SweepReport {
            archived_by_decay,
            archived_by_expiry,
            purged,
            dry_run,
        })
    }

    // ── background dispatch ──────────────────────────────────────────────────

    fn dispatch(&self, task: Task) {
        if let Some(queue) = &self.queue {
            match queue.try_send(task) {
                Ok(()) => {
                    self.metrics.dispatched.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(mpsc::error::TrySendError::Full(task))
                | Err(mpsc::error::TrySendError::Closed(task)) => {
                    tracing::warn!(?task, "background queue unavailable, applying inline");
                    self.apply_inline(task);
                    return;
                }
            }
        }
        self.apply_inline(task);
    }

    fn apply_inline(&self, task: Task) {
        self.metrics.applied_inline.fetch_add(1, Ordering::Relaxed);
        let mut conn = self.conn();
        if let Err(e) = apply_task(&mut conn, &self.config, &task) {
            self.metrics.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(?task, error = %e, "background task failed");
        }
    }
}

/// Drains the background queue. Spawn `run()` on the runtime that serves
/// requests; it exits when the engine (the sender side) is dropped.
pub struct BackgroundWorker {
    rx: mpsc::Receiver<Task>,
    db: Arc<Mutex<Connection>>,
    config: Arc<MnemoConfig>,
    metrics: Arc<QueueMetrics>,
}

impl BackgroundWorker {
    pub async fn run(mut self) {
        tracing::debug!("background worker started");
        while let Some(task) = self.rx.recv().await {
            let db = Arc::clone(&self.db);
            let config = Arc::clone(&self.config);
            let metrics = Arc::clone(&self.metrics);
            // DB work is synchronous — keep it off the async executor threads.
            let outcome = tokio::task::spawn_blocking(move || {
                let mut conn = db.lock().unwrap_or_else(|e| e.into_inner());
                apply_task(&mut conn, &config, &task)
                    .map_err(|e| (task, e))
            })
            .await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err((task, e))) => {
                    metrics.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(?task, error = %e, "background task failed");
                }
                Err(e) => {
                    metrics.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "background task panicked");
                }
            }
        }
        tracing::debug!("background worker stopped");
    }
}

/// Apply one background task. Shared by the worker and the inline fallback.
fn apply_task(conn: &mut Connection, config: &MnemoConfig, task: &Task) -> Result<()> {
    match task {
        Task::RecordHit { unit_id } => {
            units::record_access(conn, unit_id, true)?;
            lifecycle::maybe_promote(conn, &config.lifecycle, unit_id)?;
            Ok(())
        }
        Task::DiscoverLinks { unit_id } => discover_links(conn, unit_id),
    }
}

/// Upper bound on associations created per discovery pass.
const LINK_DISCOVERY_LIMIT: usize = 5;

/// Associate a unit with others that depend on the same entities.
fn discover_links(conn: &Connection, unit_id: &str) -> Result<()> {
    let peers: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT d2.unit_id FROM unit_dependencies d1 \
             JOIN unit_dependencies d2 \
               ON d1.entity_type = d2.entity_type AND d1.entity_id = d2.entity_id \
             WHERE d1.unit_id = ?1 AND d2.unit_id != ?1 \
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![unit_id, LINK_DISCOVERY_LIMIT as i64],
            |row| row.get(0),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    for peer in peers {
        units::link_related(conn, unit_id, &peer)?;
    }
    Ok(())
}

/// Category for policy resolution: explicit option first, then the query's
/// own `category` parameter.
fn resolve_category(explicit: Option<&str>, params: &Value) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| {
            params
                .get("category")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_lowercase())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::compound::CompoundStep;
    use crate::store::retrieval::MatchKind;
    use crate::store::types::Relationship;
    use serde_json::json;

    fn engine() -> MemoryEngine {
        let conn = db::open_memory_database().unwrap();
        MemoryEngine::new(conn, MnemoConfig::default())
    }

    #[test]
    fn store_then_lookup_round_trip() {
        let engine = engine();
        let params = json!({"itemName": "笔", "exactMatch": true});

        let stored = engine
            .store("find_item", &params, json!({"location": "desk"}), StoreOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_count, 1);
        assert_eq!(stored.hit_count, 0);

        let hit = engine.lookup("find_item", &params, None, 0.8).unwrap();
        assert_eq!(hit.kind, MatchKind::Exact);
        assert_eq!(hit.unit.id, stored.id);
        // optimistic counters on the returned copy
        assert_eq!(hit.unit.access_count, 2);
        assert_eq!(hit.unit.hit_count, 1);

        // and durably recorded (inline, no worker attached)
        let fetched = engine.get(&stored.id).unwrap().unwrap();
        assert_eq!(fetched.access_count, 2);
        assert_eq!(fetched.hit_count, 1);
    }

    #[test]
    fn policy_disabled_store_is_a_no_op() {
        let engine = engine();
        let params = json!({"city": "上海", "units": "metric"});

        let stored = engine
            .store("query_weather", &params, json!({"temp": 31}), StoreOptions::default())
            .unwrap();
        assert!(stored.is_none());

        assert!(engine.lookup("query_weather", &params, None, 0.0).is_none());
    }

    #[test]
    fn policy_disabled_category_is_a_no_op() {
        let engine = engine();
        let params = json!({"itemName": "护照", "category": "identity_document"});

        let stored = engine
            .store("find_item", &params, json!({"location": "safe"}), StoreOptions::default())
            .unwrap();
        assert!(stored.is_none());
    }

    #[test]
    fn store_applies_policy_defaults_and_overrides() {
        let engine = engine();

        // policy default for query_contact: long_term, no expiry
        let unit = engine
            .store(
                "query_contact",
                &json!({"search": "王小明"}),
                json!({"phone": "138"}),
                StoreOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(unit.tier, Tier::LongTerm);
        assert!(unit.expires_at.is_none());
        assert!((unit.confidence - 0.9).abs() < 1e-9);

        // explicit options win
        let unit = engine
            .store(
                "query_contact",
                &json!({"search": "李雷"}),
                json!({"phone": "139"}),
                StoreOptions {
                    tier: Some(Tier::ShortTerm),
                    initial_confidence: Some(0.5),
                    expiry_days: Some(2),
                    ..StoreOptions::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(unit.tier, Tier::ShortTerm);
        assert!((unit.confidence - 0.5).abs() < 1e-9);
        assert!(unit.expires_at.is_some());
    }

    #[test]
    fn invalid_params_error_store_but_miss_lookup() {
        let engine = engine();
        let params = json!("not an object");

        let err = engine
            .store("find_item", &params, json!(null), StoreOptions::default())
            .unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));

        // lookup degrades to miss instead of failing the caller
        assert!(engine.lookup("find_item", &params, None, 0.0).is_none());
    }

    #[test]
    fn validate_and_invalidate_round_trip() {
        let engine = engine();
        let params = json!({"itemName": "钥匙", "exactMatch": true});
        let unit = engine
            .store("find_item", &params, json!({"location": "door"}), StoreOptions::default())
            .unwrap()
            .unwrap();

        assert!(engine.validate(&unit.id).unwrap());
        let validated = engine.get(&unit.id).unwrap().unwrap();
        assert_eq!(validated.confidence, 1.0);
        assert!(validated.validated);

        assert!(engine.invalidate(&unit.id).unwrap());
        let invalidated = engine.get(&unit.id).unwrap().unwrap();
        assert_eq!(invalidated.confidence, 0.0);

        // unknown ids report false, not an error
        assert!(!engine.validate("no-such-id").unwrap());
        assert!(!engine.invalidate("no-such-id").unwrap());

        // an invalidated unit is never returned again
        assert!(engine.lookup("find_item", &params, None, 0.0).is_none());
    }

    #[test]
    fn entity_deletion_cascades_through_engine() {
        let engine = engine();
        let params = json!({"search": "王小明"});
        let unit = engine
            .store(
                "query_contact",
                &params,
                json!({"phone": "138"}),
                StoreOptions {
                    dependencies: vec![Dependency::new("contact", "c-1", Relationship::Primary)],
                    ..StoreOptions::default()
                },
            )
            .unwrap()
            .unwrap();

        assert!(engine.lookup("query_contact", &params, None, 0.5).is_some());

        let affected = engine
            .on_entity_change("contact", "c-1", ChangeKind::Deleted)
            .unwrap();
        assert_eq!(affected, 1);

        assert!(engine.lookup("query_contact", &params, None, 0.0).is_none());
        assert_eq!(engine.get(&unit.id).unwrap().unwrap().confidence, 0.0);
    }

    #[test]
    fn compound_store_and_context_lookup() {
        let engine = engine();
        let steps = vec![
            CompoundStep {
                tool: "query_contact".to_string(),
                parameters: json!({"search": "王小明"}),
                result: json!({"phone": "138"}),
            },
            CompoundStep {
                tool: "estimate_time".to_string(),
                parameters: json!({"origin": "A", "destination": "B"}),
                result: json!({"minutes": 25}),
            },
        ];

        let unit = engine.store_compound("ctx-7", &steps, vec![]).unwrap().unwrap();
        assert!(unit.is_compound);

        let hit = engine
            .lookup("query_contact", &json!({"search": "王小明"}), Some("ctx-7"), 0.6)
            .unwrap();
        assert_eq!(hit.unit.id, unit.id);
        assert_eq!(hit.kind, MatchKind::ContextStep);

        // empty steps build nothing
        assert!(engine.store_compound("ctx-8", &[], vec![]).unwrap().is_none());
    }

    #[test]
    fn link_discovery_associates_shared_dependencies() {
        let engine = engine();
        let dep = vec![Dependency::new("contact", "c-2", Relationship::Secondary)];

        let first = engine
            .store(
                "query_contact",
                &json!({"search": "王小明"}),
                json!({"phone": "138"}),
                StoreOptions {
                    dependencies: dep.clone(),
                    ..StoreOptions::default()
                },
            )
            .unwrap()
            .unwrap();
        let second = engine
            .store(
                "estimate_time",
                &json!({"origin": "家", "destination": "公司"}),
                json!({"minutes": 40}),
                StoreOptions {
                    dependencies: dep,
                    ..StoreOptions::default()
                },
            )
            .unwrap()
            .unwrap();

        // no worker attached — discovery applied inline
        let fetched = engine.get(&second.id).unwrap().unwrap();
        assert_eq!(fetched.related, vec![first.id.clone()]);
        let fetched = engine.get(&first.id).unwrap().unwrap();
        assert_eq!(fetched.related, vec![second.id.clone()]);
    }

    #[test]
    fn inspect_returns_unit_with_audit_trail() {
        let engine = engine();
        let unit = engine
            .store(
                "find_item",
                &json!({"itemName": "伞", "exactMatch": false}),
                json!({"location": "car"}),
                StoreOptions::default(),
            )
            .unwrap()
            .unwrap();
        engine.validate(&unit.id).unwrap();

        let view = engine.inspect(&unit.id).unwrap();
        assert_eq!(view.unit.id, unit.id);
        let ops: Vec<&str> = view.log.iter().map(|e| e.operation.as_str()).collect();
        assert!(ops.contains(&"create"));
        assert!(ops.contains(&"validate"));

        let err = engine.inspect("no-such-id").unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn stats_reflect_hits() {
        let engine = engine();
        let params = json!({"itemName": "笔", "exactMatch": true});
        engine
            .store("find_item", &params, json!({"location": "desk"}), StoreOptions::default())
            .unwrap();
        engine.lookup("find_item", &params, None, 0.8).unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.total, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn background_worker_drains_queue() {
        let conn = db::open_memory_database().unwrap();
        let mut engine = MemoryEngine::new(conn, MnemoConfig::default());
        let worker = engine.attach_background(64);
        let engine = Arc::new(engine);
        let handle = tokio::spawn(worker.run());

        let params = json!({"itemName": "笔", "exactMatch": true});
        let stored = engine
            .store("find_item", &params, json!({"location": "desk"}), StoreOptions::default())
            .unwrap()
            .unwrap();
        let hit = engine.lookup("find_item", &params, None, 0.8).unwrap();
        assert_eq!(hit.unit.id, stored.id);

        // give the worker a moment to drain, then verify durability
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if engine.get(&stored.id).unwrap().unwrap().hit_count == 1 {
                break;
            }
        }
        assert_eq!(engine.get(&stored.id).unwrap().unwrap().hit_count, 1);
        assert!(engine.queue_metrics().dispatched.load(Ordering::Relaxed) >= 1);

        drop(engine); // closes the queue; worker exits
        handle.await.unwrap();
    }
}
