//! Periodic lifecycle driver.
//!
//! Runs the decay/expiry/purge sweeps on a fixed interval and logs a stats
//! snapshot on a shorter one, without ever blocking request-serving
//! operations: sweeps execute on the blocking pool and every record
//! transition is independent, so cancellation mid-batch is safe.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::MemoryEngine;

/// Drive the lifecycle sweeps and stats refresh forever. Select against a
/// shutdown signal to stop it.
pub async fn run(engine: Arc<MemoryEngine>) {
    let lifecycle = engine.config().lifecycle.clone();
    let mut sweep_timer = tokio::time::interval(Duration::from_secs(lifecycle.sweep_interval_secs));
    let mut stats_timer = tokio::time::interval(Duration::from_secs(lifecycle.stats_interval_secs));
    sweep_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    stats_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // both intervals fire immediately; consume the initial ticks
    sweep_timer.tick().await;
    stats_timer.tick().await;

    tracing::info!(
        sweep_interval_secs = lifecycle.sweep_interval_secs,
        stats_interval_secs = lifecycle.stats_interval_secs,
        "lifecycle scheduler started"
    );

    loop {
        tokio::select! {
            _ = sweep_timer.tick() => {
                let engine = Arc::clone(&engine);
                let outcome = tokio::task::spawn_blocking(move || engine.sweep(false)).await;
                match outcome {
                    Ok(Ok(report)) => tracing::info!(
                        archived_by_decay = report.archived_by_decay,
                        archived_by_expiry = report.archived_by_expiry,
                        purged = report.purged,
                        "lifecycle sweep finished"
                    ),
                    Ok(Err(e)) => tracing::warn!(error = %e, "lifecycle sweep failed"),
                    Err(e) => tracing::warn!(error = %e, "lifecycle sweep panicked"),
                }
            }
            _ = stats_timer.tick() => {
                let engine = Arc::clone(&engine);
                let outcome = tokio::task::spawn_blocking(move || engine.stats()).await;
                match outcome {
                    Ok(Ok(stats)) => tracing::info!(
                        total = stats.total,
                        expired = stats.expired_count,
                        hit_rate = format!("{:.2}", stats.hit_rate),
                        "stats refresh"
                    ),
                    Ok(Err(e)) => tracing::warn!(error = %e, "stats refresh failed"),
                    Err(e) => tracing::warn!(error = %e, "stats refresh panicked"),
                }
            }
        }
    }
}
