// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerConfig;
use crate::pipeline::Pipeline;

/// Spawn the periodic trigger. Each tick awaits the run it starts, so runs
/// never overlap; ticks missed during a long run are skipped, not queued.
pub fn spawn_scheduler(cfg: SchedulerConfig, pipeline: Arc<Pipeline>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(cfg.interval_secs.max(1));
        let start = if cfg.run_on_start {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::info!(target: "scheduler", interval_secs = cfg.interval_secs, "scheduled run");
            let report = pipeline.run().await;
            tracing::info!(
                target: "scheduler",
                run_id = %report.run_id,
                status = report.status.as_str(),
                "scheduled run finished"
            );
        }
    })
}
