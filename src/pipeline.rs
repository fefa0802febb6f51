//! # Pipeline orchestrator
//! Collecting → Scoring → Ranking → Selecting → GeneratingArtifact → Done.
//!
//! Stages run strictly in sequence. Source, signal and item failures degrade
//! the run. `Failed` is reached only when cancelled during collection, or
//! when items were collected but none could be scored. Once ranked, the run
//! always ends `Done`: generation failures and late cancels leave a
//! `partial` status with the ranking intact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::aggregator::SourceAggregator;
use crate::error::{ErrorKind, SourceUnavailable, StageError};
use crate::generate::{ArtifactGenerator, Newsreel};
use crate::model::CandidateItem;
use crate::notify::WebhookNotifier;
use crate::scoring::{rank, CompositeScorer};
use crate::sources::registry::DynSource;
use crate::store::RunStore;

/// Ranked items kept in a report.
pub const REPORT_TOP_N: usize = 10;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Finished pipeline runs by status.");
        describe_gauge!("pipeline_last_run_ts", "Unix timestamp of the last finished run.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Collecting,
    Scoring,
    Ranking,
    Selecting,
    GeneratingArtifact,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Collecting => "collecting",
            PipelineState::Scoring => "scoring",
            PipelineState::Ranking => "ranking",
            PipelineState::Selecting => "selecting",
            PipelineState::GeneratingArtifact => "generating_artifact",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Ranking and a complete artifact, nothing degraded.
    Completed,
    /// Ranking available, something along the way degraded or failed.
    Partial,
    /// No items today.
    Empty,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Empty => "empty",
            RunStatus::Failed => "failed",
        }
    }
}

/// Result of one run. Always produced, whatever failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Terminal state of the run.
    pub state: PipelineState,
    pub ranked_items: Vec<CandidateItem>,
    pub selected: Option<CandidateItem>,
    pub artifact: Option<Newsreel>,
    pub errors: Vec<StageError>,
    pub source_errors: Vec<SourceUnavailable>,
}

impl RunReport {
    fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id_for(started_at),
            started_at,
            finished_at: started_at,
            status: RunStatus::Empty,
            state: PipelineState::Idle,
            ranked_items: Vec::new(),
            selected: None,
            artifact: None,
            errors: Vec::new(),
            source_errors: Vec::new(),
        }
    }
}

/// Run ids sort chronologically.
pub fn run_id_for(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Cooperative cancellation, observed between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Pipeline {
    sources: Vec<DynSource>,
    aggregator: SourceAggregator,
    scorer: CompositeScorer,
    generator: ArtifactGenerator,
    scoring_concurrency: usize,
    store: Option<Arc<dyn RunStore>>,
    notifier: Option<WebhookNotifier>,
    state: Mutex<PipelineState>,
    run_lock: tokio::sync::Mutex<()>,
}

impl Pipeline {
    pub fn new(
        sources: Vec<DynSource>,
        aggregator: SourceAggregator,
        scorer: CompositeScorer,
        generator: ArtifactGenerator,
    ) -> Self {
        Self {
            sources,
            aggregator,
            scorer,
            generator,
            scoring_concurrency: 10,
            store: None,
            notifier: None,
            state: Mutex::new(PipelineState::Idle),
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_scoring_concurrency(mut self, n: usize) -> Self {
        self.scoring_concurrency = n.max(1);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: WebhookNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// State of the current (or last) run.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().expect("pipeline state mutex poisoned")
    }

    pub async fn run(&self) -> RunReport {
        self.run_with_cancel(&CancelHandle::new()).await
    }

    /// One full run. Overlapping calls are serialized.
    pub async fn run_with_cancel(&self, cancel: &CancelHandle) -> RunReport {
        ensure_metrics_described();
        let _guard = self.run_lock.lock().await;

        let mut report = self.execute(cancel).await;
        report.finished_at = Utc::now();
        self.set_state(report.state);

        counter!("pipeline_runs_total", "status" => report.status.as_str()).increment(1);
        gauge!("pipeline_last_run_ts").set(report.finished_at.timestamp() as f64);
        tracing::info!(
            run_id = %report.run_id,
            status = report.status.as_str(),
            ranked = report.ranked_items.len(),
            errors = report.errors.len(),
            "pipeline run finished"
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&report).await {
                tracing::warn!(run_id = %report.run_id, error = %e, "failed to persist run report");
            }
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&report).await {
                tracing::warn!(run_id = %report.run_id, error = %e, "completion webhook failed");
            }
        }
        report
    }

    async fn execute(&self, cancel: &CancelHandle) -> RunReport {
        let mut report = RunReport::begin(Utc::now());

        // Collecting
        self.enter(&mut report, PipelineState::Collecting);
        let aggregated = self.aggregator.fetch_all(&self.sources).await;
        report.source_errors = aggregated.per_source_errors.clone();
        if aggregated.all_failed() {
            report.errors.push(StageError::new(
                "collecting",
                ErrorKind::AllSourcesFailed,
                format!("all {} sources failed", aggregated.sources_total),
            ));
        }
        if aggregated.items.is_empty() {
            tracing::info!(run_id = %report.run_id, "no items collected; nothing to rank");
            return finish(report, PipelineState::Done, RunStatus::Empty);
        }
        if cancel.is_cancelled() {
            return cancelled(report, "collecting");
        }

        // Scoring
        self.enter(&mut report, PipelineState::Scoring);
        let collected = aggregated.items.len();
        let (scored, dropped) = self
            .scorer
            .score_all(aggregated.items, self.scoring_concurrency)
            .await;
        for d in &dropped {
            report.errors.push(StageError::new(
                "scoring",
                ErrorKind::ScoringFailed,
                d.error.to_string(),
            ));
        }
        if scored.is_empty() {
            tracing::warn!(run_id = %report.run_id, collected, "no item could be scored");
            return finish(report, PipelineState::Failed, RunStatus::Failed);
        }

        // Ranking
        self.enter(&mut report, PipelineState::Ranking);
        let ranked = rank(scored);
        report.ranked_items = ranked.top_n(REPORT_TOP_N);

        // Selecting
        self.enter(&mut report, PipelineState::Selecting);
        report.selected = ranked.top().cloned();
        let Some(selected) = report.selected.clone() else {
            return finish(report, PipelineState::Done, RunStatus::Empty);
        };
        tracing::info!(
            run_id = %report.run_id,
            item = %selected.id,
            score = selected.score.unwrap_or_default(),
            "selected top item"
        );
        // ranking is committed from here on; a cancel only skips generation
        if cancel.is_cancelled() {
            push_cancelled(&mut report, "selecting");
            return finish(report, PipelineState::Done, RunStatus::Partial);
        }

        // GeneratingArtifact
        self.enter(&mut report, PipelineState::GeneratingArtifact);
        match self.generator.generate(&selected).await {
            Ok(outcome) => {
                report.errors.extend(outcome.errors);
                report.artifact = Some(outcome.newsreel);
            }
            Err(e) => {
                tracing::warn!(run_id = %report.run_id, error = %e, "artifact generation failed; ranking kept");
                report.errors.push(StageError::from(&e));
            }
        }

        let degraded = report.artifact.is_none()
            || !report.errors.is_empty()
            || !report.source_errors.is_empty();
        let status = if degraded {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        };
        finish(report, PipelineState::Done, status)
    }

    fn enter(&self, report: &mut RunReport, next: PipelineState) {
        tracing::info!(run_id = %report.run_id, stage = next.as_str(), "entering stage");
        report.state = next;
        self.set_state(next);
    }

    fn set_state(&self, s: PipelineState) {
        *self.state.lock().expect("pipeline state mutex poisoned") = s;
    }
}

fn cancelled(mut report: RunReport, stage: &str) -> RunReport {
    push_cancelled(&mut report, stage);
    finish(report, PipelineState::Failed, RunStatus::Failed)
}

fn push_cancelled(report: &mut RunReport, stage: &str) {
    tracing::warn!(run_id = %report.run_id, stage, "run cancelled");
    report.errors.push(StageError::new(
        stage,
        ErrorKind::Cancelled,
        format!("run cancelled after {stage}"),
    ));
}

fn finish(mut report: RunReport, state: PipelineState, status: RunStatus) -> RunReport {
    report.state = state;
    report.status = status;
    report
}
