use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::model::CandidateItem;
use crate::pipeline::{Pipeline, RunReport, REPORT_TOP_N};
use crate::store::RunStore;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn RunStore>,
    /// `/metrics` is mounted only when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/run", post(run_now))
        .route("/top", get(top))
        .route("/runs/latest", get(latest_run))
        .route("/runs", get(recent_runs));

    if let Some(handle) = state.metrics.clone() {
        router = router.merge(crate::metrics::router(handle));
    }

    router.layer(CorsLayer::very_permissive()).with_state(state)
}

/// Trigger response: status, top items, artifact, structured errors.
#[derive(Serialize)]
struct RunResp {
    run_id: String,
    status: String,
    ranked_items: Vec<CandidateItem>,
    selected: Option<CandidateItem>,
    artifact: Option<crate::generate::Newsreel>,
    errors: Vec<crate::error::StageError>,
    source_errors: Vec<crate::error::SourceUnavailable>,
}

impl From<RunReport> for RunResp {
    fn from(r: RunReport) -> Self {
        Self {
            run_id: r.run_id,
            status: r.status.as_str().to_string(),
            ranked_items: r.ranked_items,
            selected: r.selected,
            artifact: r.artifact,
            errors: r.errors,
            source_errors: r.source_errors,
        }
    }
}

async fn run_now(State(state): State<AppState>) -> Json<RunResp> {
    let report = state.pipeline.run().await;
    Json(report.into())
}

#[derive(Deserialize)]
struct TopParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct TopResp {
    run_id: Option<String>,
    items: Vec<CandidateItem>,
}

async fn top(State(state): State<AppState>, Query(p): Query<TopParams>) -> Response {
    let limit = p.limit.unwrap_or(REPORT_TOP_N).min(REPORT_TOP_N);
    match state.store.latest().await {
        Ok(Some(r)) => Json(TopResp {
            run_id: Some(r.run_id),
            items: r.ranked_items.into_iter().take(limit).collect(),
        })
        .into_response(),
        Ok(None) => Json(TopResp {
            run_id: None,
            items: vec![],
        })
        .into_response(),
        Err(e) => store_error(e),
    }
}

async fn latest_run(State(state): State<AppState>) -> Response {
    match state.store.latest().await {
        Ok(Some(r)) => Json(r).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "no runs yet").into_response(),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
struct RecentParams {
    #[serde(default = "default_recent")]
    n: usize,
}

fn default_recent() -> usize {
    10
}

async fn recent_runs(State(state): State<AppState>, Query(p): Query<RecentParams>) -> Response {
    match state.store.recent(p.n.min(100)).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => store_error(e),
    }
}

fn store_error(e: anyhow::Error) -> Response {
    tracing::warn!(error = %e, "run store read failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "run store unavailable").into_response()
}
