//! Weird-news pipeline service. Binary entrypoint.
//! Boots the Axum HTTP server, the periodic scheduler, and the metrics recorder.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weird_news_pipeline::api::{create_router, AppState};
use weird_news_pipeline::bootstrap::AppRuntime;
use weird_news_pipeline::metrics::Metrics;
use weird_news_pipeline::scheduler::spawn_scheduler;

/// Compact logs by default, JSON with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("weird_news_pipeline=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // The hosting runtime may already have installed a subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let runtime = AppRuntime::from_env()?;
    let metrics = Metrics::init()?;

    if runtime.cfg.scheduler.enabled {
        spawn_scheduler(runtime.cfg.scheduler, runtime.pipeline.clone());
    } else {
        tracing::info!("scheduler disabled; runs only via POST /run");
    }

    let state = AppState {
        pipeline: runtime.pipeline.clone(),
        store: runtime.store.clone(),
        metrics: Some(metrics.handle.clone()),
    };
    let router = create_router(state);

    Ok(router.into())
}
