use anyhow::{anyhow, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls share it.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                // Default buckets to avoid API differences across crate versions.
                PrometheusBuilder::new()
                    .install_recorder()
                    .map_err(|e| anyhow!("prometheus: install recorder: {e}"))
            })?
            .clone();
        describe_core();
        Ok(Self { handle })
    }
}

/// `/metrics` in the Prometheus exposition format, mergeable into any router.
pub fn router<S>(handle: PrometheusHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}

/// Series emitted outside the aggregator and pipeline, which describe their own.
fn describe_core() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "provider_attempts_total",
            "Cascade attempts by provider and outcome."
        );
        describe_histogram!("provider_latency_ms", "Provider call latency in milliseconds.");
        describe_histogram!("rate_limit_wait_ms", "Time spent waiting for a pool slot.");
        describe_counter!(
            "signal_defaults_total",
            "Signals replaced by their neutral default."
        );
        describe_counter!("items_dropped_total", "Items dropped because no signal could be computed.");
        describe_counter!("source_items_parsed_total", "Items parsed per source adapter.");
        describe_histogram!("source_parse_ms", "Feed parse time in milliseconds.");
    });
}
