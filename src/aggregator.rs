//! # Source aggregation
//! Fetch every source concurrently, retry each one on its own budget, and
//! merge whatever succeeded. Total failure is reported, never raised.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::SourceUnavailable;
use crate::model::CandidateItem;
use crate::sources::registry::DynSource;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("source_fetch_attempts_total", "Source fetch attempts, including retries.");
        describe_counter!("source_failures_total", "Sources that exhausted their retries.");
        describe_counter!("items_collected_total", "Items collected across all sources.");
    });
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Total attempts per source, first try included.
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    /// Upper bound for one fetch attempt.
    pub fetch_timeout_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 5,
            fetch_timeout_secs: 30,
        }
    }
}

impl AggregatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Result of one aggregation pass.
#[derive(Debug, Default)]
pub struct Aggregated {
    /// Items from every source that eventually succeeded. Source-internal
    /// order is preserved; sources are concatenated in declaration order.
    pub items: Vec<CandidateItem>,
    pub per_source_errors: Vec<SourceUnavailable>,
    pub sources_total: usize,
}

impl Aggregated {
    pub fn all_failed(&self) -> bool {
        self.sources_total > 0 && self.per_source_errors.len() == self.sources_total
    }
}

pub struct SourceAggregator {
    cfg: AggregatorConfig,
}

impl SourceAggregator {
    pub fn new(cfg: AggregatorConfig) -> Self {
        Self { cfg }
    }

    pub async fn fetch_all(&self, sources: &[DynSource]) -> Aggregated {
        ensure_metrics_described();

        let outcomes = join_all(sources.iter().map(|s| self.fetch_with_retry(s))).await;

        let mut agg = Aggregated {
            sources_total: sources.len(),
            ..Default::default()
        };
        let mut seen: HashMap<String, usize> = HashMap::new();
        for outcome in outcomes {
            match outcome {
                Ok(items) => {
                    for mut item in items {
                        // a repeated id (same story twice in one feed, or two
                        // sources sharing a name) gets a `#n` suffix
                        let n = seen.entry(item.id.clone()).or_insert(0);
                        *n += 1;
                        if *n > 1 {
                            item.id = format!("{}#{n}", item.id);
                        }
                        agg.items.push(item);
                    }
                }
                Err(e) => {
                    counter!("source_failures_total").increment(1);
                    agg.per_source_errors.push(e);
                }
            }
        }
        counter!("items_collected_total").increment(agg.items.len() as u64);

        if agg.all_failed() {
            tracing::warn!(sources = agg.sources_total, "every source failed");
        }
        agg
    }

    async fn fetch_with_retry(&self, source: &DynSource) -> Result<Vec<CandidateItem>, SourceUnavailable> {
        let attempts = self.cfg.max_attempts.max(1);
        let mut last_err = String::new();

        for attempt in 1..=attempts {
            counter!("source_fetch_attempts_total").increment(1);
            let res = tokio::time::timeout(self.cfg.fetch_timeout(), source.fetch()).await;
            match res {
                Ok(Ok(raw)) => {
                    tracing::info!(source = source.name(), items = raw.len(), attempt, "fetched source");
                    return Ok(raw
                        .into_iter()
                        .map(|r| CandidateItem::fetched_by(source.name(), r))
                        .collect());
                }
                Ok(Err(e)) => last_err = format!("{e:#}"),
                Err(_) => last_err = format!("timed out after {:?}", self.cfg.fetch_timeout()),
            }
            tracing::warn!(
                source = source.name(),
                attempt,
                max_attempts = attempts,
                error = %last_err,
                "source fetch failed"
            );
            if attempt < attempts {
                tokio::time::sleep(self.cfg.retry_delay()).await;
            }
        }

        Err(SourceUnavailable {
            source_name: source.name().to_string(),
            attempts,
            reason: last_err,
        })
    }
}
