// src/scoring/mod.rs
//! Composite weirdness score in [0, 10].
//!
//! score = clamp(novelty * 0.5 + salient_entities * 0.3 + engagement * 0.2, 0, 10)
//!
//! Each signal is clamped to its own range before weighting (salience has no
//! range of its own; the final clamp bounds it). A failing signal is replaced
//! by its neutral default; only an item whose every signal fails is dropped.
//! Weights and bounds are fixed constants, so identical signal values always
//! give the identical score.

pub mod signals;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Serialize;

use crate::error::ScoringError;
use crate::model::{CandidateItem, RankedResult};

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 10.0;

pub const NOVELTY_WEIGHT: f64 = 0.5;
pub const SALIENCE_WEIGHT: f64 = 0.3;
pub const ENGAGEMENT_WEIGHT: f64 = 0.2;

pub const NOVELTY_NEUTRAL: f64 = 5.0;
pub const SALIENCE_NEUTRAL: f64 = 0.0;
pub const ENGAGEMENT_NEUTRAL: f64 = 0.0;

/// Entities above this salience count towards the salience signal.
pub const SALIENCE_THRESHOLD: f64 = 0.3;
/// Raw engagement is divided by this before capping.
pub const ENGAGEMENT_SCALE: f64 = 1000.0;

/// One independently computed numeric input to the score.
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn evaluate(&self, item: &CandidateItem) -> anyhow::Result<f64>;
}

pub type DynSignal = Arc<dyn SignalExtractor>;

#[derive(Clone)]
pub struct WeightedSignal {
    pub extractor: DynSignal,
    pub weight: f64,
    /// Substituted when the extractor fails.
    pub neutral: f64,
    /// Own range, applied before weighting.
    pub bounds: Option<(f64, f64)>,
}

/// Per-signal contribution, for diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SignalValue {
    pub signal: String,
    pub value: f64,
    pub defaulted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub signals: Vec<SignalValue>,
}

/// Items dropped during batch scoring.
#[derive(Debug)]
pub struct DroppedItem {
    pub item_id: String,
    pub error: ScoringError,
}

pub struct CompositeScorer {
    signals: Vec<WeightedSignal>,
}

impl CompositeScorer {
    pub fn new(signals: Vec<WeightedSignal>) -> Self {
        Self { signals }
    }

    /// Novelty, salience and engagement with the fixed weights.
    pub fn standard(novelty: DynSignal, salience: DynSignal) -> Self {
        Self::new(vec![
            WeightedSignal {
                extractor: novelty,
                weight: NOVELTY_WEIGHT,
                neutral: NOVELTY_NEUTRAL,
                bounds: Some((SCORE_MIN, SCORE_MAX)),
            },
            WeightedSignal {
                extractor: salience,
                weight: SALIENCE_WEIGHT,
                neutral: SALIENCE_NEUTRAL,
                bounds: None,
            },
            WeightedSignal {
                extractor: Arc::new(signals::EngagementSignal),
                weight: ENGAGEMENT_WEIGHT,
                neutral: ENGAGEMENT_NEUTRAL,
                bounds: Some((SCORE_MIN, SCORE_MAX)),
            },
        ])
    }

    pub async fn score(&self, item: &CandidateItem) -> Result<f64, ScoringError> {
        self.score_detailed(item).await.map(|b| b.score)
    }

    pub async fn score_detailed(&self, item: &CandidateItem) -> Result<ScoreBreakdown, ScoringError> {
        let raw = join_all(self.signals.iter().map(|s| s.extractor.evaluate(item))).await;

        let mut values = Vec::with_capacity(self.signals.len());
        for (spec, res) in self.signals.iter().zip(raw) {
            let name = spec.extractor.name().to_string();
            let evaluated = match res {
                Ok(v) if v.is_finite() => Ok(v),
                Ok(v) => Err(format!("non-finite value {v}")),
                Err(e) => Err(format!("{e:#}")),
            };
            match evaluated {
                Ok(v) => {
                    let v = match spec.bounds {
                        Some((lo, hi)) => v.clamp(lo, hi),
                        None => v,
                    };
                    values.push(SignalValue {
                        signal: name,
                        value: v,
                        defaulted: false,
                    });
                }
                Err(reason) => {
                    let err = ScoringError::SignalUnavailable {
                        signal: name.clone(),
                        reason,
                    };
                    tracing::debug!(item = %item.id, error = %err, neutral = spec.neutral, "substituting neutral signal");
                    counter!("signal_defaults_total", "signal" => name.clone()).increment(1);
                    values.push(SignalValue {
                        signal: name,
                        value: spec.neutral,
                        defaulted: true,
                    });
                }
            }
        }

        if !values.is_empty() && values.iter().all(|v| v.defaulted) {
            return Err(ScoringError::ScoringFailed {
                item_id: item.id.clone(),
            });
        }

        Ok(ScoreBreakdown {
            score: combine(&self.signals, &values),
            signals: values,
        })
    }

    /// Score a batch with bounded concurrency. Output keeps input order;
    /// items that fail entirely are returned separately.
    pub async fn score_all(
        &self,
        items: Vec<CandidateItem>,
        concurrency: usize,
    ) -> (Vec<CandidateItem>, Vec<DroppedItem>) {
        let results: Vec<_> = stream::iter(items)
            .map(|item| async move {
                let res = self.score(&item).await;
                (item, res)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut scored = Vec::with_capacity(results.len());
        let mut dropped = Vec::new();
        for (item, res) in results {
            match res {
                Ok(score) => scored.push(item.with_score(score)),
                Err(error) => {
                    tracing::warn!(item = %item.id, error = %error, "dropping unscorable item");
                    counter!("items_dropped_total").increment(1);
                    dropped.push(DroppedItem {
                        item_id: item.id,
                        error,
                    });
                }
            }
        }
        (scored, dropped)
    }
}

/// Sort scored items into the canonical ranking.
pub fn rank(scored: Vec<CandidateItem>) -> RankedResult {
    RankedResult::from_scored(scored)
}

/// Weighted sum of already-bounded signal values, clamped to the score range.
fn combine(specs: &[WeightedSignal], values: &[SignalValue]) -> f64 {
    let raw: f64 = specs
        .iter()
        .zip(values)
        .map(|(spec, v)| v.value * spec.weight)
        .sum();
    raw.clamp(SCORE_MIN, SCORE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Fixed(&'static str, Option<f64>);

    #[async_trait]
    impl SignalExtractor for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        async fn evaluate(&self, _item: &CandidateItem) -> anyhow::Result<f64> {
            self.1.ok_or_else(|| anyhow::anyhow!("unreachable judge"))
        }
    }

    fn item(engagement: Option<f64>) -> CandidateItem {
        CandidateItem {
            id: "t:1".into(),
            title: "Cat elected sheriff".into(),
            description: None,
            url: "https://x.test/cat".into(),
            source: "t".into(),
            engagement,
            created_at: Utc::now(),
            score: None,
        }
    }

    fn scorer(novelty: Option<f64>, salience: Option<f64>) -> CompositeScorer {
        CompositeScorer::standard(
            Arc::new(Fixed("novelty", novelty)),
            Arc::new(Fixed("salience", salience)),
        )
    }

    #[tokio::test]
    async fn weights_combine_as_documented() {
        // 8*0.5 + 2*0.3 + min(3000/1000,10)*0.2 = 4 + 0.6 + 0.6
        let s = scorer(Some(8.0), Some(2.0)).score(&item(Some(3000.0))).await.unwrap();
        assert!((s - 5.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_signal_uses_neutral_default() {
        let b = scorer(None, Some(1.0))
            .score_detailed(&item(None))
            .await
            .unwrap();
        assert!((b.score - (NOVELTY_NEUTRAL * 0.5 + 0.3)).abs() < 1e-9);
        assert!(b.signals[0].defaulted);
        assert!(!b.signals[1].defaulted);
    }

    #[tokio::test]
    async fn unbounded_signals_cannot_escape_the_range() {
        let s = scorer(Some(50.0), Some(40.0)).score(&item(Some(1e9))).await.unwrap();
        assert_eq!(s, SCORE_MAX);
        let s = scorer(Some(-5.0), Some(-3.0)).score(&item(None)).await.unwrap();
        assert_eq!(s, SCORE_MIN);
    }

    #[tokio::test]
    async fn all_signals_failing_drops_the_item() {
        let sc = CompositeScorer::new(vec![WeightedSignal {
            extractor: Arc::new(Fixed("novelty", None)),
            weight: 1.0,
            neutral: 5.0,
            bounds: None,
        }]);
        let (kept, dropped) = sc.score_all(vec![item(None)], 4).await;
        assert!(kept.is_empty());
        assert!(matches!(dropped[0].error, ScoringError::ScoringFailed { .. }));
    }
}
