// tests/scoring.rs
//
// Composite score: fixed weights, clamping, neutral substitution,
// determinism, and offline signals wired through the standard scorer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use weird_news_pipeline::model::CandidateItem;
use weird_news_pipeline::rate_limit::{PoolLimits, RateLimiters};
use weird_news_pipeline::scoring::signals::{EntitySalienceSignal, KeywordNoveltySignal};
use weird_news_pipeline::scoring::{
    CompositeScorer, SignalExtractor, NOVELTY_NEUTRAL, SCORE_MAX, SCORE_MIN,
};

struct Const(&'static str, f64);

#[async_trait]
impl SignalExtractor for Const {
    fn name(&self) -> &str {
        self.0
    }
    async fn evaluate(&self, _item: &CandidateItem) -> anyhow::Result<f64> {
        Ok(self.1)
    }
}

struct Down(&'static str);

#[async_trait]
impl SignalExtractor for Down {
    fn name(&self) -> &str {
        self.0
    }
    async fn evaluate(&self, _item: &CandidateItem) -> anyhow::Result<f64> {
        anyhow::bail!("judge unreachable")
    }
}

fn item(title: &str, engagement: Option<f64>) -> CandidateItem {
    CandidateItem {
        id: format!("t:{title}"),
        title: title.into(),
        description: None,
        url: "https://x.example".into(),
        source: "t".into(),
        engagement,
        created_at: Utc::now(),
        score: None,
    }
}

#[tokio::test]
async fn identical_inputs_give_identical_scores() {
    let scorer = CompositeScorer::standard(Arc::new(Const("novelty", 7.3)), Arc::new(Const("salience", 3.0)));
    let it = item("Goat mayor", Some(1234.0));
    let first = scorer.score(&it).await.unwrap();
    for _ in 0..5 {
        assert_eq!(scorer.score(&it).await.unwrap(), first);
    }
    // 7.3*0.5 + 3*0.3 + 1.234*0.2
    assert!((first - (3.65 + 0.9 + 0.2468)).abs() < 1e-9);
}

#[tokio::test]
async fn one_missing_signal_is_replaced_not_fatal() {
    let scorer = CompositeScorer::standard(Arc::new(Down("novelty")), Arc::new(Const("salience", 2.0)));
    let b = scorer.score_detailed(&item("x", Some(2000.0))).await.unwrap();
    assert!(b.signals[0].defaulted);
    assert_eq!(b.signals[0].value, NOVELTY_NEUTRAL);
    assert!((b.score - (2.5 + 0.6 + 0.4)).abs() < 1e-9);
}

#[tokio::test]
async fn raw_engagement_cannot_dominate() {
    let scorer = CompositeScorer::standard(Arc::new(Const("novelty", 0.0)), Arc::new(Const("salience", 0.0)));
    let s = scorer.score(&item("viral", Some(5_000_000.0))).await.unwrap();
    // engagement clamps at 10 before its 0.2 weight
    assert!((s - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn total_is_clamped_into_range() {
    let hi = CompositeScorer::standard(Arc::new(Const("novelty", 10.0)), Arc::new(Const("salience", 25.0)));
    assert_eq!(hi.score(&item("x", Some(1e9))).await.unwrap(), SCORE_MAX);
    let lo = CompositeScorer::standard(Arc::new(Const("novelty", -4.0)), Arc::new(Const("salience", -9.0)));
    assert_eq!(lo.score(&item("x", None)).await.unwrap(), SCORE_MIN);
}

#[tokio::test]
async fn offline_signals_score_without_network() {
    // salience has no key: it fails before any request and falls back to 0
    let salience = EntitySalienceSignal::new(
        "",
        Arc::new(RateLimiters::new(PoolLimits::default())),
        std::time::Duration::from_secs(1),
    );
    let scorer = CompositeScorer::standard(Arc::new(KeywordNoveltySignal), Arc::new(salience));
    let b = scorer
        .score_detailed(&item("Bizarre and weird goat parade", Some(5000.0)))
        .await
        .unwrap();
    // novelty 2 keywords → 4.0; engagement 5.0
    assert!((b.score - (4.0 * 0.5 + 5.0 * 0.2)).abs() < 1e-9);
    assert!(b.signals[1].defaulted);
}

#[tokio::test]
async fn batch_scoring_keeps_input_order_and_fills_scores() {
    let scorer = CompositeScorer::standard(Arc::new(KeywordNoveltySignal), Arc::new(Const("salience", 1.0)));
    let items = vec![item("first odd", None), item("second", None), item("third strange", None)];
    let (scored, dropped) = scorer.score_all(items, 2).await;
    assert!(dropped.is_empty());
    let titles: Vec<_> = scored.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["first odd", "second", "third strange"]);
    assert!(scored.iter().all(|i| i.score.is_some()));
}
