// tests/pipeline_e2e.rs
//
// Whole runs over fixture sources and mock providers: partial source
// failure, ranking, selection, artifact failure isolation, empty days,
// cancellation and persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use weird_news_pipeline::aggregator::{AggregatorConfig, SourceAggregator};
use weird_news_pipeline::cascade::ProviderCascade;
use weird_news_pipeline::error::ErrorKind;
use weird_news_pipeline::generate::ArtifactGenerator;
use weird_news_pipeline::model::{CandidateItem, RawItem};
use weird_news_pipeline::providers::mock::{MockBehavior, MockProvider};
use weird_news_pipeline::providers::registry::DynProvider;
use weird_news_pipeline::providers::Capability;
use weird_news_pipeline::rate_limit::{PoolLimits, RateLimiters};
use weird_news_pipeline::scoring::{CompositeScorer, SignalExtractor, WeightedSignal};
use weird_news_pipeline::sources::fixture::FixtureSource;
use weird_news_pipeline::sources::registry::DynSource;
use weird_news_pipeline::sources::Source;
use weird_news_pipeline::store::{MemoryRunStore, RunStore};
use weird_news_pipeline::{CancelHandle, Pipeline, PipelineState, RunStatus};

/// Scores by title lookup; unknown titles fail.
struct ByTitle(HashMap<&'static str, f64>);

#[async_trait]
impl SignalExtractor for ByTitle {
    fn name(&self) -> &str {
        "novelty"
    }
    async fn evaluate(&self, item: &CandidateItem) -> anyhow::Result<f64> {
        self.0
            .get(item.title.as_str())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no judgment for {}", item.title))
    }
}

struct Down;

#[async_trait]
impl Source for Down {
    fn name(&self) -> &str {
        "twitter/recent"
    }
    async fn fetch(&self) -> anyhow::Result<Vec<RawItem>> {
        anyhow::bail!("401 Unauthorized")
    }
}

fn raw(source: &str, id: &str, title: &str) -> RawItem {
    RawItem {
        native_id: Some(id.into()),
        title: title.into(),
        description: Some("Details at eleven.".into()),
        url: format!("https://{id}.example"),
        source: source.into(),
        engagement: Some(100.0),
        created_at: Utc.with_ymd_and_hms(2026, 10, 2, 7, 0, 0).unwrap(),
    }
}

fn title_scorer() -> CompositeScorer {
    CompositeScorer::new(vec![WeightedSignal {
        extractor: Arc::new(ByTitle(HashMap::from([
            ("Goose elected to city council", 7.2),
            ("Man returns library book 84 years late", 4.1),
        ]))),
        weight: 1.0,
        neutral: 5.0,
        bounds: Some((0.0, 10.0)),
    }])
}

fn cascade(cap: Capability, providers: Vec<DynProvider>) -> ProviderCascade {
    ProviderCascade::new(cap, providers, Arc::new(RateLimiters::new(PoolLimits::default())))
}

fn failing_generator() -> ArtifactGenerator {
    let fail = |n: &str| -> DynProvider { Arc::new(MockProvider::failing(n, "service unavailable")) };
    ArtifactGenerator::new(
        cascade(Capability::Text, vec![fail("openai"), fail("anthropic"), fail("gemini")]),
        cascade(Capability::Voice, vec![fail("elevenlabs")]),
        cascade(Capability::Image, vec![fail("stability"), fail("runway")]),
        cascade(Capability::Video, vec![fail("pexels")]),
    )
}

fn working_generator() -> ArtifactGenerator {
    let ok = |n: &str| -> DynProvider { Arc::new(MockProvider::new(n, MockBehavior::Echo)) };
    ArtifactGenerator::new(
        cascade(Capability::Text, vec![ok("openai")]),
        cascade(Capability::Voice, vec![ok("elevenlabs")]),
        cascade(Capability::Image, vec![ok("stability")]),
        cascade(Capability::Video, vec![ok("pexels")]),
    )
}

fn three_sources_one_down() -> Vec<DynSource> {
    vec![
        Arc::new(FixtureSource::new(
            "reddit/WeirdNews",
            vec![raw("reddit/WeirdNews", "g1", "Goose elected to city council")],
        )),
        Arc::new(Down),
        Arc::new(FixtureSource::new(
            "rss/offbeat",
            vec![raw("rss/offbeat", "b7", "Man returns library book 84 years late")],
        )),
    ]
}

fn pipeline(sources: Vec<DynSource>, generator: ArtifactGenerator) -> Pipeline {
    Pipeline::new(
        sources,
        SourceAggregator::new(AggregatorConfig::default()),
        title_scorer(),
        generator,
    )
}

#[tokio::test(start_paused = true)]
async fn ranking_survives_total_generation_failure() {
    let report = pipeline(three_sources_one_down(), failing_generator()).run().await;

    let scores: Vec<_> = report.ranked_items.iter().map(|i| i.score.unwrap()).collect();
    assert_eq!(scores, vec![7.2, 4.1]);
    assert_eq!(
        report.selected.as_ref().map(|i| i.title.as_str()),
        Some("Goose elected to city council")
    );

    assert!(report.artifact.is_none());
    let gen_err = report
        .errors
        .iter()
        .find(|e| e.kind == ErrorKind::ArtifactGenerationFailed)
        .expect("artifact failure is reported");
    assert_eq!(gen_err.stage, "generating_artifact");
    assert_eq!(gen_err.details.len(), 3, "one reason per text provider");
    assert!(gen_err.details[0].starts_with("openai:"));

    assert_eq!(report.source_errors.len(), 1);
    assert_eq!(report.source_errors[0].source_name, "twitter/recent");

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.status, RunStatus::Partial);
}

#[tokio::test(start_paused = true)]
async fn healthy_run_completes_and_is_persisted() {
    let store = Arc::new(MemoryRunStore::default());
    let sources: Vec<DynSource> = vec![Arc::new(FixtureSource::new(
        "reddit/WeirdNews",
        vec![
            raw("reddit/WeirdNews", "g1", "Goose elected to city council"),
            raw("reddit/WeirdNews", "b7", "Man returns library book 84 years late"),
        ],
    ))];
    let p = pipeline(sources, working_generator()).with_store(store.clone());

    let report = p.run().await;
    assert_eq!(report.status, RunStatus::Completed, "errors: {:?}", report.errors);
    let reel = report.artifact.as_ref().expect("newsreel");
    assert_eq!(reel.item_id, "reddit/WeirdNews:g1");
    assert!(reel.narration.is_some());
    assert!(reel.visual.is_some());
    assert!(reel.footage.is_some());
    assert_eq!(p.state(), PipelineState::Done);

    let stored = store.latest().await.unwrap().expect("report stored");
    assert_eq!(stored.run_id, report.run_id);
}

#[tokio::test(start_paused = true)]
async fn no_news_is_an_empty_success() {
    let sources: Vec<DynSource> = vec![Arc::new(Down), Arc::new(Down)];
    let report = pipeline(sources, failing_generator()).run().await;

    assert_eq!(report.status, RunStatus::Empty);
    assert_eq!(report.state, PipelineState::Done);
    assert!(report.ranked_items.is_empty());
    assert!(report.selected.is_none());
    assert!(report.errors.iter().any(|e| e.kind == ErrorKind::AllSourcesFailed));
    assert_eq!(report.source_errors.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unscorable_items_are_dropped_not_fatal() {
    let sources: Vec<DynSource> = vec![Arc::new(FixtureSource::new(
        "rss/offbeat",
        vec![
            raw("rss/offbeat", "g1", "Goose elected to city council"),
            raw("rss/offbeat", "zz", "Unjudgeable headline"),
        ],
    ))];
    let report = pipeline(sources, working_generator()).run().await;

    assert_eq!(report.ranked_items.len(), 1);
    assert!(report.errors.iter().any(|e| e.kind == ErrorKind::ScoringFailed));
    assert_eq!(report.status, RunStatus::Partial);
}

#[tokio::test(start_paused = true)]
async fn every_item_unscorable_fails_the_run() {
    let sources: Vec<DynSource> = vec![Arc::new(FixtureSource::new(
        "rss/offbeat",
        vec![raw("rss/offbeat", "zz", "Unjudgeable headline")],
    ))];
    let report = pipeline(sources, working_generator()).run().await;
    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.status, RunStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_stops_at_the_next_boundary() {
    let cancel = CancelHandle::new();
    cancel.cancel();
    let report = pipeline(three_sources_one_down(), working_generator())
        .run_with_cancel(&cancel)
        .await;

    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.errors.iter().any(|e| e.kind == ErrorKind::Cancelled));
    assert!(report.artifact.is_none());
}

/// Judges every title 6.0 and pulls the plug while doing so.
struct CancelsWhileScoring(CancelHandle);

#[async_trait]
impl SignalExtractor for CancelsWhileScoring {
    fn name(&self) -> &str {
        "novelty"
    }
    async fn evaluate(&self, _item: &CandidateItem) -> anyhow::Result<f64> {
        self.0.cancel();
        Ok(6.0)
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_after_scoring_keeps_the_ranking() {
    let cancel = CancelHandle::new();
    let scorer = CompositeScorer::new(vec![WeightedSignal {
        extractor: Arc::new(CancelsWhileScoring(cancel.clone())),
        weight: 1.0,
        neutral: 5.0,
        bounds: Some((0.0, 10.0)),
    }]);
    let p = Pipeline::new(
        three_sources_one_down(),
        SourceAggregator::new(AggregatorConfig::default()),
        scorer,
        working_generator(),
    );

    let report = p.run_with_cancel(&cancel).await;

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(report.status, RunStatus::Partial);
    assert_eq!(report.ranked_items.len(), 2);
    assert!(report.selected.is_some());
    assert!(report.artifact.is_none(), "generation is skipped");
    let c = report
        .errors
        .iter()
        .find(|e| e.kind == ErrorKind::Cancelled)
        .expect("cancel recorded");
    assert_eq!(c.stage, "selecting");
}
