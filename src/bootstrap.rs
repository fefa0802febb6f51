// src/bootstrap.rs
//! Wire configuration into a runnable pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregator::SourceAggregator;
use crate::cascade::ProviderCascade;
use crate::config::{AppConfig, NoveltyMode, StoreKind};
use crate::generate::ArtifactGenerator;
use crate::notify::WebhookNotifier;
use crate::pipeline::Pipeline;
use crate::providers::registry::ProviderRegistry;
use crate::providers::Capability;
use crate::rate_limit::RateLimiters;
use crate::scoring::signals::{EntitySalienceSignal, KeywordNoveltySignal, LlmNoveltySignal};
use crate::scoring::{CompositeScorer, DynSignal};
use crate::sources::registry::{build_sources, SourceKeys};
use crate::store::{FileRunStore, MemoryRunStore, RunStore};

pub struct AppRuntime {
    pub cfg: AppConfig,
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<dyn RunStore>,
}

impl AppRuntime {
    /// `AppConfig::load()` followed by `from_config`.
    pub fn from_env() -> Result<Self> {
        let cfg = AppConfig::load().context("loading pipeline config")?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        let timeout = cfg.request_timeout();

        let mut limiters = RateLimiters::new(cfg.rate_limit.default_limits());
        for (pool, limits) in &cfg.rate_limit.pools {
            limiters = limiters.with_pool(pool.clone(), *limits);
        }
        let limiters = Arc::new(limiters);

        let registry = ProviderRegistry::from_config(&cfg.providers, timeout)?;
        let cascade = |cap: Capability, names: &[String]| {
            ProviderCascade::new(cap, registry.resolve(names), limiters.clone()).with_call_timeout(timeout)
        };
        let text = cascade(Capability::Text, &cfg.cascades.text);
        let voice = cascade(Capability::Voice, &cfg.cascades.voice);
        let image = cascade(Capability::Image, &cfg.cascades.image);
        let video = cascade(Capability::Video, &cfg.cascades.video);

        let novelty: DynSignal = match cfg.scoring.novelty {
            NoveltyMode::Llm if !text.is_empty() => Arc::new(LlmNoveltySignal::new(text.clone())),
            NoveltyMode::Llm => {
                warn!("no text providers configured; novelty falls back to keyword heuristic");
                Arc::new(KeywordNoveltySignal)
            }
            NoveltyMode::Keyword => Arc::new(KeywordNoveltySignal),
        };
        let salience: DynSignal = Arc::new(EntitySalienceSignal::new(
            cfg.scoring.google_api_key.clone(),
            limiters.clone(),
            timeout,
        ));
        let scorer = CompositeScorer::standard(novelty, salience);

        let sources = build_sources(&cfg.sources, &SourceKeys::from_env(), cfg.aggregator.fetch_timeout())?;
        let generator = ArtifactGenerator::new(text, voice, image, video).with_style(cfg.generation.style);

        let store: Arc<dyn RunStore> = match cfg.store.kind {
            StoreKind::Memory => Arc::new(MemoryRunStore::with_capacity(cfg.store.capacity)),
            StoreKind::File => Arc::new(FileRunStore::new(cfg.store.dir.clone())),
        };

        let mut pipeline = Pipeline::new(sources, SourceAggregator::new(cfg.aggregator), scorer, generator)
            .with_scoring_concurrency(cfg.max_parallel_requests)
            .with_store(store.clone());
        if let Some(n) = WebhookNotifier::from_config(&cfg.notify) {
            pipeline = pipeline.with_notifier(n);
        }

        // Safe diagnostics: counts only, never keys
        info!(
            sources = cfg.sources.len(),
            providers = cfg.providers.len(),
            text_cascade = ?cfg.cascades.text,
            store = ?cfg.store.kind,
            "pipeline runtime built"
        );

        Ok(Self {
            cfg,
            pipeline: Arc::new(pipeline),
            store,
        })
    }
}
