// src/config/mod.rs
//! Application configuration.
//!
//! Lookup order:
//! 1) $PIPELINE_CONFIG_PATH
//! 2) config/pipeline.toml
//! 3) built-in defaults
//!
//! Then `RATE_LIMIT_REQUESTS`, `RATE_LIMIT_PERIOD`, `MAX_PARALLEL_REQUESTS`
//! and `REQUEST_TIMEOUT` override the file. API keys written as `"ENV"`
//! are read from the provider's environment variable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::aggregator::AggregatorConfig;
use crate::generate::ScriptStyle;
use crate::notify::NotifyConfig;
use crate::providers::registry::KNOWN_PROVIDERS;
use crate::rate_limit::PoolLimits;
use crate::sources::registry::{default_specs, SourceSpec};

pub const ENV_CONFIG_PATH: &str = "PIPELINE_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

/// Placeholder meaning "read the key from the environment".
const ENV_MARKER: &str = "ENV";

/// Environment variable holding each provider's key.
pub fn key_env_var(provider: &str) -> Option<&'static str> {
    Some(match provider {
        "openai" => "OPENAI_API_KEY",
        "anthropic" | "claude" => "ANTHROPIC_API_KEY",
        "gemini" | "google" => "GOOGLE_API_KEY",
        "elevenlabs" => "ELEVENLABS_API_KEY",
        "stability" => "STABILITY_API_KEY",
        "runway" => "RUNWAY_API_KEY",
        "pexels" => "PEXELS_API_KEY",
        _ => return None,
    })
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Literal key, or "ENV".
    pub api_key: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Rate-limit pool; defaults to the provider name.
    pub pool: Option<String>,
    pub base_url: Option<String>,
    /// ElevenLabs only.
    pub voice_id: Option<String>,
}

impl ProviderConfig {
    fn from_env_marker() -> Self {
        Self {
            api_key: ENV_MARKER.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Applies to every pool without its own entry.
    pub max_requests: usize,
    pub period_secs: u64,
    pub pools: HashMap<String, PoolLimits>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let d = PoolLimits::default();
        Self {
            max_requests: d.max_requests,
            period_secs: d.period_secs,
            pools: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    pub fn default_limits(&self) -> PoolLimits {
        PoolLimits {
            max_requests: self.max_requests,
            period_secs: self.period_secs,
        }
    }
}

/// Provider names per capability, in fallback order.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CascadesConfig {
    pub text: Vec<String>,
    pub voice: Vec<String>,
    pub image: Vec<String>,
    pub video: Vec<String>,
}

impl Default for CascadesConfig {
    fn default() -> Self {
        let v = |names: &[&str]| -> Vec<String> { names.iter().map(|s| s.to_string()).collect() };
        Self {
            text: v(&["openai", "anthropic", "gemini"]),
            voice: v(&["elevenlabs"]),
            image: v(&["stability", "runway"]),
            video: v(&["pexels", "runway"]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoveltyMode {
    /// Ask the text cascade.
    #[default]
    Llm,
    /// Count weird keywords in the title.
    Keyword,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub novelty: NoveltyMode,
    /// Google Natural Language key for entity salience; "ENV" reads GOOGLE_API_KEY.
    pub google_api_key: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            novelty: NoveltyMode::Llm,
            google_api_key: ENV_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub style: ScriptStyle,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub dir: PathBuf,
    /// Reports kept by the memory store.
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            dir: PathBuf::from("data/runs"),
            capacity: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 86_400,
            run_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Scoring concurrency.
    pub max_parallel_requests: usize,
    /// Per provider call.
    pub request_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
    pub aggregator: AggregatorConfig,
    pub sources: Vec<SourceSpec>,
    pub providers: HashMap<String, ProviderConfig>,
    pub cascades: CascadesConfig,
    pub scoring: ScoringConfig,
    pub generation: GenerationConfig,
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    pub notify: NotifyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_parallel_requests: 10,
            request_timeout_secs: 30,
            rate_limit: RateLimitConfig::default(),
            aggregator: AggregatorConfig::default(),
            sources: default_specs(),
            providers: KNOWN_PROVIDERS
                .iter()
                .map(|n| (n.to_string(), ProviderConfig::from_env_marker()))
                .collect(),
            cascades: CascadesConfig::default(),
            scoring: ScoringConfig::default(),
            generation: GenerationConfig::default(),
            store: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the config path, read it, apply env overrides and keys.
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::read_file(&p)?,
            None => {
                tracing::info!("no pipeline config file; using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        cfg.resolve_keys();
        cfg.validate();
        Ok(cfg)
    }

    pub fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<usize>("RATE_LIMIT_REQUESTS") {
            self.rate_limit.max_requests = v;
        }
        if let Some(v) = parse_env::<u64>("RATE_LIMIT_PERIOD") {
            self.rate_limit.period_secs = v;
        }
        if let Some(v) = parse_env::<usize>("MAX_PARALLEL_REQUESTS") {
            self.max_parallel_requests = v;
        }
        if let Some(v) = parse_env::<u64>("REQUEST_TIMEOUT") {
            self.request_timeout_secs = v;
        }
    }

    /// Replace "ENV" markers with environment values. A missing variable
    /// leaves the key empty; the adapter reports `NotConfigured` when called.
    pub fn resolve_keys(&mut self) {
        for (name, p) in self.providers.iter_mut() {
            if !is_env_marker(&p.api_key) {
                continue;
            }
            p.api_key = match key_env_var(name) {
                Some(var) => env::var(var).unwrap_or_default(),
                None => {
                    tracing::warn!(provider = %name, "no key variable known for provider");
                    String::new()
                }
            };
            if name == "elevenlabs" && p.voice_id.is_none() {
                p.voice_id = env::var("ELEVENLABS_VOICE_ID").ok();
            }
        }
        if is_env_marker(&self.scoring.google_api_key) {
            self.scoring.google_api_key = env::var("GOOGLE_API_KEY").unwrap_or_default();
        }
    }

    /// Clamp nonsensical values and warn about dangling names.
    pub fn validate(&mut self) {
        if self.max_parallel_requests == 0 {
            tracing::warn!("max_parallel_requests = 0; using 1");
            self.max_parallel_requests = 1;
        }
        if self.rate_limit.max_requests == 0 {
            tracing::warn!("rate_limit.max_requests = 0; using 1");
            self.rate_limit.max_requests = 1;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = 30;
        }
        for name in self.providers.keys() {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                tracing::warn!(provider = %name, "unknown provider in config");
            }
        }
        let c = &self.cascades;
        for name in c.text.iter().chain(&c.voice).chain(&c.image).chain(&c.video) {
            if !self.providers.contains_key(name) {
                tracing::warn!(provider = %name, "cascade names a provider with no [providers] entry");
            }
        }
    }
}

fn is_env_marker(key: &str) -> bool {
    key.trim().eq_ignore_ascii_case(ENV_MARKER)
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display()));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}
