//! Build providers by name from configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use super::anthropic::AnthropicProvider;
use super::elevenlabs::ElevenLabsProvider;
use super::gemini::GeminiProvider;
use super::mock::{MockBehavior, MockProvider};
use super::openai::OpenAiProvider;
use super::pexels::PexelsProvider;
use super::runway::RunwayProvider;
use super::stability::StabilityProvider;
use super::GenerationProvider;
use crate::config::ProviderConfig;

pub type DynProvider = Arc<dyn GenerationProvider>;

/// Known adapter names.
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "gemini",
    "elevenlabs",
    "stability",
    "runway",
    "pexels",
];

/// Instantiate one adapter by name.
pub fn build_provider(name: &str, cfg: &ProviderConfig, timeout: Duration) -> Result<DynProvider> {
    let p: DynProvider = match name {
        "openai" => Arc::new(OpenAiProvider::new(cfg, timeout)),
        "anthropic" | "claude" => Arc::new(AnthropicProvider::new(cfg, timeout)),
        "gemini" => Arc::new(GeminiProvider::new(cfg, timeout)),
        "elevenlabs" => Arc::new(ElevenLabsProvider::new(cfg, timeout)),
        "stability" => Arc::new(StabilityProvider::new(cfg, timeout)),
        "runway" => Arc::new(RunwayProvider::new(cfg, timeout)),
        "pexels" => Arc::new(PexelsProvider::new(cfg, timeout)),
        other => bail!("unknown provider '{other}'"),
    };
    Ok(p)
}

/// Named providers, shared by every cascade that lists them.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, DynProvider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured provider.
    /// With `AI_TEST_MODE=mock`, every name maps to an echoing mock instead.
    pub fn from_config(configs: &HashMap<String, ProviderConfig>, timeout: Duration) -> Result<Self> {
        let mock_mode = std::env::var("AI_TEST_MODE")
            .map(|v| v == "mock")
            .unwrap_or(false);

        let mut reg = Self::new();
        for (name, cfg) in configs {
            let provider: DynProvider = if mock_mode {
                Arc::new(MockProvider::new(name.clone(), MockBehavior::Echo))
            } else {
                build_provider(name, cfg, timeout)?
            };
            reg.insert(name.clone(), provider);
        }
        Ok(reg)
    }

    pub fn insert(&mut self, name: impl Into<String>, provider: DynProvider) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<DynProvider> {
        self.providers.get(name).cloned()
    }

    /// Resolve an ordered list of names; unknown names are skipped with a warning.
    pub fn resolve(&self, names: &[String]) -> Vec<DynProvider> {
        names
            .iter()
            .filter_map(|n| {
                let p = self.get(n);
                if p.is_none() {
                    tracing::warn!(provider = %n, "cascade lists an unconfigured provider; skipping");
                }
                p
            })
            .collect()
    }
}
