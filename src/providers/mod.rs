// src/providers/mod.rs
//! Generation providers: one trait, many interchangeable backends.
//!
//! A provider declares the capabilities it serves and the rate-limit pool
//! it draws from. Wire payloads stay inside each adapter.

pub mod anthropic;
pub mod elevenlabs;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod pexels;
pub mod registry;
pub mod runway;
pub mod stability;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ProviderError;

/// What a provider can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Image,
    Voice,
    Video,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Text => "text",
            Capability::Image => "image",
            Capability::Voice => "voice",
            Capability::Video => "video",
        };
        f.write_str(s)
    }
}

/// Input to one generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Optional system instruction for text providers.
    pub system: Option<String>,
    /// Things to avoid, for image/video providers.
    pub negative_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_negative(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt = Some(negative.into());
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

/// Produced content or a reference to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactBody {
    Text { text: String },
    Url { url: String },
    Inline { mime: String, base64: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artifact {
    pub capability: Capability,
    pub provider: String,
    pub body: ArtifactBody,
}

impl Artifact {
    pub fn text(provider: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            capability: Capability::Text,
            provider: provider.into(),
            body: ArtifactBody::Text { text: text.into() },
        }
    }

    /// The text content, if this is a text artifact.
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            ArtifactBody::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name for attempt logs and metrics.
    fn name(&self) -> &str;
    /// Rate-limit pool this provider draws from.
    fn pool(&self) -> &str {
        self.name()
    }
    fn supports(&self, capability: Capability) -> bool;
    async fn generate(
        &self,
        capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError>;
}

/// Shared HTTP client for provider adapters.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("weird-news-pipeline/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Turn a non-success response into a `ProviderError`, pass successes through.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status, truncate(&body, 300)))
}

/// Decode a success body; a shape mismatch is the provider's fault.
pub(crate) fn decode<T: DeserializeOwned>(provider: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::InvalidResponse(format!("{provider}: {e}")))
}

pub(crate) fn require_key(name: &str, key: &str) -> Result<(), ProviderError> {
    if key.trim().is_empty() {
        return Err(ProviderError::NotConfigured(format!("{name}: missing API key")));
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
