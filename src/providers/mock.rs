//! Deterministic provider for tests and `AI_TEST_MODE=mock` runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Artifact, ArtifactBody, Capability, GenerationProvider, GenerationRequest};
use crate::error::ProviderError;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with this text (text) or a `mock://` URL (everything else).
    Reply(String),
    /// Echo the prompt back, prefixed.
    Echo,
    Fail(String),
    RateLimited,
    /// Sleep before answering; used to exercise call timeouts.
    Slow(Duration),
}

pub struct MockProvider {
    name: String,
    pool: String,
    capabilities: Vec<Capability>,
    behavior: MockBehavior,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        let name = name.into();
        Self {
            pool: name.clone(),
            name,
            capabilities: vec![
                Capability::Text,
                Capability::Image,
                Capability::Voice,
                Capability::Video,
            ],
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Reply(text.into()))
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Fail(reason.into()))
    }

    pub fn in_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = pool.into();
        self
    }

    pub fn only(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.to_vec();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn artifact(&self, capability: Capability, text: String) -> Artifact {
        let body = match capability {
            Capability::Text => ArtifactBody::Text { text },
            _ => ArtifactBody::Url {
                url: format!("mock://{}/{}", self.name, capability),
            },
        };
        Artifact {
            capability,
            provider: self.name.clone(),
            body,
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    async fn generate(
        &self,
        capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Reply(text) => Ok(self.artifact(capability, text.clone())),
            MockBehavior::Echo => Ok(self.artifact(capability, format!("mock: {}", request.prompt))),
            MockBehavior::Fail(reason) => Err(ProviderError::InvalidResponse(reason.clone())),
            MockBehavior::RateLimited => Err(ProviderError::RateLimited("mock quota".into())),
            MockBehavior::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(self.artifact(capability, "late".into()))
            }
        }
    }
}
