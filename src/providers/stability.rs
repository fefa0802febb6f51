//! Stability AI text-to-image adapter (image).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    check_status, decode, http_client, require_key, Artifact, ArtifactBody, Capability, GenerationProvider,
    GenerationRequest,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

pub struct StabilityProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    engine_id: String,
    pool: String,
}

impl StabilityProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            engine_id: cfg
                .model
                .clone()
                .unwrap_or_else(|| "stable-diffusion-xl-1024-v1-0".to_string()),
            pool: cfg.pool.clone().unwrap_or_else(|| "stability".to_string()),
        }
    }
}

#[derive(Serialize)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: f32,
}

#[derive(Serialize)]
struct Req<'a> {
    text_prompts: Vec<TextPrompt<'a>>,
    cfg_scale: u32,
    height: u32,
    width: u32,
    steps: u32,
    samples: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    artifacts: Vec<RespArtifact>,
}

#[derive(Deserialize)]
struct RespArtifact {
    base64: String,
}

#[async_trait]
impl GenerationProvider for StabilityProvider {
    fn name(&self) -> &str {
        "stability"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        capability == Capability::Image
    }

    async fn generate(
        &self,
        _capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        require_key("stability", &self.api_key)?;

        let mut text_prompts = vec![TextPrompt {
            text: &request.prompt,
            weight: 1.0,
        }];
        if let Some(neg) = request.negative_prompt.as_deref().filter(|n| !n.is_empty()) {
            text_prompts.push(TextPrompt {
                text: neg,
                weight: -1.0,
            });
        }
        let req = Req {
            text_prompts,
            cfg_scale: 7,
            height: 1024,
            width: 1024,
            steps: 30,
            samples: 1,
        };

        let resp = self
            .http
            .post(format!(
                "{}/v1/generation/{}/text-to-image",
                self.base_url, self.engine_id
            ))
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(&body)
    }
}

impl StabilityProvider {
    /// First returned sample, inlined as PNG.
    pub fn parse_response(body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("stability", body)?;
        let first = body
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("stability: no artifacts".into()))?;
        Ok(Artifact {
            capability: Capability::Image,
            provider: "stability".into(),
            body: ArtifactBody::Inline {
                mime: "image/png".into(),
                base64: first.base64,
            },
        })
    }
}
