//! Runway inference adapter (image, video).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    check_status, decode, http_client, require_key, Artifact, ArtifactBody, Capability, GenerationProvider,
    GenerationRequest,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.runwayml.com/v1";

pub struct RunwayProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    pool: String,
}

impl RunwayProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| "stable-diffusion-v1".to_string()),
            pool: cfg.pool.clone().unwrap_or_else(|| "runway".to_string()),
        }
    }
}

#[derive(Serialize)]
struct Req<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
    model: &'a str,
    height: u32,
    width: u32,
    num_outputs: u32,
    steps: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    video_url: Option<String>,
}

#[async_trait]
impl GenerationProvider for RunwayProvider {
    fn name(&self) -> &str {
        "runway"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::Image | Capability::Video)
    }

    async fn generate(
        &self,
        capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        require_key("runway", &self.api_key)?;

        let req = Req {
            prompt: &request.prompt,
            negative_prompt: request.negative_prompt.as_deref(),
            model: &self.model,
            height: 1024,
            width: 1024,
            num_outputs: 1,
            steps: 30,
        };
        let resp = self
            .http
            .post(format!("{}/inference", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(capability, &body)
    }
}

impl RunwayProvider {
    /// Video requests read `video_url`; everything else the first image.
    pub fn parse_response(capability: Capability, body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("runway", body)?;
        let artifact_body = match capability {
            Capability::Video => body
                .video_url
                .map(|url| ArtifactBody::Url { url })
                .ok_or_else(|| ProviderError::InvalidResponse("runway: no video_url".into()))?,
            _ => body
                .images
                .into_iter()
                .next()
                .map(|b64| ArtifactBody::Inline {
                    mime: "image/png".into(),
                    base64: b64,
                })
                .ok_or_else(|| ProviderError::InvalidResponse("runway: no images".into()))?,
        };
        Ok(Artifact {
            capability,
            provider: "runway".into(),
            body: artifact_body,
        })
    }
}
