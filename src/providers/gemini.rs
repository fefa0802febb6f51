//! Google Gemini `generateContent` adapter (text).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, decode, http_client, require_key, Artifact, Capability, GenerationProvider, GenerationRequest};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    pool: String,
}

impl GeminiProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: cfg.model.clone().unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            max_tokens: cfg.max_tokens.unwrap_or(8192),
            temperature: cfg.temperature.unwrap_or(0.7),
            pool: cfg.pool.clone().unwrap_or_else(|| "gemini".to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: RespContent,
}

#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        capability == Capability::Text
    }

    async fn generate(
        &self,
        _capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        require_key("gemini", &self.api_key)?;

        let req = Req {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system.as_deref().map(|s| Content {
                parts: vec![Part { text: s }],
            }),
            generation_config: GenConfig {
                temperature: self.temperature,
                max_output_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            },
        };

        let resp = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(&body)
    }
}

impl GeminiProvider {
    pub fn parse_response(body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("gemini", body)?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("gemini: no candidates".into()));
        }
        Ok(Artifact::text("gemini", text))
    }
}
