//! OpenAI Chat Completions adapter (text).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, decode, http_client, require_key, Artifact, Capability, GenerationProvider, GenerationRequest};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    pool: String,
}

impl OpenAiProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: cfg.model.clone().unwrap_or_else(|| "gpt-4".to_string()),
            max_tokens: cfg.max_tokens.unwrap_or(4096),
            temperature: cfg.temperature.unwrap_or(0.7),
            pool: cfg.pool.clone().unwrap_or_else(|| "openai".to_string()),
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        require_key("openai", &self.api_key)?;

        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = request.system.as_deref() {
            messages.push(Msg {
                role: "system",
                content: sys,
            });
        }
        messages.push(Msg {
            role: "user",
            content: &request.prompt,
        });
        let req = Req {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(&body)
    }
}

impl OpenAiProvider {
    /// First choice's message content as a text artifact.
    pub fn parse_response(body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("openai", body)?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("openai: empty completion".into()));
        }
        Ok(Artifact::text("openai", text))
    }
}
