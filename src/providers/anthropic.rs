//! Anthropic Messages adapter (text).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{check_status, decode, http_client, require_key, Artifact, Capability, GenerationProvider, GenerationRequest};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    pool: String,
}

impl AnthropicProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string()),
            max_tokens: cfg.max_tokens.unwrap_or(4096),
            temperature: cfg.temperature.unwrap_or(0.7),
            pool: cfg.pool.clone().unwrap_or_else(|| "anthropic".to_string()),
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
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Msg<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
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
        require_key("anthropic", &self.api_key)?;

        let req = Req {
            model: &self.model,
            system: request.system.as_deref(),
            messages: vec![Msg {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(&body)
    }
}

impl AnthropicProvider {
    /// Text blocks of the message joined; tool-use blocks carry no text.
    pub fn parse_response(body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("anthropic", body)?;
        let text: String = body
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("anthropic: empty completion".into()));
        }
        Ok(Artifact::text("anthropic", text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_blocks_are_joined() {
        let body = r#"{"id":"msg_1","type":"message","role":"assistant","content":[
            {"type":"text","text":"Residents of Dullsville, "},
            {"type":"tool_use","id":"t1","name":"noop","input":{}},
            {"type":"text","text":"hold onto your hats!"}
        ],"stop_reason":"end_turn"}"#;
        let a = AnthropicProvider::parse_response(body).unwrap();
        assert_eq!(a.as_text(), Some("Residents of Dullsville, hold onto your hats!"));
        assert_eq!(a.capability, Capability::Text);
    }

    #[test]
    fn no_text_blocks_is_invalid() {
        let e = AnthropicProvider::parse_response(r#"{"content":[]}"#).unwrap_err();
        assert!(matches!(e, ProviderError::InvalidResponse(_)));
    }
}
