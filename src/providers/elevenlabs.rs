//! ElevenLabs text-to-speech adapter (voice).

use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use std::time::Duration;

use super::{
    check_status, http_client, require_key, Artifact, ArtifactBody, Capability, GenerationProvider,
    GenerationRequest,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

pub struct ElevenLabsProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    voice_id: String,
    pool: String,
}

impl ElevenLabsProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| "eleven_multilingual_v2".to_string()),
            voice_id: cfg.voice_id.clone().unwrap_or_default(),
            pool: cfg.pool.clone().unwrap_or_else(|| "elevenlabs".to_string()),
        }
    }
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct Req<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[async_trait]
impl GenerationProvider for ElevenLabsProvider {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        capability == Capability::Voice
    }

    async fn generate(
        &self,
        _capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        require_key("elevenlabs", &self.api_key)?;
        if self.voice_id.is_empty() {
            return Err(ProviderError::NotConfigured("elevenlabs: missing voice_id".into()));
        }

        let req = Req {
            text: &request.prompt,
            model_id: &self.model,
            voice_settings: VoiceSettings {
                stability: 0.75,
                similarity_boost: 0.75,
            },
        };
        let resp = self
            .http
            .post(format!("{}/text-to-speech/{}", self.base_url, self.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&req)
            .send()
            .await?;
        let bytes = check_status(resp).await?.bytes().await?;
        Self::audio_artifact(&bytes)
    }
}

impl ElevenLabsProvider {
    /// Raw MPEG bytes inlined as base64.
    pub fn audio_artifact(bytes: &[u8]) -> Result<Artifact, ProviderError> {
        if bytes.is_empty() {
            return Err(ProviderError::InvalidResponse("elevenlabs: empty audio".into()));
        }
        Ok(Artifact {
            capability: Capability::Voice,
            provider: "elevenlabs".into(),
            body: ArtifactBody::Inline {
                mime: "audio/mpeg".into(),
                base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            },
        })
    }
}
