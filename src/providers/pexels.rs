//! Pexels stock-footage search adapter (video). Returns the download link
//! of the first clip matching the prompt.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{
    check_status, decode, http_client, require_key, Artifact, ArtifactBody, Capability, GenerationProvider,
    GenerationRequest,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.pexels.com/videos";

pub struct PexelsProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    pool: String,
}

impl PexelsProvider {
    pub fn new(cfg: &ProviderConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            pool: cfg.pool.clone().unwrap_or_else(|| "pexels".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Deserialize)]
struct Video {
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Deserialize)]
struct VideoFile {
    #[serde(default)]
    link: String,
}

#[async_trait]
impl GenerationProvider for PexelsProvider {
    fn name(&self) -> &str {
        "pexels"
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn supports(&self, capability: Capability) -> bool {
        capability == Capability::Video
    }

    async fn generate(
        &self,
        _capability: Capability,
        request: &GenerationRequest,
    ) -> Result<Artifact, ProviderError> {
        require_key("pexels", &self.api_key)?;

        let resp = self
            .http
            .get(format!("{}/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", request.prompt.as_str()),
                ("per_page", "15"),
                ("min_width", "1920"),
                ("min_duration", "3"),
                ("max_duration", "30"),
            ])
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        Self::parse_response(&request.prompt, &body)
    }
}

impl PexelsProvider {
    /// Download link of the first clip with a non-empty file link.
    pub fn parse_response(query: &str, body: &str) -> Result<Artifact, ProviderError> {
        let body: Resp = decode("pexels", body)?;
        let url = body
            .videos
            .into_iter()
            .flat_map(|v| v.video_files)
            .map(|f| f.link)
            .find(|l| !l.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!("pexels: no footage for '{query}'"))
            })?;
        Ok(Artifact {
            capability: Capability::Video,
            provider: "pexels".into(),
            body: ArtifactBody::Url { url },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_empty_link_wins() {
        let body = r#"{"page":1,"per_page":15,"total_results":2,"videos":[
            {"id":1,"video_files":[{"id":10,"quality":"hd","link":""}]},
            {"id":2,"video_files":[
                {"id":20,"quality":"hd","link":"https://videos.pexels.test/goose.mp4"},
                {"id":21,"quality":"sd","link":"https://videos.pexels.test/goose-sd.mp4"}
            ]}
        ]}"#;
        let a = PexelsProvider::parse_response("goose council", body).unwrap();
        assert_eq!(
            a.body,
            ArtifactBody::Url {
                url: "https://videos.pexels.test/goose.mp4".into()
            }
        );
        assert_eq!(a.capability, Capability::Video);
    }

    #[test]
    fn no_footage_names_the_query() {
        let body = r#"{"page":1,"per_page":15,"total_results":0,"videos":[]}"#;
        let e = PexelsProvider::parse_response("goose council", body).unwrap_err();
        assert!(matches!(e, ProviderError::InvalidResponse(ref m) if m.contains("goose council")));
    }
}
