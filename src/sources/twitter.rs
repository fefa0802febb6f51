//! X/Twitter recent-search source.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, Source};
use crate::model::{normalize_text, RawItem};

const ENDPOINT: &str = "https://api.twitter.com/2/tweets/search/recent";
const DEFAULT_QUERY: &str = "weird news OR strange news OR unusual news";

pub struct TwitterSource {
    bearer_token: String,
    query: String,
    client: reqwest::Client,
}

impl TwitterSource {
    pub fn new(bearer_token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            query: DEFAULT_QUERY.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn parse_response(body: &str) -> Result<Vec<RawItem>> {
        let resp: Resp = serde_json::from_str(body).context("parsing twitter json")?;
        let items = resp
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| {
                let title = normalize_text(&t.text);
                if title.is_empty() {
                    return None;
                }
                Some(RawItem {
                    url: format!("https://twitter.com/x/status/{}", t.id),
                    native_id: Some(t.id),
                    title,
                    description: None,
                    source: "twitter".to_string(),
                    engagement: t.public_metrics.map(|m| m.like_count as f64),
                    created_at: t
                        .created_at
                        .as_deref()
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect();
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct Resp {
    data: Option<Vec<Tweet>>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: Option<String>,
    public_metrics: Option<Metrics>,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    #[serde(default)]
    like_count: u64,
}

#[async_trait]
impl Source for TwitterSource {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.bearer_token.is_empty() {
            bail!("TWITTER_BEARER_TOKEN not configured");
        }
        let body = self
            .client
            .get(ENDPOINT)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", self.query.as_str()),
                ("max_results", "100"),
                ("tweet.fields", "created_at,public_metrics"),
            ])
            .send()
            .await
            .context("twitter get()")?
            .error_for_status()
            .context("twitter non-2xx")?
            .text()
            .await
            .context("twitter .text()")?;
        Self::parse_response(&body)
    }
}
