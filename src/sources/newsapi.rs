//! NewsAPI `everything` search for weird-news keywords.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, Source, WEIRD_KEYWORDS};
use crate::model::{normalize_text, RawItem};

const ENDPOINT: &str = "https://newsapi.org/v2/everything";

pub struct NewsApiSource {
    name: String,
    api_key: String,
    query: String,
    client: reqwest::Client,
}

impl NewsApiSource {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: "newsapi".to_string(),
            api_key: api_key.into(),
            query: WEIRD_KEYWORDS.join(" OR "),
            client: http_client(timeout),
        }
    }

    /// Custom search. The source name becomes `newsapi/<query>` so several
    /// NewsAPI searches stay distinguishable in ids and error reports.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self.name = format!("newsapi/{}", self.query.trim());
        self
    }

    pub fn parse_response(body: &str) -> Result<Vec<RawItem>> {
        let resp: Resp = serde_json::from_str(body).context("parsing newsapi json")?;
        if resp.status != "ok" {
            bail!(
                "newsapi status {}: {}",
                resp.status,
                resp.message.unwrap_or_default()
            );
        }
        let items = resp
            .articles
            .into_iter()
            .filter_map(|a| {
                let title = normalize_text(a.title.as_deref().unwrap_or_default());
                let url = a.url?;
                if title.is_empty() {
                    return None;
                }
                Some(RawItem {
                    native_id: None,
                    title,
                    description: a.description.map(|d| normalize_text(&d)).filter(|d| !d.is_empty()),
                    url,
                    source: format!("newsapi/{}", a.source.name.unwrap_or_else(|| "unknown".into())),
                    engagement: None,
                    created_at: a
                        .published_at
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
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    source: ArticleSource,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

#[async_trait]
impl Source for NewsApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        if self.api_key.is_empty() {
            bail!("NEWS_API_KEY not configured");
        }
        let body = self
            .client
            .get(ENDPOINT)
            .query(&[
                ("q", self.query.as_str()),
                ("apiKey", self.api_key.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
            ])
            .send()
            .await
            .context("newsapi get()")?
            .text()
            .await
            .context("newsapi .text()")?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articles_without_url_are_skipped() {
        let body = r#"{"status":"ok","articles":[
            {"source":{"name":"AP"},"title":"Bear steals car","description":"Again.","url":"https://ap.test/bear","publishedAt":"2024-01-20T12:00:00Z"},
            {"source":{"name":"AP"},"title":"No link","url":null}
        ]}"#;
        let items = NewsApiSource::parse_response(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "newsapi/AP");
        assert!(items[0].native_id.is_none());
    }

    #[test]
    fn custom_queries_get_their_own_name() {
        let t = Duration::from_secs(1);
        assert_eq!(NewsApiSource::new("k", t).name(), "newsapi");
        assert_eq!(
            NewsApiSource::new("k", t).with_query("bizarre animals").name(),
            "newsapi/bizarre animals"
        );
    }

    #[test]
    fn error_status_fails_the_fetch() {
        let body = r#"{"status":"error","message":"apiKeyInvalid"}"#;
        assert!(NewsApiSource::parse_response(body).is_err());
    }
}
