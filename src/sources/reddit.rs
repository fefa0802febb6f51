//! Reddit listing source: newest posts of one subreddit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use super::{http_client, Source};
use crate::model::{normalize_text, RawItem};

pub struct RedditSource {
    name: String,
    subreddit: String,
    listing_url: String,
    limit: u32,
    client: reqwest::Client,
}

impl RedditSource {
    pub fn new(subreddit: impl Into<String>, timeout: Duration) -> Self {
        let subreddit = subreddit.into();
        Self {
            name: format!("reddit/{subreddit}"),
            listing_url: format!("https://www.reddit.com/r/{subreddit}/new.json"),
            subreddit,
            limit: 25,
            client: http_client(timeout),
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Parse a listing body. Public so tests can feed captured JSON.
    pub fn parse_listing(&self, body: &str) -> Result<Vec<RawItem>> {
        let listing: Listing = serde_json::from_str(body).context("parsing reddit listing json")?;
        let items = listing
            .data
            .children
            .into_iter()
            .map(|c| c.data)
            .filter_map(|p| {
                let title = normalize_text(&p.title);
                if title.is_empty() {
                    return None;
                }
                Some(RawItem {
                    native_id: Some(p.id),
                    title,
                    description: p
                        .selftext
                        .map(|s| normalize_text(&s))
                        .filter(|s| !s.is_empty()),
                    url: p.url,
                    source: self.name.clone(),
                    engagement: Some(p.score as f64),
                    created_at: DateTime::<Utc>::from_timestamp(p.created_utc as i64, 0)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect::<Vec<_>>();
        counter!("source_items_parsed_total", "source" => self.name.clone()).increment(items.len() as u64);
        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    score: i64,
    created_utc: f64,
}

#[async_trait]
impl Source for RedditSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        let limit = self.limit.to_string();
        let body = self
            .client
            .get(&self.listing_url)
            .query(&[("limit", limit.as_str())])
            .send()
            .await
            .with_context(|| format!("reddit r/{} get()", self.subreddit))?
            .error_for_status()
            .with_context(|| format!("reddit r/{} non-2xx", self.subreddit))?
            .text()
            .await
            .context("reddit .text()")?;
        self.parse_listing(&body)
    }
}
