// src/sources/mod.rs
//! Candidate sources: each one produces raw items or fails as a whole.

pub mod fixture;
pub mod newsapi;
pub mod reddit;
pub mod registry;
pub mod rss;
pub mod twitter;

use anyhow::Result;
use std::time::Duration;

use crate::model::RawItem;

#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Identifier used in logs and per-source error records.
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<Vec<RawItem>>;
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("WeirdNewsScraper/1.0")
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Keywords used by news-search style sources.
pub const WEIRD_KEYWORDS: &[&str] = &["weird", "strange", "unusual", "bizarre", "odd"];
