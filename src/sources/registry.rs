//! Build sources from configuration entries.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::fixture::FixtureSource;
use super::newsapi::NewsApiSource;
use super::reddit::RedditSource;
use super::rss::RssSource;
use super::twitter::TwitterSource;
use super::Source;

pub type DynSource = Arc<dyn Source>;

/// One `[[sources]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Reddit {
        subreddit: String,
        #[serde(default)]
        limit: Option<u32>,
    },
    NewsApi {
        #[serde(default)]
        query: Option<String>,
    },
    Twitter,
    Rss {
        name: String,
        url: String,
    },
    Fixture {
        name: String,
        path: String,
    },
}

/// Credentials sources read from the environment.
#[derive(Debug, Clone, Default)]
pub struct SourceKeys {
    pub news_api_key: String,
    pub twitter_bearer_token: String,
}

impl SourceKeys {
    pub fn from_env() -> Self {
        Self {
            news_api_key: std::env::var("NEWS_API_KEY").unwrap_or_default(),
            twitter_bearer_token: std::env::var("TWITTER_BEARER_TOKEN").unwrap_or_default(),
        }
    }
}

pub fn build_source(spec: &SourceSpec, keys: &SourceKeys, timeout: Duration) -> Result<DynSource> {
    let s: DynSource = match spec {
        SourceSpec::Reddit { subreddit, limit } => {
            let mut r = RedditSource::new(subreddit.clone(), timeout);
            if let Some(l) = limit {
                r = r.with_limit(*l);
            }
            Arc::new(r)
        }
        SourceSpec::NewsApi { query } => {
            let mut n = NewsApiSource::new(keys.news_api_key.clone(), timeout);
            if let Some(q) = query {
                n = n.with_query(q.clone());
            }
            Arc::new(n)
        }
        SourceSpec::Twitter => Arc::new(TwitterSource::new(keys.twitter_bearer_token.clone(), timeout)),
        SourceSpec::Rss { name, url } => Arc::new(RssSource::from_url(name.clone(), url.clone(), timeout)),
        SourceSpec::Fixture { name, path } => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture source {path}"))?;
            Arc::new(FixtureSource::from_json(name.clone(), &json)?)
        }
    };
    Ok(s)
}

/// Builds every configured source. Names must be unique: they scope item
/// ids and label per-source errors.
pub fn build_sources(specs: &[SourceSpec], keys: &SourceKeys, timeout: Duration) -> Result<Vec<DynSource>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(specs.len());
    for spec in specs {
        let s = build_source(spec, keys, timeout)?;
        if !seen.insert(s.name().to_string()) {
            bail!("duplicate source name {:?}; give each source a distinct query or name", s.name());
        }
        out.push(s);
    }
    Ok(out)
}

/// Default source set: three subreddits plus NewsAPI and X.
pub fn default_specs() -> Vec<SourceSpec> {
    let mut v: Vec<SourceSpec> = ["WeirdNews", "nottheonion", "offbeat"]
        .into_iter()
        .map(|s| SourceSpec::Reddit {
            subreddit: s.to_string(),
            limit: None,
        })
        .collect();
    v.push(SourceSpec::NewsApi { query: None });
    v.push(SourceSpec::Twitter);
    v
}
