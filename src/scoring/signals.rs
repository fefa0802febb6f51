//! Signal extractors feeding the composite score.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{SignalExtractor, ENGAGEMENT_SCALE, SALIENCE_THRESHOLD, SCORE_MAX};
use crate::cascade::ProviderCascade;
use crate::model::CandidateItem;
use crate::providers::GenerationRequest;
use crate::rate_limit::RateLimiters;

const JUDGE_SYSTEM_PROMPT: &str = "Rate the weirdness of this news story on a scale of 1-10, \
where 10 is the weirdest. Respond with just the number.";

/// Content novelty judged by a text model through a cascade.
pub struct LlmNoveltySignal {
    cascade: ProviderCascade,
}

impl LlmNoveltySignal {
    pub fn new(cascade: ProviderCascade) -> Self {
        Self { cascade }
    }
}

/// First number in a model answer such as "7", "7.5/10" or "Score: 8".
pub fn parse_rating(answer: &str) -> Option<f64> {
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number regex"));
    re.find(answer).and_then(|m| m.as_str().parse::<f64>().ok())
}

#[async_trait]
impl SignalExtractor for LlmNoveltySignal {
    fn name(&self) -> &str {
        "novelty"
    }

    async fn evaluate(&self, item: &CandidateItem) -> Result<f64> {
        let req = GenerationRequest::prompt(item.analysis_text())
            .with_system(JUDGE_SYSTEM_PROMPT)
            .with_max_tokens(8);
        let ok = self.cascade.invoke(&req).await?;
        let answer = ok
            .artifact
            .as_text()
            .ok_or_else(|| anyhow!("judge {} returned non-text artifact", ok.provider))?;
        parse_rating(answer).ok_or_else(|| anyhow!("unparsable rating from {}: {answer:?}", ok.provider))
    }
}

pub const WEIRD_TITLE_KEYWORDS: &[&str] = &[
    "bizarre",
    "strange",
    "unusual",
    "mysterious",
    "unexpected",
    "surprising",
    "odd",
    "weird",
    "incredible",
    "unbelievable",
];

/// Offline novelty estimate: two points per weird keyword in the title.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordNoveltySignal;

#[async_trait]
impl SignalExtractor for KeywordNoveltySignal {
    fn name(&self) -> &str {
        "novelty"
    }

    async fn evaluate(&self, item: &CandidateItem) -> Result<f64> {
        let title = item.title.to_lowercase();
        let hits = WEIRD_TITLE_KEYWORDS
            .iter()
            .filter(|k| title.contains(*k))
            .count();
        Ok((hits as f64 * 2.0).min(SCORE_MAX))
    }
}

/// Popularity, `min(engagement / 1000, 10)`. No engagement counts as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngagementSignal;

#[async_trait]
impl SignalExtractor for EngagementSignal {
    fn name(&self) -> &str {
        "engagement"
    }

    async fn evaluate(&self, item: &CandidateItem) -> Result<f64> {
        let raw = item.engagement.unwrap_or(0.0).max(0.0);
        Ok((raw / ENGAGEMENT_SCALE).min(SCORE_MAX))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Entity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub salience: f64,
}

/// Number of entities whose salience exceeds the threshold.
pub fn count_salient(entities: &[Entity], threshold: f64) -> usize {
    entities.iter().filter(|e| e.salience > threshold).count()
}

const LANGUAGE_ENDPOINT: &str = "https://language.googleapis.com/v1/documents:analyzeEntities";
const LANGUAGE_POOL: &str = "google_language";

/// Count of high-salience named entities from Google Natural Language.
pub struct EntitySalienceSignal {
    http: reqwest::Client,
    api_key: String,
    limiters: Arc<RateLimiters>,
}

impl EntitySalienceSignal {
    pub fn new(api_key: impl Into<String>, limiters: Arc<RateLimiters>, timeout: Duration) -> Self {
        Self {
            http: crate::providers::http_client(timeout),
            api_key: api_key.into(),
            limiters,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeReq<'a> {
    document: Document<'a>,
    encoding_type: &'a str,
}

#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResp {
    #[serde(default)]
    entities: Vec<Entity>,
}

#[async_trait]
impl SignalExtractor for EntitySalienceSignal {
    fn name(&self) -> &str {
        "salience"
    }

    async fn evaluate(&self, item: &CandidateItem) -> Result<f64> {
        if self.api_key.is_empty() {
            bail!("GOOGLE_API_KEY not configured");
        }
        self.limiters.acquire(LANGUAGE_POOL).await;

        let text = item.analysis_text();
        let req = AnalyzeReq {
            document: Document {
                kind: "PLAIN_TEXT",
                content: &text,
            },
            encoding_type: "UTF8",
        };
        let resp: AnalyzeResp = self
            .http
            .post(LANGUAGE_ENDPOINT)
            .query(&[("key", self.api_key.as_str())])
            .json(&req)
            .send()
            .await
            .context("analyzeEntities post()")?
            .error_for_status()
            .context("analyzeEntities non-2xx")?
            .json()
            .await
            .context("analyzeEntities json")?;
        Ok(count_salient(&resp.entities, SALIENCE_THRESHOLD) as f64)
    }
}
