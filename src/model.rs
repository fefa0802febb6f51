//! # Data model
//! Candidate items as they flow through one run: raw from a source,
//! identified, scored once, then ranked.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Item exactly as a source adapter produced it, before identity is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawItem {
    /// Native id if the origin has one (e.g. a Reddit post id).
    pub native_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    /// Origin tag, e.g. "reddit/WeirdNews".
    pub source: String,
    /// Popularity signal (upvotes, likes), if the origin exposes one.
    pub engagement: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One discovered news-like item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: String,
    pub engagement: Option<f64>,
    pub created_at: DateTime<Utc>,
    /// Filled once by the composite scorer.
    pub score: Option<f64>,
}

impl CandidateItem {
    pub fn from_raw(raw: RawItem) -> Self {
        let id = derive_id(&raw.source, raw.native_id.as_deref(), &raw.url);
        Self {
            id,
            title: raw.title,
            description: raw.description,
            url: raw.url,
            source: raw.source,
            engagement: raw.engagement,
            created_at: raw.created_at,
            score: None,
        }
    }

    /// Identity scoped by the configured source that fetched the item. When
    /// the item's own tag differs from the fetcher (e.g. `newsapi/AP` under
    /// `newsapi/bizarre`), the fetcher name is prefixed: `{fetcher}|{tag}:{key}`.
    pub fn fetched_by(fetcher: &str, raw: RawItem) -> Self {
        let mut item = Self::from_raw(raw);
        if item.source != fetcher {
            item.id = format!("{fetcher}|{}", item.id);
        }
        item
    }

    /// Title and description joined, the text handed to text-based signals.
    pub fn analysis_text(&self) -> String {
        match self.description.as_deref() {
            Some(d) if !d.is_empty() => format!("{} {}", self.title, d),
            _ => self.title.clone(),
        }
    }

    /// Consume the item and attach its score. Scoring happens exactly once.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Stable identity scoped by source tag, so two sources linking the same
/// URL never collide.
pub fn derive_id(source: &str, native_id: Option<&str>, url: &str) -> String {
    match native_id {
        Some(n) if !n.trim().is_empty() => format!("{source}:{}", n.trim()),
        _ => {
            let digest = Sha256::digest(url.as_bytes());
            let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
            format!("{source}:{hex}")
        }
    }
}

/// Normalize text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }
    out
}

/// Ranking order: score desc, then most recent first, then id asc.
/// Unscored items sort after all scored ones.
pub fn rank_order(a: &CandidateItem, b: &CandidateItem) -> Ordering {
    let sa = a.score.unwrap_or(f64::NEG_INFINITY);
    let sb = b.score.unwrap_or(f64::NEG_INFINITY);
    sb.total_cmp(&sa)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Ordered sequence of scored items.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    items: Vec<CandidateItem>,
}

impl RankedResult {
    pub fn from_scored(mut items: Vec<CandidateItem>) -> Self {
        items.sort_by(rank_order);
        Self { items }
    }

    pub fn items(&self) -> &[CandidateItem] {
        &self.items
    }

    pub fn top(&self) -> Option<&CandidateItem> {
        self.items.first()
    }

    pub fn top_n(&self, n: usize) -> Vec<CandidateItem> {
        self.items.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, score: f64, hour: u32) -> CandidateItem {
        CandidateItem {
            id: id.into(),
            title: id.into(),
            description: None,
            url: format!("https://example.test/{id}"),
            source: "test".into(),
            engagement: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 20, hour, 0, 0).unwrap(),
            score: Some(score),
        }
    }

    #[test]
    fn ids_are_scoped_by_source() {
        let a = derive_id("reddit/WeirdNews", None, "https://x.test/a");
        let b = derive_id("newsapi/AP", None, "https://x.test/a");
        assert_ne!(a, b);
        assert!(a.starts_with("reddit/WeirdNews:"));
        assert_eq!(a.len(), "reddit/WeirdNews:".len() + 16);
    }

    #[test]
    fn fetcher_scopes_foreign_tags() {
        let raw = RawItem {
            native_id: None,
            title: "Bear steals car".into(),
            description: None,
            url: "https://ap.test/bear".into(),
            source: "newsapi/AP".into(),
            engagement: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap(),
        };
        let plain = CandidateItem::from_raw(raw.clone());
        let weird = CandidateItem::fetched_by("newsapi/weird", raw.clone());
        let bizarre = CandidateItem::fetched_by("newsapi/bizarre", raw.clone());
        assert_eq!(weird.id, format!("newsapi/weird|{}", plain.id));
        assert_ne!(weird.id, bizarre.id);

        let own = CandidateItem::fetched_by("newsapi/AP", raw);
        assert_eq!(own.id, plain.id, "own tag keeps the short form");
    }

    #[test]
    fn native_id_wins_over_url_hash() {
        assert_eq!(derive_id("reddit/offbeat", Some("abc123"), "u"), "reddit/offbeat:abc123");
        assert_ne!(derive_id("reddit/offbeat", Some("  "), "u"), "reddit/offbeat:");
    }

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let out = normalize_text("  <b>Goat&nbsp;elected</b>   &ldquo;mayor&rdquo; ");
        assert_eq!(out, "Goat elected \"mayor\"");
    }

    #[test]
    fn equal_scores_rank_newest_first() {
        let ranked = RankedResult::from_scored(vec![
            item("old", 5.0, 1),
            item("top", 9.0, 0),
            item("new", 5.0, 3),
        ]);
        let ids: Vec<_> = ranked.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "new", "old"]);
    }

    #[test]
    fn ranking_is_reproducible_regardless_of_input_order() {
        let a = vec![item("b", 5.0, 2), item("a", 5.0, 2), item("c", 7.0, 1)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(RankedResult::from_scored(a), RankedResult::from_scored(b));
    }
}
