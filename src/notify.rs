//! Completion webhook: POST a short run summary after each run.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::RunReport;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u8>,
}

#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl WebhookNotifier {
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            webhook: webhook.into(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_attempts: 3,
        }
    }

    /// `None` when no webhook is configured.
    pub fn from_config(cfg: &NotifyConfig) -> Option<Self> {
        let url = cfg.webhook_url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let mut n = Self::new(url);
        if let Some(secs) = cfg.timeout_secs {
            n = n.with_timeout(secs);
        }
        if let Some(a) = cfg.max_attempts {
            n = n.with_attempts(a);
        }
        Some(n)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_attempts(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub async fn notify(&self, report: &RunReport) -> Result<()> {
        let payload = RunSummary::from(report);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };
            if attempt >= self.max_attempts {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, "webhook attempt failed; backing off");
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

/// 500 ms, 1 s, 2 s, ...
fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << (attempt.saturating_sub(1)).min(6))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub status: String,
    pub selected_title: Option<String>,
    pub selected_score: Option<f64>,
    pub has_artifact: bool,
    pub error_count: usize,
}

impl From<&RunReport> for RunSummary {
    fn from(r: &RunReport) -> Self {
        Self {
            run_id: r.run_id.clone(),
            status: r.status.as_str().to_string(),
            selected_title: r.selected.as_ref().map(|s| s.title.clone()),
            selected_score: r.selected.as_ref().and_then(|s| s.score),
            has_artifact: r.artifact.is_some(),
            error_count: r.errors.len() + r.source_errors.len(),
        }
    }
}
