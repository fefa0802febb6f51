//! # Provider cascade
//! Ordered fallback across interchangeable providers for one capability.
//!
//! Providers are tried strictly in declared order, each once, each behind
//! its pool's rate limiter and a per-call timeout. The first success wins.
//! The order is never changed at runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;

use crate::error::{CascadeError, ProviderError, ProviderFailure};
use crate::providers::registry::DynProvider;
use crate::providers::{Artifact, Capability, GenerationRequest};
use crate::rate_limit::RateLimiters;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    RateLimited,
}

impl AttemptOutcome {
    fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
            AttemptOutcome::RateLimited => "rate_limited",
        }
    }
}

/// One cascade attempt, kept for observability only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CascadeSuccess {
    pub artifact: Artifact,
    /// Provider that produced the artifact.
    pub provider: String,
    pub attempts: Vec<ProviderAttempt>,
}

/// Fallback order for one capability.
#[derive(Clone)]
pub struct ProviderCascade {
    capability: Capability,
    providers: Vec<DynProvider>,
    limiters: Arc<RateLimiters>,
    call_timeout: Duration,
}

impl ProviderCascade {
    pub fn new(capability: Capability, providers: Vec<DynProvider>, limiters: Arc<RateLimiters>) -> Self {
        Self {
            capability,
            providers,
            limiters,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn invoke(&self, request: &GenerationRequest) -> Result<CascadeSuccess, CascadeError> {
        invoke(
            self.capability,
            &self.providers,
            request,
            &self.limiters,
            self.call_timeout,
        )
        .await
    }
}

/// Try `providers` in order until one succeeds.
pub async fn invoke(
    capability: Capability,
    providers: &[DynProvider],
    request: &GenerationRequest,
    limiters: &RateLimiters,
    call_timeout: Duration,
) -> Result<CascadeSuccess, CascadeError> {
    let mut attempts = Vec::with_capacity(providers.len());
    let mut failures = Vec::new();

    for provider in providers {
        let name = provider.name().to_string();
        if !provider.supports(capability) {
            failures.push(ProviderFailure {
                provider: name,
                reason: format!("does not support {capability}"),
            });
            continue;
        }

        limiters.acquire(provider.pool()).await;

        let at = Utc::now();
        let started = tokio::time::Instant::now();
        let result = match tokio::time::timeout(call_timeout, provider.generate(capability, request)).await {
            Ok(r) => r,
            Err(_) => Err(ProviderError::Timeout(call_timeout)),
        };
        let latency = started.elapsed();

        let outcome = match &result {
            Ok(_) => AttemptOutcome::Success,
            Err(ProviderError::RateLimited(_)) => AttemptOutcome::RateLimited,
            Err(_) => AttemptOutcome::Failure,
        };
        counter!(
            "provider_attempts_total",
            "provider" => name.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        histogram!("provider_latency_ms", "provider" => name.clone())
            .record(latency.as_secs_f64() * 1_000.0);

        match result {
            Ok(artifact) => {
                tracing::info!(provider = %name, %capability, latency_ms = latency.as_millis() as u64, "provider succeeded");
                attempts.push(ProviderAttempt {
                    provider: name.clone(),
                    at,
                    outcome,
                    latency_ms: latency.as_millis() as u64,
                    error: None,
                });
                return Ok(CascadeSuccess {
                    artifact,
                    provider: name,
                    attempts,
                });
            }
            Err(e) => {
                tracing::warn!(provider = %name, %capability, error = %e, "provider failed; falling back");
                let reason = e.to_string();
                attempts.push(ProviderAttempt {
                    provider: name.clone(),
                    at,
                    outcome,
                    latency_ms: latency.as_millis() as u64,
                    error: Some(reason.clone()),
                });
                failures.push(ProviderFailure {
                    provider: name,
                    reason,
                });
            }
        }
    }

    Err(CascadeError::AllProvidersExhausted {
        capability,
        failures,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockBehavior, MockProvider};
    use crate::rate_limit::PoolLimits;

    fn limiters() -> Arc<RateLimiters> {
        Arc::new(RateLimiters::new(PoolLimits::default()))
    }

    #[tokio::test]
    async fn empty_cascade_is_exhausted() {
        let c = ProviderCascade::new(Capability::Text, vec![], limiters());
        let err = c.invoke(&GenerationRequest::prompt("hi")).await.unwrap_err();
        let CascadeError::AllProvidersExhausted { failures, .. } = err;
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn unsupported_capability_is_skipped_without_a_call() {
        let text_only = Arc::new(MockProvider::replying("t", "x").only(&[Capability::Text]));
        let any = Arc::new(MockProvider::replying("any", "x"));
        let c = ProviderCascade::new(Capability::Image, vec![text_only.clone(), any], limiters());
        let ok = c.invoke(&GenerationRequest::prompt("img")).await.unwrap();
        assert_eq!(ok.provider, "any");
        assert_eq!(text_only.calls(), 0);
        assert_eq!(ok.attempts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_and_falls_back() {
        let slow = Arc::new(MockProvider::new("slow", MockBehavior::Slow(Duration::from_secs(60))));
        let fast = Arc::new(MockProvider::replying("fast", "done"));
        let c = ProviderCascade::new(Capability::Text, vec![slow, fast], limiters())
            .with_call_timeout(Duration::from_secs(5));
        let ok = c.invoke(&GenerationRequest::prompt("p")).await.unwrap();
        assert_eq!(ok.provider, "fast");
        assert_eq!(ok.attempts[0].outcome, AttemptOutcome::Failure);
        assert!(ok.attempts[0].error.as_deref().unwrap_or("").contains("timed out"));
    }

    #[tokio::test]
    async fn quota_errors_are_recorded_as_rate_limited() {
        let limited = Arc::new(MockProvider::new("limited", MockBehavior::RateLimited));
        let ok = Arc::new(MockProvider::replying("backup", "ok"));
        let c = ProviderCascade::new(Capability::Text, vec![limited, ok], limiters());
        let res = c.invoke(&GenerationRequest::prompt("p")).await.unwrap();
        assert_eq!(res.attempts[0].outcome, AttemptOutcome::RateLimited);
        assert_eq!(res.attempts[1].outcome, AttemptOutcome::Success);
    }
}
