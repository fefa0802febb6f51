//! Structured failure taxonomy. Item, source and signal failures are absorbed
//! and degrade the run; cascade failures are attached to the run report.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cascade::ProviderAttempt;
use crate::providers::Capability;

/// Failure reported by one generation provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider is rate limited: {0}")]
    RateLimited(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl ProviderError {
    /// Map an HTTP status and body to the matching variant.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited(body)
        } else {
            Self::Http {
                status: status.as_u16(),
                body,
            }
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(anyhow::Error::new(e))
    }
}

/// One provider's terminal failure inside a cascade.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("all {} providers exhausted for {capability}", failures.len())]
    AllProvidersExhausted {
        capability: Capability,
        failures: Vec<ProviderFailure>,
        attempts: Vec<ProviderAttempt>,
    },
}

/// A source that used up its retry budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("source {source_name} unavailable after {attempts} attempts: {reason}")]
pub struct SourceUnavailable {
    #[serde(rename = "source")]
    pub source_name: String,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("signal {signal} unavailable: {reason}")]
    SignalUnavailable { signal: String, reason: String },
    #[error("every signal failed for item {item_id}")]
    ScoringFailed { item_id: String },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("artifact generation failed at {stage}: {source}")]
    ArtifactGenerationFailed {
        stage: String,
        #[source]
        source: CascadeError,
    },
}

/// Error kinds that appear in a run report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    AllSourcesFailed,
    ScoringFailed,
    AllProvidersExhausted,
    ArtifactGenerationFailed,
    Cancelled,
}

/// Descriptor for a stage that did not fully succeed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageError {
    pub stage: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl StageError {
    pub fn new(stage: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            kind,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

impl From<&SourceUnavailable> for StageError {
    fn from(e: &SourceUnavailable) -> Self {
        StageError::new("collecting", ErrorKind::SourceUnavailable, e.to_string())
    }
}

impl From<&CascadeError> for StageError {
    fn from(e: &CascadeError) -> Self {
        match e {
            CascadeError::AllProvidersExhausted { failures, .. } => StageError::new(
                "generating_artifact",
                ErrorKind::AllProvidersExhausted,
                e.to_string(),
            )
            .with_details(
                failures
                    .iter()
                    .map(|f| format!("{}: {}", f.provider, f.reason))
                    .collect(),
            ),
        }
    }
}

impl From<&GenerationError> for StageError {
    fn from(e: &GenerationError) -> Self {
        let GenerationError::ArtifactGenerationFailed { source, .. } = e;
        let details = StageError::from(source).details;
        StageError::new(
            "generating_artifact",
            ErrorKind::ArtifactGenerationFailed,
            e.to_string(),
        )
        .with_details(details)
    }
}
