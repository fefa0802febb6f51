// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod model;
pub mod error;
pub mod config;

// Outbound throttling and provider fallback
pub mod rate_limit;
pub mod providers;
pub mod cascade;

// Collection and ranking
pub mod sources;
pub mod aggregator;
pub mod scoring;

// Orchestration
pub mod generate;
pub mod pipeline;
pub mod store;
pub mod notify;
pub mod scheduler;
pub mod bootstrap;

// HTTP surface
pub mod api;
pub mod metrics;

pub use crate::api::create_router;
pub use crate::pipeline::{CancelHandle, Pipeline, PipelineState, RunReport, RunStatus};
