// tests/providers_http.rs
//
// Provider adapters against a local stub vendor (loopback only): status
// classification, body decoding, and a 429 moving the cascade on.

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Router};
use weird_news_pipeline::cascade::{AttemptOutcome, ProviderCascade};
use weird_news_pipeline::config::ProviderConfig;
use weird_news_pipeline::error::ProviderError;
use weird_news_pipeline::providers::anthropic::AnthropicProvider;
use weird_news_pipeline::providers::openai::OpenAiProvider;
use weird_news_pipeline::providers::pexels::PexelsProvider;
use weird_news_pipeline::providers::registry::DynProvider;
use weird_news_pipeline::providers::stability::StabilityProvider;
use weird_news_pipeline::providers::{Capability, GenerationProvider, GenerationRequest};
use weird_news_pipeline::rate_limit::{PoolLimits, RateLimiters};

/// Serves `status` + `body` for every path; returns the base URL.
async fn stub_vendor(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().fallback(move || async move { (status, body) });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn cfg(base_url: String) -> ProviderConfig {
    ProviderConfig {
        api_key: "test-key".into(),
        base_url: Some(base_url),
        ..Default::default()
    }
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn openai_429_is_classified_as_rate_limited() {
    let url = stub_vendor(StatusCode::TOO_MANY_REQUESTS, r#"{"error":"slow down"}"#).await;
    let p = OpenAiProvider::new(&cfg(url), TIMEOUT);
    let err = p
        .generate(Capability::Text, &GenerationRequest::prompt("hook"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited(ref b) if b.contains("slow down")), "{err}");
}

#[tokio::test]
async fn openai_success_body_becomes_text() {
    let url = stub_vendor(
        StatusCode::OK,
        r#"{"choices":[{"message":{"role":"assistant","content":"Extra! Extra!"}}]}"#,
    )
    .await;
    let p = OpenAiProvider::new(&cfg(url), TIMEOUT);
    let a = p
        .generate(Capability::Text, &GenerationRequest::prompt("hook"))
        .await
        .expect("stub answers 200");
    assert_eq!(a.as_text(), Some("Extra! Extra!"));
}

#[tokio::test]
async fn stability_server_error_keeps_status() {
    let url = stub_vendor(StatusCode::BAD_GATEWAY, "upstream down").await;
    let p = StabilityProvider::new(&cfg(url), TIMEOUT);
    let err = p
        .generate(Capability::Image, &GenerationRequest::prompt("goose in a sash"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Http { status: 502, .. }), "{err}");
}

#[tokio::test]
async fn pexels_empty_search_is_invalid_response() {
    let url = stub_vendor(StatusCode::OK, r#"{"page":1,"videos":[]}"#).await;
    let p = PexelsProvider::new(&cfg(url), TIMEOUT);
    let err = p
        .generate(Capability::Video, &GenerationRequest::prompt("goose council"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)), "{err}");
}

#[tokio::test]
async fn missing_key_fails_before_any_request() {
    let p = OpenAiProvider::new(&ProviderConfig::default(), TIMEOUT);
    let err = p
        .generate(Capability::Text, &GenerationRequest::prompt("hook"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotConfigured(_)));
}

#[tokio::test]
async fn throttled_vendor_hands_over_to_the_next_in_line() {
    let busy = stub_vendor(StatusCode::TOO_MANY_REQUESTS, "quota").await;
    let fine = stub_vendor(
        StatusCode::OK,
        r#"{"content":[{"type":"text","text":"And now, the news."}]}"#,
    )
    .await;
    let providers: Vec<DynProvider> = vec![
        Arc::new(OpenAiProvider::new(&cfg(busy), TIMEOUT)),
        Arc::new(AnthropicProvider::new(&cfg(fine), TIMEOUT)),
    ];
    let cascade = ProviderCascade::new(
        Capability::Text,
        providers,
        Arc::new(RateLimiters::new(PoolLimits::default())),
    );

    let ok = cascade
        .invoke(&GenerationRequest::prompt("hook"))
        .await
        .expect("anthropic answers");
    assert_eq!(ok.provider, "anthropic");
    assert_eq!(ok.artifact.as_text(), Some("And now, the news."));
    let outcomes: Vec<_> = ok.attempts.iter().map(|a| a.outcome).collect();
    assert_eq!(outcomes, vec![AttemptOutcome::RateLimited, AttemptOutcome::Success]);
}
