// tests/config.rs
//
// Config file lookup, env overrides and "ENV" key resolution.
// Env-mutating tests run serially.

use std::env;
use std::fs;

use serial_test::serial;
use weird_news_pipeline::config::{AppConfig, StoreKind, ENV_CONFIG_PATH};
use weird_news_pipeline::sources::registry::SourceSpec;

const OVERRIDES: &[&str] = &[
    "RATE_LIMIT_REQUESTS",
    "RATE_LIMIT_PERIOD",
    "MAX_PARALLEL_REQUESTS",
    "REQUEST_TIMEOUT",
];

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    for v in OVERRIDES {
        env::remove_var(v);
    }
}

fn write_config(body: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pipeline.toml"), body).unwrap();
    env::set_var(ENV_CONFIG_PATH, dir.path().join("pipeline.toml"));
    dir
}

#[test]
#[serial]
fn env_path_is_honored_and_env_overrides_win() {
    clear_env();
    let _dir = write_config(
        r#"
max_parallel_requests = 3

[rate_limit]
max_requests = 7
period_secs = 30

[store]
kind = "file"
dir = "/tmp/weird-runs"
"#,
    );
    env::set_var("RATE_LIMIT_REQUESTS", "12");
    env::set_var("REQUEST_TIMEOUT", "9");

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.rate_limit.max_requests, 12, "env beats file");
    assert_eq!(cfg.rate_limit.period_secs, 30, "file beats default");
    assert_eq!(cfg.max_parallel_requests, 3);
    assert_eq!(cfg.request_timeout_secs, 9);
    assert_eq!(cfg.store.kind, StoreKind::File);

    clear_env();
}

#[test]
#[serial]
fn garbage_overrides_are_ignored() {
    clear_env();
    let _dir = write_config("max_parallel_requests = 6\n");
    env::set_var("MAX_PARALLEL_REQUESTS", "lots");

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.max_parallel_requests, 6);

    clear_env();
}

#[test]
#[serial]
fn env_marker_keys_resolve_from_environment() {
    clear_env();
    let _dir = write_config(
        r#"
[providers.openai]
api_key = "ENV"

[providers.anthropic]
api_key = "ENV"

[providers.pexels]
api_key = "literal-key"
"#,
    );
    env::set_var("OPENAI_API_KEY", "sk-test");
    env::remove_var("ANTHROPIC_API_KEY");

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.providers["openai"].api_key, "sk-test");
    assert_eq!(cfg.providers["anthropic"].api_key, "", "missing key is not fatal");
    assert_eq!(cfg.providers["pexels"].api_key, "literal-key");

    env::remove_var("OPENAI_API_KEY");
    clear_env();
}

#[test]
#[serial]
fn nonexistent_env_path_is_an_error() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/pipeline.toml");
    assert!(AppConfig::load().is_err());
    clear_env();
}

#[test]
#[serial]
fn shipped_config_parses() {
    let cfg = AppConfig::read_file(std::path::Path::new("config/pipeline.toml")).unwrap();
    assert_eq!(cfg.sources.len(), 5);
    assert!(matches!(cfg.sources[3], SourceSpec::NewsApi { .. }));
    assert_eq!(cfg.cascades.image, vec!["stability", "runway"]);
    assert_eq!(cfg.rate_limit.pools["google_language"].max_requests, 10);
}
