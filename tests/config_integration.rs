//! Integration tests: config persistence and service construction from files.

use pricewise::{PricewiseConfig, build_service};
use pricewise_search::SearchOptions;

#[test]
fn config_roundtrips_through_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.toml");

    let mut config = PricewiseConfig::default();
    config.cache_ttl_secs = 0;
    config.graceful_degradation = false;
    config.providers.duckduckgo.enabled = false;
    config.providers.tavily.retry.max_attempts = 3;
    config
        .query
        .synonyms
        .insert("kela".into(), "banana".into());
    config.save_to_file(&path).expect("save");

    let restored = PricewiseConfig::from_file(&path).expect("load");
    assert_eq!(restored, config);
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = PricewiseConfig::load_or_default(&dir.path().join("absent.toml")).expect("load");
    assert_eq!(config, PricewiseConfig::default());
}

#[test]
fn invalid_toml_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "this is not valid toml {{{").expect("write");
    let err = PricewiseConfig::from_file(&path).unwrap_err();
    assert!(err.to_string().starts_with("config error"));
}

#[tokio::test]
async fn local_index_uses_catalog_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let catalog = dir.path().join("catalog.json");
    std::fs::write(
        &catalog,
        r#"[
            {"id":"bb:ghee","name":"Amul Pure Ghee 1 l","category":"dairy","price":610,
             "platform":"BigBasket","quantity":"1 l","delivery":"2 hours"},
            {"id":"zp:ghee","name":"Amul Pure Ghee 1 l","category":"dairy","price":595,
             "platform":"Zepto","quantity":"1 l","delivery":"10 mins"}
        ]"#,
    )
    .expect("write catalog");

    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            r#"
            cache_ttl_secs = 0

            [providers.duckduckgo]
            enabled = false

            [providers.mock]
            enabled = false

            [providers.local_index]
            catalog = "{}"
            min_similarity = 0.1
            "#,
            catalog.display()
        ),
    )
    .expect("write config");

    let config = PricewiseConfig::from_file(&path).expect("load");
    let service = build_service(&config).expect("service");
    let result = service.search("ghee", &SearchOptions::default()).await;

    assert_eq!(result.ranked.len(), 2);
    let best = result.best_pick.expect("best pick");
    assert_eq!(best.platform, "zepto");
    assert_eq!(best.price, 595.0);
    assert_eq!(best.provenance.provider, "local_index");
}

#[test]
fn unreadable_catalog_fails_construction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = PricewiseConfig::default();
    config.providers.duckduckgo.enabled = false;
    config.providers.local_index.settings.catalog = Some(dir.path().join("missing.json"));
    assert!(build_service(&config).is_err());
}
