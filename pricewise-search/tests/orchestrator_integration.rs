//! End-to-end tests: fan-out, health tracking, aggregation and caching
//! through the public API only.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pricewise_search::{
    Capability, ComparisonService, DiagnosticStatus, HealthPolicy, HealthStatus, OutcomeKind,
    Provider, ProviderDescriptor, ProviderError, Query, RawRecord, ResultCache, RetryPolicy,
    SearchError, SearchOptions, ServiceManager,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// What a scripted provider does on every call.
#[derive(Clone)]
enum Behavior {
    Records(Vec<Value>),
    Fail,
    Hang,
}

struct Scripted {
    name: &'static str,
    behavior: Behavior,
    fallback: Option<Vec<Value>>,
    calls: AtomicU32,
}

impl Scripted {
    fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            fallback: None,
            calls: AtomicU32::new(0),
        })
    }

    fn with_fallback(name: &'static str, behavior: Behavior, fallback: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            fallback: Some(fallback),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn to_records(name: &str, bodies: &[Value]) -> Vec<RawRecord> {
    bodies
        .iter()
        .enumerate()
        .map(|(i, body)| RawRecord::new(format!("{name}-{i}"), body.clone()))
        .collect()
}

#[async_trait]
impl Provider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::StaticCatalog]
    }

    async fn search(&self, _query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Records(bodies) => Ok(to_records(self.name, bodies)),
            Behavior::Fail => Err(ProviderError::Http("503 Service Unavailable".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
        }
    }

    fn fallback(&self, _query: &Query) -> Option<Vec<RawRecord>> {
        self.fallback
            .as_ref()
            .map(|bodies| to_records(&format!("{}-fallback", self.name), bodies))
    }
}

fn listing(title: &str, price: f64, platform: &str, delivery: &str) -> Value {
    json!({ "name": title, "price": price, "platform": platform, "delivery_time": delivery })
}

fn descriptor(provider: Arc<Scripted>) -> ProviderDescriptor {
    ProviderDescriptor::new(provider)
        .with_timeout(Duration::from_millis(100))
        .with_retry(RetryPolicy::no_retry())
}

fn service(descriptors: Vec<ProviderDescriptor>, policy: HealthPolicy) -> ComparisonService {
    ComparisonService::new(ServiceManager::new(descriptors, policy).expect("manager"))
}

#[tokio::test]
async fn cheaper_duplicate_from_second_provider_wins() {
    let a = Scripted::new(
        "a",
        Behavior::Records(vec![
            listing("Amul Taaza Toned Milk 500 ml", 50.0, "BigBasket", "2 days"),
            listing("Amul Gold Milk 1 l", 30.0, "Blinkit", "1 day"),
        ]),
    );
    let b = Scripted::new(
        "b",
        Behavior::Records(vec![listing("Amul Gold Milk 1 l", 25.0, "blinkit.com", "10 mins")]),
    );
    let c = Scripted::new("c", Behavior::Hang);
    let service = service(
        vec![descriptor(a), descriptor(b), descriptor(c)],
        HealthPolicy::default(),
    );

    let result = service.search("milk", &SearchOptions::default()).await;

    let best = result.best_pick.as_ref().expect("best pick");
    assert_eq!(best.price, 25.0);
    assert_eq!(best.provenance.provider, "b");
    assert_eq!(best.delivery, Some(Duration::from_secs(600)));
    assert_eq!(result.ranked.len(), 2);
    assert_eq!(result.duplicates_collapsed, 1);
    assert_eq!(result.degraded_providers, vec!["c".to_string()]);
    assert!(!result.degraded);
    assert!(result.warnings.iter().any(|w| matches!(
        w,
        SearchError::ProviderTimeout { provider, .. } if provider == "c"
    )));

    let health = service.status();
    let c_health = health.iter().find(|h| h.provider == "c").expect("c health");
    assert_eq!(c_health.total_calls, 1);
    assert_eq!(c_health.window_failures, 1);
    assert_eq!(c_health.consecutive_failures, 1);
}

#[tokio::test]
async fn no_usable_data_yields_empty_degraded_result() {
    let service = service(
        vec![
            descriptor(Scripted::new("a", Behavior::Fail)),
            descriptor(Scripted::new("b", Behavior::Records(vec![json!({ "name": "no price" })]))),
            descriptor(Scripted::new("c", Behavior::Fail)),
        ],
        HealthPolicy::default(),
    );

    let result = service.search("milk", &SearchOptions::default()).await;

    assert!(result.ranked.is_empty());
    assert!(result.best_pick.is_none());
    assert!(result.price_range.is_none());
    assert_eq!(result.degraded_providers, ["a", "b", "c"]);
    assert_eq!(result.normalization_losses, 1);
}

#[tokio::test]
async fn unknown_subset_marks_every_provider_degraded() {
    let a = Scripted::new(
        "mock",
        Behavior::Records(vec![listing("Tata Salt 1 kg", 28.0, "JioMart", "1 day")]),
    );
    let service = service(vec![descriptor(a.clone())], HealthPolicy::default());
    let options = SearchOptions {
        providers: vec!["nope".into()],
        ..Default::default()
    };

    let result = service.search("salt", &options).await;

    assert!(result.ranked.is_empty());
    assert!(result.degraded);
    assert_eq!(result.degraded_providers, ["mock"]);
    assert_eq!(result.warnings, vec![SearchError::UnknownProvider("nope".into())]);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn fallback_only_result_is_marked_degraded() {
    let a = Scripted::with_fallback(
        "a",
        Behavior::Fail,
        vec![listing("Tata Salt 1 kg", 28.0, "JioMart", "1 day")],
    );
    let service = service(vec![descriptor(a)], HealthPolicy::default());

    let result = service.search("salt", &SearchOptions::default()).await;

    assert_eq!(result.ranked.len(), 1);
    assert!(result.degraded);
    assert_eq!(result.fallback_providers, ["a"]);
    assert!(result.degraded_providers.is_empty());
    assert!(result
        .warnings
        .contains(&SearchError::AllProvidersDegraded(vec!["a".into()])));
}

#[tokio::test]
async fn open_circuit_stops_calling_provider() {
    let flaky = Scripted::with_fallback(
        "flaky",
        Behavior::Fail,
        vec![listing("Onion 1 kg", 38.0, "Zepto", "10 mins")],
    );
    let policy = HealthPolicy {
        consecutive_failure_limit: 3,
        open_duration_ms: 60_000,
        ..Default::default()
    };
    let service = service(vec![descriptor(flaky.clone())], policy);

    for _ in 0..3 {
        service.search("onion", &SearchOptions::default()).await;
    }
    assert_eq!(flaky.calls(), 3);
    assert_eq!(service.status()[0].status, HealthStatus::Down);

    for _ in 0..5 {
        let result = service.search("onion", &SearchOptions::default()).await;
        assert_eq!(result.ranked.len(), 1, "fallback still answers");
    }
    assert_eq!(flaky.calls(), 3, "no calls while the circuit is open");
    assert_eq!(service.status()[0].total_calls, 3);
}

#[tokio::test]
async fn half_open_probe_recovers_provider() {
    struct Recovering {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl Provider for Recovering {
        fn name(&self) -> &str {
            "recovering"
        }

        fn capabilities(&self) -> &[Capability] {
            &[Capability::RemoteApi]
        }

        async fn search(&self, _query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(ProviderError::Http("connection reset".into()));
            }
            Ok(to_records("recovering", &[listing("Potato 1 kg", 34.0, "Zepto", "10 mins")]))
        }
    }

    let provider = Arc::new(Recovering {
        calls: AtomicU32::new(0),
        fail_first: 2,
    });
    let policy = HealthPolicy {
        consecutive_failure_limit: 2,
        open_duration_ms: 50,
        ..Default::default()
    };
    let manager = ServiceManager::new(
        vec![ProviderDescriptor::new(provider.clone()).with_retry(RetryPolicy::no_retry())],
        policy,
    )
    .expect("manager");
    let query = Query::new("potato");
    let cancel = CancellationToken::new();

    manager.search(&query, None, &cancel).await;
    manager.search(&query, None, &cancel).await;
    assert_eq!(manager.status()[0].status, HealthStatus::Down);

    let rejected = manager.search(&query, None, &cancel).await;
    assert_eq!(rejected.outcomes[0].attempts, 0);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let probe = manager.search(&query, None, &cancel).await;
    assert!(probe.outcomes[0].is_success());
    assert_eq!(probe.outcomes[0].attempts, 1);
    assert_eq!(manager.status()[0].status, HealthStatus::Up);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_all_leaves_other_providers_untouched() {
    let healthy = Scripted::new(
        "healthy",
        Behavior::Records(vec![listing(
            "Amul Taaza Toned Milk 500 ml",
            27.0,
            "Blinkit",
            "10 mins",
        )]),
    );
    let broken = Scripted::with_fallback(
        "broken",
        Behavior::Fail,
        vec![listing("Mother Dairy Full Cream Milk 1 l", 68.0, "BigBasket", "2 hours")],
    );
    let service = service(
        vec![descriptor(healthy), descriptor(broken)],
        HealthPolicy::default(),
    );

    let reports = service.test_all().await;

    assert_eq!(reports[0].provider, "healthy");
    assert_eq!(reports[0].outcome, DiagnosticStatus::Success);
    assert_eq!(reports[1].outcome, DiagnosticStatus::Fallback);
    assert!(reports[1].reason.as_deref().is_some_and(|r| r.contains("503")));

    let health = service.status();
    assert_eq!(health[0].status, HealthStatus::Up);
    assert_eq!(health[0].window_failures, 0);
    assert_eq!(health[0].consecutive_failures, 0);
    assert_eq!(health[1].window_failures, 1);
}

#[tokio::test]
async fn identical_outcomes_give_identical_results() {
    let build = || {
        service(
            vec![
                descriptor(Scripted::new(
                    "a",
                    Behavior::Records(vec![
                        listing("Tata Salt 1 kg", 28.0, "BigBasket", "2 hours"),
                        listing("Tata Salt 1 kg", 28.0, "Zepto", "10 mins"),
                    ]),
                )),
                descriptor(Scripted::new(
                    "b",
                    Behavior::Records(vec![
                        listing("Salt Tata 1kg", 28.0, "www.bigbasket.com", "2 hours"),
                        listing("Tata Salt 1 kg", 27.0, "JioMart", "1 day"),
                    ]),
                )),
            ],
            HealthPolicy::default(),
        )
    };

    let first = build().search("salt", &SearchOptions::default()).await;
    let second = build().search("salt", &SearchOptions::default()).await;
    assert_eq!(first.ranked, second.ranked);
    assert_eq!(first.best_pick, second.best_pick);

    // Equal price and delivery: the earlier registration survives.
    let bigbasket = first
        .ranked
        .iter()
        .find(|p| p.platform == "bigbasket")
        .expect("bigbasket listing");
    assert_eq!(bigbasket.provenance.provider, "a");
    assert_eq!(first.duplicates_collapsed, 1);
}

#[tokio::test]
async fn ranking_is_monotonic_in_price_then_delivery() {
    let service = service(
        vec![descriptor(Scripted::new(
            "a",
            Behavior::Records(vec![
                listing("Fortune Sunflower Oil 1 l", 155.0, "BigBasket", "2 hours"),
                listing("Fortune Sunflower Oil 1 l", 150.0, "Blinkit", "10 mins"),
                listing("Fortune Sunflower Oil 1 l", 150.0, "Amazon Fresh", "1 day"),
                listing("Fortune Sunflower Oil 1 l", 147.0, "JioMart", "unknown"),
            ]),
        ))],
        HealthPolicy::default(),
    );

    let result = service.search("sunflower oil", &SearchOptions::default()).await;

    let platforms: Vec<_> = result.ranked.iter().map(|p| p.platform.as_str()).collect();
    assert_eq!(platforms, ["jiomart", "blinkit", "amazonfresh", "bigbasket"]);
    assert!(result.ranked.windows(2).all(|w| w[0].price <= w[1].price));
    let range = result.price_range.expect("price range");
    assert_eq!(range.potential_savings(), 8.0);
}

#[tokio::test]
async fn strict_mode_surfaces_failures_without_fallback_data() {
    let a = Scripted::with_fallback(
        "a",
        Behavior::Fail,
        vec![listing("Tata Salt 1 kg", 28.0, "JioMart", "1 day")],
    );
    let manager = ServiceManager::new(
        vec![descriptor(a).with_fallback(false)],
        HealthPolicy::default(),
    )
    .expect("manager");

    let fan_out = manager
        .search(&Query::new("salt"), None, &CancellationToken::new())
        .await;
    assert!(matches!(fan_out.outcomes[0].kind, OutcomeKind::Failure { .. }));
}

#[tokio::test]
async fn cancelled_search_records_nothing_and_is_not_cached() {
    let slow = Scripted::new("slow", Behavior::Hang);
    let service = service(
        vec![ProviderDescriptor::new(slow).with_retry(RetryPolicy::no_retry())],
        HealthPolicy::default(),
    )
    .with_cache(ResultCache::new(Duration::from_secs(60)));

    let cancel = CancellationToken::new();
    let options = SearchOptions {
        cancel: Some(cancel.clone()),
        ..Default::default()
    };
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = service.search("milk", &options).await;
    assert!(result.ranked.is_empty());
    assert_eq!(service.status()[0].total_calls, 0);
}

#[tokio::test]
async fn cache_hit_skips_provider_calls() {
    let a = Scripted::new(
        "a",
        Behavior::Records(vec![listing("Madhur Sugar 1 kg", 52.0, "Blinkit", "10 mins")]),
    );
    let service = service(vec![descriptor(a.clone())], HealthPolicy::default())
        .with_cache(ResultCache::new(Duration::from_secs(60)));

    let first = service.search("Sugar", &SearchOptions::default()).await;
    let second = service.search("sugar", &SearchOptions::default()).await;
    assert_eq!(first, second);
    assert_eq!(a.calls(), 1);

    let subset = SearchOptions {
        providers: vec!["a".into()],
        ..Default::default()
    };
    service.search("sugar", &subset).await;
    assert_eq!(a.calls(), 2, "a different provider selection is a different key");
}
