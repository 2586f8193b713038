//! End-to-end admission scenarios through the gateway.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tollgate::{
    AdmissionDecision, AdmissionGateway, AuthError, CatalogHandle, Denial, DenialReason,
    EndpointPolicy, MemoryQuotaStore, MemoryUsageLog, PlanCatalog, PlanLimits, PlanTier,
    QuotaStore, RateLimiter, RateWindowState, StaticKeyAuthenticator, StoreError, StoreTimeout,
    UnixSeconds, UsageOutcome,
};

const T0: UnixSeconds = 1_700_000_000;

fn basic_3_per_min() -> PlanCatalog {
    PlanCatalog::builder().plan(PlanTier::Basic, PlanLimits::new(3, 100)).build()
}

fn gateway_over<S: QuotaStore + 'static>(
    store: Arc<S>,
    catalog: PlanCatalog,
) -> (AdmissionGateway<S>, Arc<MemoryUsageLog>) {
    let limiter = RateLimiter::new(store, CatalogHandle::new(catalog));
    let auth = StaticKeyAuthenticator::new()
        .with_key("fpk_k", "cust_1", "basic")
        .with_key("fpk_p", "cust_2", "premium");
    let usage = Arc::new(MemoryUsageLog::new());
    let gateway = AdmissionGateway::new(limiter, Arc::new(auth), usage.clone());
    (gateway, usage)
}

#[tokio::test]
async fn three_per_minute_scenario() {
    let (gateway, _) = gateway_over(Arc::new(MemoryQuotaStore::new()), basic_3_per_min());

    for (offset, expected_remaining) in [(0, 2), (1, 1), (2, 0)] {
        let admission = gateway.admit_at("fpk_k", "/api/v1/ping", T0 + offset).await.unwrap();
        assert_eq!(admission.quota.remaining_minute, expected_remaining);
    }

    let err = gateway.admit_at("fpk_k", "/api/v1/ping", T0 + 3).await.unwrap_err();
    match err {
        Denial::QuotaExceeded { reason, limit, reset_at } => {
            assert_eq!(reason, DenialReason::MinuteLimit);
            assert_eq!(limit, 3);
            assert_eq!(reset_at, T0 + 60);
        }
        other => panic!("expected quota denial, got {:?}", other),
    }

    // One window later the key counts from one again.
    let admission = gateway.admit_at("fpk_k", "/api/v1/ping", T0 + 61).await.unwrap();
    assert_eq!(admission.quota.remaining_minute, 2);
}

#[tokio::test]
async fn endpoint_override_beats_generous_plan() {
    let catalog = PlanCatalog::builder()
        .endpoint("/api/v1/batch", EndpointPolicy::minute_override(1))
        .build();
    let (gateway, _) = gateway_over(Arc::new(MemoryQuotaStore::new()), catalog);

    // Premium is 500/min by default, but the override pins this path to 1.
    gateway.admit_at("fpk_p", "/api/v1/batch", T0).await.unwrap();
    let err = gateway.admit_at("fpk_p", "/api/v1/batch", T0 + 10).await.unwrap_err();
    match err {
        Denial::QuotaExceeded { limit, .. } => assert_eq!(limit, 1),
        other => panic!("expected quota denial, got {:?}", other),
    }
}

#[tokio::test]
async fn denied_requests_do_not_consume_quota() {
    let (gateway, _) = gateway_over(Arc::new(MemoryQuotaStore::new()), basic_3_per_min());

    for i in 0..3 {
        gateway.admit_at("fpk_k", "/", T0 + i).await.unwrap();
    }
    for i in 3..20 {
        gateway.admit_at("fpk_k", "/", T0 + i).await.unwrap_err();
    }

    // Hammering the closed window must not push the day count past 3.
    let snapshot = gateway.usage_at("fpk_k", "/", T0 + 30).await.unwrap();
    assert_eq!(snapshot.remaining_day, 97);
}

#[tokio::test]
async fn tie_break_reports_minute_limit() {
    let catalog = PlanCatalog::builder().plan(PlanTier::Basic, PlanLimits::new(1, 1)).build();
    let (gateway, _) = gateway_over(Arc::new(MemoryQuotaStore::new()), catalog);

    gateway.admit_at("fpk_k", "/", T0).await.unwrap();
    // Both windows are now exhausted at once; the minute window wins.
    let err = gateway.admit_at("fpk_k", "/", T0 + 1).await.unwrap_err();
    match err {
        Denial::QuotaExceeded { reason, .. } => assert_eq!(reason, DenialReason::MinuteLimit),
        other => panic!("expected quota denial, got {:?}", other),
    }
}

struct BrokenStore;

#[async_trait]
impl QuotaStore for BrokenStore {
    async fn get_or_init(
        &self,
        _key: &str,
        _now: UnixSeconds,
    ) -> Result<RateWindowState, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn try_increment(
        &self,
        _key: &str,
        _now: UnixSeconds,
        _minute_limit: u32,
        _day_limit: u32,
    ) -> Result<(AdmissionDecision, RateWindowState), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn storage_outage_fails_closed_as_unavailable() {
    let (gateway, usage) = gateway_over(Arc::new(BrokenStore), basic_3_per_min());

    let err = gateway.admit_at("fpk_k", "/", T0).await.unwrap_err();
    assert!(err.is_unavailable());
    // Never reported as a quota denial: callers retry these differently.
    assert!(!err.is_quota_exceeded());
    assert_eq!(usage.entries()[0].outcome, UsageOutcome::Unavailable);
}

struct HangingStore;

#[async_trait]
impl QuotaStore for HangingStore {
    async fn get_or_init(
        &self,
        _key: &str,
        _now: UnixSeconds,
    ) -> Result<RateWindowState, StoreError> {
        std::future::pending().await
    }

    async fn try_increment(
        &self,
        _key: &str,
        _now: UnixSeconds,
        _minute_limit: u32,
        _day_limit: u32,
    ) -> Result<(AdmissionDecision, RateWindowState), StoreError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn hung_store_times_out_and_denies() {
    let store = Arc::new(StoreTimeout::new(HangingStore, Duration::from_millis(25)));
    let (gateway, _) = gateway_over(store, basic_3_per_min());

    let err = gateway.admit_at("fpk_k", "/", T0).await.unwrap_err();
    match err {
        Denial::Unavailable(store_err) => assert!(store_err.is_timeout()),
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn plan_gate_and_unknown_tier_fallback() {
    let catalog = PlanCatalog::builder()
        .endpoint("/api/v1/proxy", EndpointPolicy::requires(PlanTier::Premium))
        .build();
    let limiter = RateLimiter::new(Arc::new(MemoryQuotaStore::new()), CatalogHandle::new(catalog));
    let auth = StaticKeyAuthenticator::new()
        .with_key("fpk_b", "cust_1", "basic")
        .with_key("fpk_odd", "cust_2", "platinum");
    let usage = Arc::new(MemoryUsageLog::new());
    let gateway = AdmissionGateway::new(limiter, Arc::new(auth), usage.clone());

    let err = gateway.admit_at("fpk_b", "/api/v1/proxy", T0).await.unwrap_err();
    assert_eq!(
        err,
        Denial::PlanTooLow { required: PlanTier::Premium, current: PlanTier::Basic }
    );

    // An unrecognized tier resolves to basic, so the gate rejects it too.
    let err = gateway.admit_at("fpk_odd", "/api/v1/proxy", T0).await.unwrap_err();
    assert_eq!(
        err,
        Denial::PlanTooLow { required: PlanTier::Premium, current: PlanTier::Basic }
    );

    // But on an ungated endpoint the same key runs under basic limits.
    let admission = gateway.admit_at("fpk_odd", "/api/v1/ping", T0).await.unwrap();
    assert_eq!(admission.quota.remaining_minute, 59);
}

#[tokio::test]
async fn catalog_reload_tightens_limits_live() {
    let (gateway, _) = gateway_over(Arc::new(MemoryQuotaStore::new()), PlanCatalog::default());

    let admission = gateway.admit_at("fpk_k", "/", T0).await.unwrap();
    assert_eq!(admission.quota.remaining_minute, 59);

    gateway
        .limiter()
        .catalog()
        .replace(PlanCatalog::builder().plan(PlanTier::Basic, PlanLimits::new(1, 10)).build());

    let err = gateway.admit_at("fpk_k", "/", T0 + 1).await.unwrap_err();
    assert!(err.is_quota_exceeded());
}

#[tokio::test]
async fn every_outcome_writes_one_usage_record() {
    let catalog = PlanCatalog::builder()
        .plan(PlanTier::Basic, PlanLimits::new(1, 100))
        .endpoint("/api/v1/proxy", EndpointPolicy::requires(PlanTier::Premium))
        .build();
    let (gateway, usage) = gateway_over(Arc::new(MemoryQuotaStore::new()), catalog);

    gateway.admit_at("fpk_k", "/", T0).await.unwrap();
    gateway.admit_at("fpk_k", "/", T0 + 1).await.unwrap_err();
    gateway.admit_at("fpk_k", "/api/v1/proxy", T0 + 2).await.unwrap_err();
    gateway.admit_at("fpk_nobody", "/", T0 + 3).await.unwrap_err();

    let outcomes: Vec<UsageOutcome> =
        usage.entries().into_iter().map(|entry| entry.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            UsageOutcome::Admitted,
            UsageOutcome::QuotaDenied(DenialReason::MinuteLimit),
            UsageOutcome::PlanDenied,
            UsageOutcome::AuthFailed,
        ]
    );
}

#[tokio::test]
async fn auth_failure_does_not_touch_the_store() {
    let store = Arc::new(MemoryQuotaStore::new());
    let (gateway, _) = gateway_over(store.clone(), basic_3_per_min());

    let err = gateway.admit_at("fpk_nobody", "/", T0).await.unwrap_err();
    assert_eq!(err, Denial::Unauthorized(AuthError::InvalidKey));
    assert!(store.is_empty());
}
