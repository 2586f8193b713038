//! Admission gateway: composes credential verification, plan gating, the
//! quota check, and usage logging into a single admit/deny decision.
//!
//! The gateway is the only component that translates lower-level errors into
//! caller-facing outcomes. Everything it needs is injected at construction;
//! there is no ambient or global state.

use crate::clock::{Clock, SystemClock, UnixSeconds};
use crate::error::{AuthError, Denial};
use crate::limiter::RateLimiter;
use crate::store::QuotaStore;
use crate::window::{AdmissionDecision, DenialReason, QuotaSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Identity and plan attached to a verified credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// API-key identity; also the quota-accounting key.
    pub key_id: String,
    /// Owning customer.
    pub customer_id: String,
    /// Plan tier name as the account system reports it. Resolved against the
    /// catalog at admission time, unknown names included.
    pub plan_tier: String,
}

/// External credential verifier.
///
/// Given a raw credential, yields the [`Principal`] it identifies or one of
/// the [`AuthError`] outcomes. Token issuance and its cryptography live
/// entirely on the other side of this seam.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credential: &str) -> Result<Principal, AuthError>;
}

/// Lifecycle state of a key in [`StaticKeyAuthenticator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Expired,
    Disabled,
}

/// Table-backed authenticator for tests, demos, and single-tenant setups.
#[derive(Debug, Default)]
pub struct StaticKeyAuthenticator {
    keys: HashMap<String, (Principal, KeyStatus)>,
}

impl StaticKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active key whose identity is the credential itself.
    pub fn with_key(
        self,
        credential: impl Into<String>,
        customer_id: impl Into<String>,
        plan_tier: impl Into<String>,
    ) -> Self {
        self.with_key_status(credential, customer_id, plan_tier, KeyStatus::Active)
    }

    pub fn with_key_status(
        mut self,
        credential: impl Into<String>,
        customer_id: impl Into<String>,
        plan_tier: impl Into<String>,
        status: KeyStatus,
    ) -> Self {
        let credential = credential.into();
        let principal = Principal {
            key_id: credential.clone(),
            customer_id: customer_id.into(),
            plan_tier: plan_tier.into(),
        };
        self.keys.insert(credential, (principal, status));
        self
    }
}

#[async_trait]
impl Authenticator for StaticKeyAuthenticator {
    async fn authenticate(&self, credential: &str) -> Result<Principal, AuthError> {
        match self.keys.get(credential) {
            Some((principal, KeyStatus::Active)) => Ok(principal.clone()),
            Some((_, KeyStatus::Expired)) => Err(AuthError::ExpiredKey),
            Some((_, KeyStatus::Disabled)) => Err(AuthError::DisabledKey),
            None => Err(AuthError::InvalidKey),
        }
    }
}

/// How a gated request ended, as recorded in the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    Admitted,
    QuotaDenied(DenialReason),
    PlanDenied,
    AuthFailed,
    Unavailable,
}

/// One usage-log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Key identity, or empty when authentication failed (raw credentials
    /// are never echoed into the log).
    pub key_id: String,
    pub customer_id: String,
    pub endpoint: String,
    pub outcome: UsageOutcome,
    pub timestamp: UnixSeconds,
}

/// Fire-and-forget usage sink.
///
/// The signature is infallible: the decision is already fixed when `record`
/// runs, and no sink failure may alter it. Implementations swallow their own
/// errors.
#[async_trait]
pub trait UsageLogger: Send + Sync {
    async fn record(&self, entry: UsageRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageLog;

#[async_trait]
impl UsageLogger for NoopUsageLog {
    async fn record(&self, _entry: UsageRecord) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageLog;

#[async_trait]
impl UsageLogger for TracingUsageLog {
    async fn record(&self, entry: UsageRecord) {
        info!(
            key_id = %entry.key_id,
            customer_id = %entry.customer_id,
            endpoint = %entry.endpoint,
            outcome = ?entry.outcome,
            timestamp = entry.timestamp,
            "gated request"
        );
    }
}

/// Collects records in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryUsageLog {
    entries: Mutex<Vec<UsageRecord>>,
}

impl MemoryUsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<UsageRecord> {
        self.entries.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UsageLogger for MemoryUsageLog {
    async fn record(&self, entry: UsageRecord) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }
}

/// Successful admission: who was admitted and the headroom they have left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub principal: Principal,
    pub quota: QuotaSnapshot,
}

/// Orchestrates one admit/deny decision per request.
///
/// Flow: authenticate → plan-requirement gate → quota check → usage record.
/// The plan gate runs before the quota check, so a plan-denied request
/// consumes no quota; a storage failure denies fail-closed as
/// [`Denial::Unavailable`], never as a quota denial.
pub struct AdmissionGateway<S> {
    limiter: RateLimiter<S>,
    authenticator: Arc<dyn Authenticator>,
    usage: Arc<dyn UsageLogger>,
    clock: Arc<dyn Clock>,
}

impl<S: QuotaStore> AdmissionGateway<S> {
    pub fn new(
        limiter: RateLimiter<S>,
        authenticator: Arc<dyn Authenticator>,
        usage: Arc<dyn UsageLogger>,
    ) -> Self {
        Self::with_clock(limiter, authenticator, usage, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limiter: RateLimiter<S>,
        authenticator: Arc<dyn Authenticator>,
        usage: Arc<dyn UsageLogger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { limiter, authenticator, usage, clock }
    }

    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }

    /// Admit or deny a request carrying `credential` against `endpoint`.
    pub async fn admit(&self, credential: &str, endpoint: &str) -> Result<Admission, Denial> {
        self.admit_at(credential, endpoint, self.clock.now_unix()).await
    }

    /// [`admit`](Self::admit) with an explicit observation time.
    pub async fn admit_at(
        &self,
        credential: &str,
        endpoint: &str,
        now: UnixSeconds,
    ) -> Result<Admission, Denial> {
        let principal = match self.authenticator.authenticate(credential).await {
            Ok(principal) => principal,
            Err(err) => {
                self.record(None, endpoint, UsageOutcome::AuthFailed, now).await;
                return Err(Denial::Unauthorized(err));
            }
        };

        let catalog = self.limiter.catalog().snapshot();
        if let Some(required) = catalog.required_plan_for(endpoint) {
            let current = catalog.resolve_tier(&principal.plan_tier);
            if current < required {
                self.record(Some(&principal), endpoint, UsageOutcome::PlanDenied, now).await;
                return Err(Denial::PlanTooLow { required, current });
            }
        }

        match self
            .limiter
            .check(&principal.key_id, endpoint, &principal.plan_tier, now)
            .await
        {
            Ok(AdmissionDecision::Admitted { quota }) => {
                self.record(Some(&principal), endpoint, UsageOutcome::Admitted, now).await;
                Ok(Admission { principal, quota })
            }
            Ok(AdmissionDecision::Denied { reason, limit, quota }) => {
                self.record(Some(&principal), endpoint, UsageOutcome::QuotaDenied(reason), now)
                    .await;
                let reset_at = match reason {
                    DenialReason::MinuteLimit => quota.reset_minute,
                    DenialReason::DayLimit => quota.reset_day,
                };
                Err(Denial::QuotaExceeded { reason, limit, reset_at })
            }
            Err(store_err) => {
                self.record(Some(&principal), endpoint, UsageOutcome::Unavailable, now).await;
                Err(Denial::Unavailable(store_err))
            }
        }
    }

    /// Remaining/reset figures for a credential without consuming quota.
    pub async fn usage(&self, credential: &str, endpoint: &str) -> Result<QuotaSnapshot, Denial> {
        self.usage_at(credential, endpoint, self.clock.now_unix()).await
    }

    /// [`usage`](Self::usage) with an explicit observation time.
    pub async fn usage_at(
        &self,
        credential: &str,
        endpoint: &str,
        now: UnixSeconds,
    ) -> Result<QuotaSnapshot, Denial> {
        let principal = self.authenticator.authenticate(credential).await?;
        let snapshot = self
            .limiter
            .peek(&principal.key_id, endpoint, &principal.plan_tier, now)
            .await?;
        Ok(snapshot)
    }

    async fn record(
        &self,
        principal: Option<&Principal>,
        endpoint: &str,
        outcome: UsageOutcome,
        now: UnixSeconds,
    ) {
        let entry = UsageRecord {
            key_id: principal.map(|p| p.key_id.clone()).unwrap_or_default(),
            customer_id: principal.map(|p| p.customer_id.clone()).unwrap_or_default(),
            endpoint: endpoint.to_string(),
            outcome,
            timestamp: now,
        };
        self.usage.record(entry).await;
    }
}
