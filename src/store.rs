//! Quota state storage: the [`QuotaStore`] seam, an in-memory backend, and a
//! timeout decorator.
//!
//! The store owns [`RateWindowState`] records keyed by API-key identity;
//! nothing else mutates them. Backends are async so distributed stores
//! (Redis, SQL row locks) can slot in behind the same trait.

use crate::clock::UnixSeconds;
use crate::error::StoreError;
use crate::window::{self, AdmissionDecision, RateWindowState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Durable, concurrency-safe storage of per-key counters and window starts.
///
/// Contract: `try_increment` must serialize concurrent callers for the same
/// key — two concurrent requests must never both observe pre-increment state
/// when only one increment of headroom remains. A per-key lock, a row-level
/// transaction, or a compare-and-swap retry loop all satisfy this.
/// Cross-key calls carry no ordering requirement.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Return the existing state for `key`, or create one with zero counts
    /// and both windows opening at `now`, as a single atomic upsert.
    async fn get_or_init(
        &self,
        key: &str,
        now: UnixSeconds,
    ) -> Result<RateWindowState, StoreError>;

    /// Roll over, check, and (on admission) increment as one atomic step.
    ///
    /// Applies [`window::apply`] to the stored state under the backend's
    /// per-key serialization and returns the decision together with the
    /// state after the step. Denied attempts leave the counters untouched.
    async fn try_increment(
        &self,
        key: &str,
        now: UnixSeconds,
        minute_limit: u32,
        day_limit: u32,
    ) -> Result<(AdmissionDecision, RateWindowState), StoreError>;
}

/// In-memory backend: a mutex over the state map, which trivially satisfies
/// the per-key serialization contract.
///
/// Single-process only. Counters here are authoritative for this process
/// alone; a multi-instance deployment needs a shared backend behind the same
/// trait, because no in-process cache of counts may be treated as
/// authoritative across instances or restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuotaStore {
    data: Arc<Mutex<HashMap<String, RateWindowState>>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked. States are never expired here;
    /// retention is the embedding process's concern.
    pub fn len(&self) -> usize {
        self.data.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RateWindowState>>, StoreError> {
        self.data.lock().map_err(|_| StoreError::unavailable("quota state map poisoned"))
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn get_or_init(
        &self,
        key: &str,
        now: UnixSeconds,
    ) -> Result<RateWindowState, StoreError> {
        let mut guard = self.lock()?;
        Ok(*guard.entry(key.to_string()).or_insert_with(|| RateWindowState::fresh(now)))
    }

    async fn try_increment(
        &self,
        key: &str,
        now: UnixSeconds,
        minute_limit: u32,
        day_limit: u32,
    ) -> Result<(AdmissionDecision, RateWindowState), StoreError> {
        let mut guard = self.lock()?;
        let state = guard.entry(key.to_string()).or_insert_with(|| RateWindowState::fresh(now));
        let decision = window::apply(state, now, minute_limit, day_limit);
        Ok((decision, *state))
    }
}

/// Bounds every call of the wrapped store; an overrun surfaces
/// [`StoreError::Timeout`] instead of hanging the request thread.
///
/// The fate of the in-flight backend call is unknowable on timeout: if it
/// committed after the deadline, the quota was consumed. Consumption is tied
/// to the attempt, not to delivery of the answer.
#[derive(Debug, Clone)]
pub struct StoreTimeout<S> {
    inner: S,
    limit: Duration,
}

impl<S> StoreTimeout<S> {
    /// Wrap `inner` with a per-call bound. Panics if `limit` is zero.
    pub fn new(inner: S, limit: Duration) -> Self {
        assert!(limit > Duration::ZERO, "store timeout must be non-zero");
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        let start = Instant::now();
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { elapsed: start.elapsed(), limit: self.limit }),
        }
    }
}

#[async_trait]
impl<S: QuotaStore> QuotaStore for StoreTimeout<S> {
    async fn get_or_init(
        &self,
        key: &str,
        now: UnixSeconds,
    ) -> Result<RateWindowState, StoreError> {
        self.bounded(self.inner.get_or_init(key, now)).await
    }

    async fn try_increment(
        &self,
        key: &str,
        now: UnixSeconds,
        minute_limit: u32,
        day_limit: u32,
    ) -> Result<(AdmissionDecision, RateWindowState), StoreError> {
        self.bounded(self.inner.try_increment(key, now, minute_limit, day_limit)).await
    }
}
