//! Admission decision engine: resolves limits from the catalog and drives the
//! store's atomic increment.

use crate::clock::UnixSeconds;
use crate::error::StoreError;
use crate::plan::CatalogHandle;
use crate::store::QuotaStore;
use crate::window::{self, AdmissionDecision, QuotaSnapshot};
use std::sync::Arc;
use tracing::debug;

/// Decides admission for `(key, endpoint, plan)` triples.
///
/// Holds injected handles only — no ambient state — so independent limiters
/// can share a store, and tests can wire in whatever backend they need.
pub struct RateLimiter<S> {
    store: Arc<S>,
    catalog: CatalogHandle,
}

impl<S> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), catalog: self.catalog.clone() }
    }
}

impl<S: QuotaStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, catalog: CatalogHandle) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Admit or reject one request, consuming quota on admission.
    ///
    /// The minute limit is the endpoint override when one is configured,
    /// otherwise the plan's per-minute limit; overrides never touch the
    /// daily limit. Limit resolution reads a single catalog snapshot, and
    /// the store applies rollover, check, and increment as one atomic step.
    pub async fn check(
        &self,
        key: &str,
        endpoint: &str,
        plan_tier: &str,
        now: UnixSeconds,
    ) -> Result<AdmissionDecision, StoreError> {
        let catalog = self.catalog.snapshot();
        let limits = catalog.limits_for(plan_tier);
        let minute_limit = catalog.override_for(endpoint).unwrap_or(limits.requests_per_minute);
        let day_limit = limits.requests_per_day;

        let (decision, _) = self.store.try_increment(key, now, minute_limit, day_limit).await?;
        debug!(
            key,
            endpoint,
            admitted = decision.is_admitted(),
            remaining_minute = decision.quota().remaining_minute,
            "admission check"
        );
        Ok(decision)
    }

    /// Remaining/reset figures without consuming quota.
    ///
    /// Reads the stored state (initializing unseen keys) and applies the
    /// rollover view to a copy, so the answer matches what the next `check`
    /// would report without this call counting as a request.
    pub async fn peek(
        &self,
        key: &str,
        endpoint: &str,
        plan_tier: &str,
        now: UnixSeconds,
    ) -> Result<QuotaSnapshot, StoreError> {
        let catalog = self.catalog.snapshot();
        let limits = catalog.limits_for(plan_tier);
        let minute_limit = catalog.override_for(endpoint).unwrap_or(limits.requests_per_minute);

        let state = self.store.get_or_init(key, now).await?;
        Ok(window::preview(&state, now, minute_limit, limits.requests_per_day))
    }
}
