//! Plan tiers, quota limits, and the endpoint policy catalog.
//!
//! The catalog is a static table resolved at admission time: per-tier limits,
//! plus per-endpoint policies that can override the minute limit or demand a
//! minimum tier. [`CatalogHandle`] wraps it in an `ArcSwap` so operators can
//! swap in a new table at runtime without restarting the limiter or gateway.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Named service level. Ordering follows upgrade order, so plan-requirement
/// gates compare with `<`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Premium,
    Enterprise,
}

impl PlanTier {
    /// Parse the external name of a tier. `None` for anything unrecognized;
    /// fallback policy belongs to the catalog, not the parser.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(PlanTier::Basic),
            "premium" => Some(PlanTier::Premium),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Basic => "basic",
            PlanTier::Premium => "premium",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier quota limits. Immutable once loaded into a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

impl PlanLimits {
    pub fn new(requests_per_minute: u32, requests_per_day: u32) -> Self {
        Self { requests_per_minute, requests_per_day }
    }
}

/// Per-endpoint policy: an optional minute-limit override (the daily limit is
/// never overridden) and an optional minimum plan tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    #[serde(default)]
    pub per_minute_override: Option<u32>,
    #[serde(default)]
    pub required_plan: Option<PlanTier>,
}

impl EndpointPolicy {
    /// Policy that only overrides the minute limit.
    pub fn minute_override(limit: u32) -> Self {
        Self { per_minute_override: Some(limit), required_plan: None }
    }

    /// Policy that only demands a minimum tier.
    pub fn requires(tier: PlanTier) -> Self {
        Self { per_minute_override: None, required_plan: Some(tier) }
    }
}

// Last-resort limits when a catalog was built without a basic entry.
const FALLBACK_LIMITS: PlanLimits = PlanLimits { requests_per_minute: 60, requests_per_day: 10_000 };

/// Static mapping from plan tier to limits plus endpoint policies.
///
/// Lookups never fail: an unknown tier name falls back to [`PlanTier::Basic`]
/// limits with a warning, never an error to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCatalog {
    plans: HashMap<PlanTier, PlanLimits>,
    #[serde(default)]
    endpoints: HashMap<String, EndpointPolicy>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let mut plans = HashMap::new();
        plans.insert(PlanTier::Basic, PlanLimits::new(60, 10_000));
        plans.insert(PlanTier::Premium, PlanLimits::new(500, 50_000));
        plans.insert(PlanTier::Enterprise, PlanLimits::new(2_000, 200_000));
        Self { plans, endpoints: HashMap::new() }
    }
}

impl PlanCatalog {
    pub fn builder() -> PlanCatalogBuilder {
        PlanCatalogBuilder::default()
    }

    /// Load a catalog from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Resolve an external tier name, falling back to `basic` for anything
    /// unrecognized. The anomaly is logged, not propagated.
    pub fn resolve_tier(&self, name: &str) -> PlanTier {
        PlanTier::from_name(name).unwrap_or_else(|| {
            warn!(plan_tier = name, "unknown plan tier, falling back to basic limits");
            PlanTier::Basic
        })
    }

    /// Limits for an external tier name. Never errors.
    pub fn limits_for(&self, name: &str) -> PlanLimits {
        self.limits_for_tier(self.resolve_tier(name))
    }

    /// Limits for a resolved tier. A tier missing from the table uses the
    /// basic entry; a catalog with no basic entry uses built-in defaults.
    pub fn limits_for_tier(&self, tier: PlanTier) -> PlanLimits {
        self.plans
            .get(&tier)
            .or_else(|| self.plans.get(&PlanTier::Basic))
            .copied()
            .unwrap_or(FALLBACK_LIMITS)
    }

    /// Per-minute override configured for an endpoint, if any. Absence means
    /// "use the plan default".
    pub fn override_for(&self, endpoint: &str) -> Option<u32> {
        self.endpoints.get(endpoint).and_then(|policy| policy.per_minute_override)
    }

    /// Minimum tier an endpoint demands, if any.
    pub fn required_plan_for(&self, endpoint: &str) -> Option<PlanTier> {
        self.endpoints.get(endpoint).and_then(|policy| policy.required_plan)
    }
}

/// Builder for [`PlanCatalog`]. A builder with no plans yields the default
/// tier table so endpoint-only configs stay short.
#[derive(Debug, Default)]
pub struct PlanCatalogBuilder {
    plans: HashMap<PlanTier, PlanLimits>,
    endpoints: HashMap<String, EndpointPolicy>,
}

impl PlanCatalogBuilder {
    pub fn plan(mut self, tier: PlanTier, limits: PlanLimits) -> Self {
        self.plans.insert(tier, limits);
        self
    }

    pub fn endpoint(mut self, path: impl Into<String>, policy: EndpointPolicy) -> Self {
        self.endpoints.insert(path.into(), policy);
        self
    }

    pub fn build(self) -> PlanCatalog {
        let plans = if self.plans.is_empty() {
            PlanCatalog::default().plans
        } else {
            self.plans
        };
        PlanCatalog { plans, endpoints: self.endpoints }
    }
}

/// Shared, live-swappable catalog handle.
///
/// Reads are lock-free snapshots; one admission check reads one snapshot, so
/// a concurrent [`replace`](CatalogHandle::replace) never mixes limits from
/// two catalogs within a single decision.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    inner: Arc<ArcSwap<PlanCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: PlanCatalog) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(catalog)) }
    }

    /// Current catalog. Cheap Arc clone.
    pub fn snapshot(&self) -> Arc<PlanCatalog> {
        self.inner.load_full()
    }

    /// Swap in a new catalog. In-flight checks keep the snapshot they
    /// already loaded; subsequent checks see the replacement.
    pub fn replace(&self, catalog: PlanCatalog) {
        self.inner.store(Arc::new(catalog));
    }
}

impl Default for CatalogHandle {
    fn default() -> Self {
        Self::new(PlanCatalog::default())
    }
}

impl From<PlanCatalog> for CatalogHandle {
    fn from(catalog: PlanCatalog) -> Self {
        Self::new(catalog)
    }
}
