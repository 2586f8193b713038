#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Tollgate
//!
//! Per-API-key admission control: fixed minute/day quota windows over
//! pluggable storage, with a gateway that turns authentication, plan lookup,
//! and the quota check into one admit/deny decision.
//!
//! ## Features
//!
//! - **Windowed accounting** with lazy rollover: counters reset on access,
//!   never by a background sweep
//! - **Pluggable storage** behind an async [`QuotaStore`] trait, with an
//!   in-memory backend and a timeout decorator included
//! - **Plan catalog** with per-endpoint overrides, minimum-tier gates, and
//!   live reload via [`CatalogHandle`]
//! - **Fail-closed** on storage faults: outages deny distinctly, never admit
//!   and never masquerade as quota denials
//! - **Tower middleware** so the gate drops into an existing service stack
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tollgate::{
//!     AdmissionGateway, CatalogHandle, MemoryQuotaStore, NoopUsageLog, PlanCatalog,
//!     RateLimiter, StaticKeyAuthenticator,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let limiter = RateLimiter::new(
//!         Arc::new(MemoryQuotaStore::new()),
//!         CatalogHandle::new(PlanCatalog::default()),
//!     );
//!     let auth = StaticKeyAuthenticator::new().with_key("fpk_demo", "cust_1", "premium");
//!     let gateway = AdmissionGateway::new(limiter, Arc::new(auth), Arc::new(NoopUsageLog));
//!
//!     let admission = gateway.admit("fpk_demo", "/api/v1/ping").await.unwrap();
//!     assert_eq!(admission.quota.remaining_minute, 499);
//! }
//! ```

pub mod clock;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod middleware;
pub mod plan;
pub mod store;
pub mod window;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock, UnixSeconds};
pub use error::{AuthError, Denial, StoreError};
pub use gateway::{
    Admission, AdmissionGateway, Authenticator, KeyStatus, MemoryUsageLog, NoopUsageLog,
    Principal, StaticKeyAuthenticator, TracingUsageLog, UsageLogger, UsageOutcome, UsageRecord,
};
pub use limiter::RateLimiter;
pub use middleware::{AdmissionLayer, AdmissionService, GateError, GatedRequest};
pub use plan::{
    CatalogHandle, EndpointPolicy, PlanCatalog, PlanCatalogBuilder, PlanLimits, PlanTier,
};
pub use store::{MemoryQuotaStore, QuotaStore, StoreTimeout};
pub use window::{
    AdmissionDecision, DenialReason, QuotaSnapshot, RateWindowState, DAY_WINDOW_SECS,
    MINUTE_WINDOW_SECS,
};
