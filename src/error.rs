//! Error taxonomy: storage faults, authentication failures, and the
//! gateway's caller-facing denial.
//!
//! Only [`AdmissionGateway`] translates lower-level errors into a [`Denial`];
//! the store and limiter propagate their own types untouched, so nothing
//! below the gateway decides protocol-equivalent status codes.
//!
//! [`AdmissionGateway`]: crate::gateway::AdmissionGateway

use crate::clock::UnixSeconds;
use crate::plan::PlanTier;
use crate::window::DenialReason;
use std::time::Duration;

/// Storage-layer failure.
///
/// Policy on storage failure is fail-closed: the gateway denies the request
/// rather than letting unmetered traffic through during an outage, and it
/// surfaces the failure as [`Denial::Unavailable`] so callers can tell an
/// infrastructure fault from a quota denial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("quota store unavailable: {reason}")]
    Unavailable { reason: String },
    /// A store call exceeded its configured bound.
    #[error("quota store call timed out after {elapsed:?} (limit: {limit:?})")]
    Timeout { elapsed: Duration, limit: Duration },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable { reason: reason.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

/// Credential verification failure reported by an
/// [`Authenticator`](crate::gateway::Authenticator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("api key is not recognized")]
    InvalidKey,
    #[error("api key has expired")]
    ExpiredKey,
    #[error("api key is disabled")]
    DisabledKey,
}

/// Caller-facing rejection assembled by the gateway.
///
/// Variants map onto distinct protocol outcomes in an embedding server:
/// `QuotaExceeded` ≈ 429, `PlanTooLow` ≈ 403, `Unauthorized` ≈ 401,
/// `Unavailable` ≈ 503. The 429/503 split is load-bearing: a quota denial is
/// retryable after `reset_at`, an unavailable store is retryable on the
/// caller's own backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    /// A rate or daily limit was hit; retry after `reset_at`.
    #[error("{reason} limit of {limit} exceeded, window resets at {reset_at}")]
    QuotaExceeded {
        reason: DenialReason,
        limit: u32,
        reset_at: UnixSeconds,
    },
    /// The endpoint requires a higher plan tier than the key carries.
    #[error("endpoint requires the {required} plan, key is on {current}")]
    PlanTooLow { required: PlanTier, current: PlanTier },
    /// The credential failed verification.
    #[error("authentication failed: {0}")]
    Unauthorized(#[from] AuthError),
    /// The quota store failed; the request is denied without consuming quota.
    #[error("admission unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

impl Denial {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Denial::QuotaExceeded { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Denial::Unavailable(_))
    }

    /// Seconds until the violated window resets, for `Retry-After`-style
    /// metadata. Only quota denials carry a meaningful wait.
    pub fn retry_after(&self, now: UnixSeconds) -> Option<u64> {
        match self {
            Denial::QuotaExceeded { reset_at, .. } => Some(reset_at.saturating_sub(now)),
            _ => None,
        }
    }
}
