//! Fixed-window counters and the admission arithmetic that runs inside the
//! store's atomic step.
//!
//! The math lives here, separated from storage, so every [`QuotaStore`]
//! backend applies identical semantics: lazy rollover, minute check before
//! day check, no consumption on denial, remaining figures taken from the
//! post-increment state.
//!
//! [`QuotaStore`]: crate::store::QuotaStore

use crate::clock::UnixSeconds;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the per-minute accounting window.
pub const MINUTE_WINDOW_SECS: u64 = 60;
/// Length of the per-day accounting window.
pub const DAY_WINDOW_SECS: u64 = 86_400;

/// Durable per-key counter state: one count and one window start per window.
///
/// Counts only move forward within a window; the sole reset path is rollover,
/// which zeroes the count and advances the start to the observation time.
/// Serializable as-is so durable backends can persist it without a private
/// wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindowState {
    pub minute_count: u32,
    pub minute_window_start: UnixSeconds,
    pub day_count: u32,
    pub day_window_start: UnixSeconds,
}

impl RateWindowState {
    /// State for a previously-unseen key: zero counts, both windows opening
    /// at `now`.
    pub fn fresh(now: UnixSeconds) -> Self {
        Self {
            minute_count: 0,
            minute_window_start: now,
            day_count: 0,
            day_window_start: now,
        }
    }

    /// Lazy rollover: reset a window exactly when its period has elapsed at
    /// the moment of the attempt. `now` earlier than a stored start (clock
    /// skew) reads as "window not yet elapsed" and leaves it untouched.
    fn roll_over(&mut self, now: UnixSeconds) {
        if now.saturating_sub(self.minute_window_start) >= MINUTE_WINDOW_SECS {
            self.minute_count = 0;
            self.minute_window_start = now;
        }
        if now.saturating_sub(self.day_window_start) >= DAY_WINDOW_SECS {
            self.day_count = 0;
            self.day_window_start = now;
        }
    }
}

/// Which limit rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Per-minute limit reached.
    #[serde(rename = "per_minute")]
    MinuteLimit,
    /// Per-day limit reached.
    #[serde(rename = "per_day")]
    DayLimit,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::MinuteLimit => write!(f, "per_minute"),
            DenialReason::DayLimit => write!(f, "per_day"),
        }
    }
}

/// Remaining headroom and reset times, suitable for response metadata
/// (`X-RateLimit-*`-style headers in an embedding server).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    /// Requests left in the current minute window. Never negative.
    pub remaining_minute: u32,
    /// Requests left in the current day window. Never negative.
    pub remaining_day: u32,
    /// When the minute window rolls over.
    pub reset_minute: UnixSeconds,
    /// When the day window rolls over.
    pub reset_day: UnixSeconds,
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Request admitted; both counters were incremented.
    Admitted {
        /// Headroom after the increment.
        quota: QuotaSnapshot,
    },
    /// Request denied; counters were left untouched.
    Denied {
        /// Which window rejected the request.
        reason: DenialReason,
        /// The limit value that was exceeded.
        limit: u32,
        /// Headroom at denial time (the violated window reads zero).
        quota: QuotaSnapshot,
    },
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted { .. })
    }

    /// Quota metadata, present on both outcomes.
    pub fn quota(&self) -> &QuotaSnapshot {
        match self {
            AdmissionDecision::Admitted { quota } => quota,
            AdmissionDecision::Denied { quota, .. } => quota,
        }
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AdmissionDecision::Admitted { .. } => None,
            AdmissionDecision::Denied { reason, .. } => Some(*reason),
        }
    }
}

fn snapshot_of(state: &RateWindowState, minute_limit: u32, day_limit: u32) -> QuotaSnapshot {
    QuotaSnapshot {
        remaining_minute: minute_limit.saturating_sub(state.minute_count),
        remaining_day: day_limit.saturating_sub(state.day_count),
        reset_minute: state.minute_window_start + MINUTE_WINDOW_SECS,
        reset_day: state.day_window_start + DAY_WINDOW_SECS,
    }
}

/// The body of the store's atomic read-check-increment step.
///
/// Rolls both windows over independently, evaluates the minute limit strictly
/// before the day limit (a request exceeding both reports [`DenialReason::MinuteLimit`]),
/// and increments both counters only on admission. Remaining figures are
/// computed from the post-increment state. A limit of zero denies every
/// request for that window.
pub fn apply(
    state: &mut RateWindowState,
    now: UnixSeconds,
    minute_limit: u32,
    day_limit: u32,
) -> AdmissionDecision {
    state.roll_over(now);

    if state.minute_count >= minute_limit {
        return AdmissionDecision::Denied {
            reason: DenialReason::MinuteLimit,
            limit: minute_limit,
            quota: snapshot_of(state, minute_limit, day_limit),
        };
    }
    if state.day_count >= day_limit {
        return AdmissionDecision::Denied {
            reason: DenialReason::DayLimit,
            limit: day_limit,
            quota: snapshot_of(state, minute_limit, day_limit),
        };
    }

    state.minute_count += 1;
    state.day_count += 1;
    AdmissionDecision::Admitted { quota: snapshot_of(state, minute_limit, day_limit) }
}

/// Remaining/reset view without consuming quota.
///
/// Applies the rollover reading to a copy, so a key that has been idle past a
/// window boundary reports full headroom even though its stored state still
/// carries the stale window start.
pub fn preview(
    state: &RateWindowState,
    now: UnixSeconds,
    minute_limit: u32,
    day_limit: u32,
) -> QuotaSnapshot {
    let mut view = *state;
    view.roll_over(now);
    snapshot_of(&view, minute_limit, day_limit)
}
