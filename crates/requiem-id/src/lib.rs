// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-id
#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;
use ulid::Ulid;

// ---------------------------------------------------------------------------
// Prefixed ULIDs
// ---------------------------------------------------------------------------

/// Generate a prefixed ULID: `"{prefix}_{ULID}"`.
///
/// # Examples
///
/// ```
/// let id = requiem_id::new_id("mem");
/// assert!(id.starts_with("mem_"));
/// assert_eq!(id.len(), "mem_".len() + 26);
/// ```
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Ulid::new())
}

/// Generate a prefixed ULID using an explicit entropy/time source, for
/// deterministic tests. `millis` is the ULID timestamp component.
#[must_use]
pub fn new_id_at(prefix: &str, millis: u64, entropy: u128) -> String {
    format!("{prefix}_{}", Ulid::from_parts(millis, entropy))
}

/// Returns `true` if `id` has the shape `"{prefix}_{ULID}"`.
#[must_use]
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid_part| Ulid::from_string(ulid_part).is_ok())
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// A source of the current time.
///
/// Every time-sensitive subsystem (budgets, rate limiter, cache expiry,
/// circuit breaker) takes a `Clock` through its constructor instead of
/// reading wall time directly, so tests can pin it.
pub trait Clock: Send + Sync {
    /// Current time as milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Current time as an RFC-3339 UTC timestamp.
    fn now_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.now_millis())
            .unwrap_or_default()
            .to_rfc3339()
    }
}

/// A [`Clock`] backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A [`Clock`] whose time is set explicitly and only moves when told to.
///
/// Used by tests that need to pin `now()` or advance it deterministically.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Arc<AtomicU64>,
}

impl FixedClock {
    /// Create a clock pinned at `millis` (ms since epoch).
    #[must_use]
    pub fn new(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis.max(0) as u64)),
        }
    }

    /// Advance the pinned time by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        let cur = self.millis.load(Relaxed) as i64;
        self.millis.store((cur + delta_ms).max(0) as u64, Relaxed);
    }

    /// Set the pinned time to an absolute value.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis.max(0) as u64, Relaxed);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Relaxed) as i64
    }
}

/// Shared handle to a boxed [`Clock`], cheap to clone.
pub type SharedClock = Arc<dyn Clock>;

/// Convenience constructor for a shared [`SystemClock`].
#[must_use]
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

// ---------------------------------------------------------------------------
// Closed-set enums
// ---------------------------------------------------------------------------

/// Tenant role, a closed set derived from an authenticated source upstream —
/// never from the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    /// Read-only access.
    Viewer,
    /// Standard member access.
    Member,
    /// Administrative access.
    Admin,
}

impl TenantRole {
    /// All variants, in ascending privilege order.
    pub const ALL: [TenantRole; 3] = [TenantRole::Viewer, TenantRole::Member, TenantRole::Admin];
}

/// Deployment environment, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Automated test execution.
    Test,
    /// Local/interactive development.
    Development,
    /// Production traffic.
    Production,
}
