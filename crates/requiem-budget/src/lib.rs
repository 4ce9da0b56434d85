// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-budget
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_error::RequiemError;
use requiem_id::SharedClock;
use requiem_types::BudgetState;
use std::sync::Arc;

/// Per-tenant, windowed budget enforcement.
///
/// Cheap to clone: shared state lives behind an `Arc<DashMap<..>>`.
#[derive(Clone)]
pub struct BudgetChecker {
    windows: Arc<DashMap<String, BudgetState>>,
    clock: SharedClock,
    default_limit_cents: i64,
    default_window_seconds: u64,
}

impl BudgetChecker {
    /// Create a checker. New tenants start with `default_limit_cents` per
    /// `default_window_seconds` (`0` meaning the window rolls every call).
    #[must_use]
    pub fn new(clock: SharedClock, default_limit_cents: i64, default_window_seconds: u64) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            clock,
            default_limit_cents,
            default_window_seconds,
        }
    }

    /// Explicitly configure a tenant's limit and window, overriding the
    /// defaults new tenants would otherwise receive.
    pub fn configure_tenant(&self, tenant_id: &str, limit_cents: i64, window_seconds: u64) {
        let now = self.clock.now_millis();
        self.windows.insert(
            tenant_id.to_string(),
            BudgetState {
                window_seconds,
                limit_cents,
                used_cents: 0,
                window_started_at_ms: now,
            },
        );
    }

    /// Roll a tenant's window over if its `window_seconds` has elapsed since
    /// `window_started_at_ms`. A `window_seconds` of `0` rolls on every
    /// call: each debit is checked against a freshly-zeroed window, so the
    /// limit bounds a single call's cost rather than a cumulative total.
    fn maybe_reset(&self, state: &mut BudgetState) {
        let now = self.clock.now_millis();
        let window_ms = (state.window_seconds as i64).saturating_mul(1000);
        if now.saturating_sub(state.window_started_at_ms) >= window_ms {
            state.used_cents = 0;
            state.window_started_at_ms = now;
        }
    }

    /// Atomically check whether `cost_cents` fits in the tenant's current
    /// window and, if so, debit it.
    ///
    /// # Errors
    ///
    /// Returns [`RequiemError::budget_exceeded`] if debiting would exceed
    /// the tenant's limit. The tenant is left undebited in that case.
    pub fn check_and_debit(&self, tenant_id: &str, cost_cents: i64) -> requiem_error::Result<BudgetState> {
        let now = self.clock.now_millis();
        let mut entry = self.windows.entry(tenant_id.to_string()).or_insert_with(|| BudgetState {
            window_seconds: self.default_window_seconds,
            limit_cents: self.default_limit_cents,
            used_cents: 0,
            window_started_at_ms: now,
        });

        self.maybe_reset(&mut entry);

        if entry.would_exceed(cost_cents) {
            return Err(RequiemError::budget_exceeded(tenant_id, cost_cents));
        }

        entry.used_cents += cost_cents;
        Ok(*entry)
    }

    /// Current budget state for a tenant, without debiting.
    #[must_use]
    pub fn state(&self, tenant_id: &str) -> Option<BudgetState> {
        self.windows.get(tenant_id).map(|e| *e)
    }

    /// Check whether `cost_cents` would fit in the tenant's current window
    /// without debiting it. Used by the policy gate, which must be pure:
    /// the actual debit happens only once the pipeline commits to
    /// executing the tool.
    ///
    /// # Errors
    ///
    /// Returns [`RequiemError::budget_exceeded`] under the same condition
    /// [`BudgetChecker::check_and_debit`] would.
    pub fn peek(&self, tenant_id: &str, cost_cents: i64) -> requiem_error::Result<()> {
        let now = self.clock.now_millis();
        let mut state = self
            .windows
            .get(tenant_id)
            .map(|e| *e)
            .unwrap_or(BudgetState {
                window_seconds: self.default_window_seconds,
                limit_cents: self.default_limit_cents,
                used_cents: 0,
                window_started_at_ms: now,
            });
        self.maybe_reset(&mut state);
        if state.would_exceed(cost_cents) {
            Err(RequiemError::budget_exceeded(tenant_id, cost_cents))
        } else {
            Ok(())
        }
    }
}

/// A token-bucket rate limiter sharing the runtime's injected clock.
///
/// Independent of [`BudgetChecker`]: budgets bound cost, this bounds call
/// rate. Both are consulted by the policy gate.
pub struct TokenBucket {
    capacity: f64,
    refill_per_ms: f64,
    tokens: std::sync::Mutex<(f64, i64)>,
    clock: SharedClock,
}

impl TokenBucket {
    /// Create a bucket holding up to `capacity` tokens, refilling at
    /// `refill_per_sec` tokens per second.
    #[must_use]
    pub fn new(clock: SharedClock, capacity: f64, refill_per_sec: f64) -> Self {
        let now = clock.now_millis();
        Self {
            capacity,
            refill_per_ms: refill_per_sec / 1000.0,
            tokens: std::sync::Mutex::new((capacity, now)),
            clock,
        }
    }

    /// Attempt to take one token. Returns `true` if a token was available.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now_millis();
        let mut guard = self.tokens.lock().expect("token bucket lock poisoned");
        let (tokens, last_refill) = &mut *guard;
        let elapsed = (now - *last_refill).max(0) as f64;
        *tokens = (*tokens + elapsed * self.refill_per_ms).min(self.capacity);
        *last_refill = now;
        if *tokens >= 1.0 {
            *tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use requiem_id::FixedClock;

    fn checker(limit: i64, window_seconds: u64) -> BudgetChecker {
        BudgetChecker::new(Arc::new(FixedClock::new(0)), limit, window_seconds)
    }

    #[test]
    fn debits_within_limit_succeed() {
        let c = checker(100, 3600);
        let state = c.check_and_debit("t1", 40).unwrap();
        assert_eq!(state.used_cents, 40);
    }

    #[test]
    fn debit_exceeding_limit_is_rejected_and_not_applied() {
        let c = checker(100, 3600);
        c.check_and_debit("t1", 90).unwrap();
        let err = c.check_and_debit("t1", 20).unwrap_err();
        assert_eq!(err.code, requiem_error::ErrorCode::BudgetExceeded);
        assert_eq!(c.state("t1").unwrap().used_cents, 90);
    }

    #[test]
    fn peek_never_mutates_state() {
        let c = checker(100, 3600);
        c.peek("t1", 90).unwrap();
        assert!(c.state("t1").is_none());
        c.check_and_debit("t1", 10).unwrap();
        c.peek("t1", 90).unwrap_err();
        assert_eq!(c.state("t1").unwrap().used_cents, 10);
    }

    #[test]
    fn window_rolls_over_after_elapsed_time() {
        let clock = Arc::new(FixedClock::new(0));
        let c = BudgetChecker::new(clock.clone(), 100, 10);
        c.check_and_debit("t1", 90).unwrap();
        clock.advance(10_000);
        let state = c.check_and_debit("t1", 50).unwrap();
        assert_eq!(state.used_cents, 50);
    }

    #[test]
    fn zero_window_rolls_over_on_every_call() {
        let clock = Arc::new(FixedClock::new(0));
        let c = BudgetChecker::new(clock.clone(), 100, 0);
        c.check_and_debit("t1", 90).unwrap();
        // window_seconds == 0 means each call sees a freshly-reset window,
        // so a second call within the same cap still succeeds.
        let state = c.check_and_debit("t1", 90).unwrap();
        assert_eq!(state.used_cents, 90);
    }

    #[test]
    fn zero_window_still_rejects_a_single_call_over_limit() {
        let c = checker(100, 0);
        let err = c.check_and_debit("t1", 150).unwrap_err();
        assert_eq!(err.code, requiem_error::ErrorCode::BudgetExceeded);
    }

    #[test]
    fn token_bucket_refills_over_time() {
        let clock = Arc::new(FixedClock::new(0));
        let bucket = TokenBucket::new(clock.clone(), 2.0, 1.0);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
        clock.advance(1_000);
        assert!(bucket.try_acquire());
    }
}
