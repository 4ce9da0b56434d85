// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A tenant's budget window, as observed at a point in time.
///
/// `window_seconds == 0` rolls the window on every call, bounding each
/// individual call's cost rather than a cumulative total; see
/// `requiem-budget` for how the checker interprets it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct BudgetState {
    /// Length of the rolling window in seconds. `0` means the budget does
    /// not reset and `used_cents` accumulates for the tenant's lifetime.
    pub window_seconds: u64,
    /// Hard cap for the window, in cents.
    pub limit_cents: i64,
    /// Amount already debited in the current window, in cents.
    pub used_cents: i64,
    /// Unix milliseconds the current window started at.
    pub window_started_at_ms: i64,
}

impl BudgetState {
    /// Cents remaining in the current window. Never negative.
    #[must_use]
    pub fn remaining_cents(&self) -> i64 {
        (self.limit_cents - self.used_cents).max(0)
    }

    /// Whether debiting `cost_cents` more would exceed `limit_cents`.
    #[must_use]
    pub fn would_exceed(&self, cost_cents: i64) -> bool {
        self.used_cents.saturating_add(cost_cents) > self.limit_cents
    }
}
