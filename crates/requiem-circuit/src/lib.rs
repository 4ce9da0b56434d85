// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-circuit
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_id::SharedClock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// The circuit breaker's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests pass through normally.
    Closed,
    /// Requests are rejected without attempting the candidate.
    Open,
    /// A single trial request is allowed through to probe recovery.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at_ms: i64,
}

/// A registry of independent circuit breakers, one per candidate key.
///
/// Cheap to clone: the map is shared via `Arc` internally through `dashmap`.
#[derive(Clone)]
pub struct CircuitRegistry {
    breakers: std::sync::Arc<DashMap<String, Breaker>>,
    clock: SharedClock,
    failure_threshold: u32,
    cooldown_ms: i64,
}

impl CircuitRegistry {
    /// Create a registry. `failure_threshold` consecutive failures trip a
    /// breaker open; it stays open for `cooldown_ms` before allowing a
    /// half-open trial.
    #[must_use]
    pub fn new(clock: SharedClock, failure_threshold: u32, cooldown_ms: i64) -> Self {
        Self {
            breakers: std::sync::Arc::new(DashMap::new()),
            clock,
            failure_threshold: failure_threshold.max(1),
            cooldown_ms,
        }
    }

    /// Whether `key` is currently open (requests should be rejected).
    ///
    /// Has the side effect of promoting an open breaker to half-open once
    /// its cooldown has elapsed, so callers only need this one check.
    pub fn is_open(&self, key: &str) -> bool {
        let Some(mut entry) = self.breakers.get_mut(key) else {
            return false;
        };
        if entry.state == CircuitState::Open {
            let now = self.clock.now_millis();
            if now.saturating_sub(entry.opened_at_ms) >= self.cooldown_ms {
                entry.state = CircuitState::HalfOpen;
                debug!(key, "circuit half-open after cooldown");
            }
        }
        entry.state == CircuitState::Open
    }

    /// Record a successful call against `key`, closing its breaker.
    pub fn record_success(&self, key: &str) {
        let mut entry = self.breakers.entry(key.to_string()).or_insert(Breaker {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at_ms: 0,
        });
        entry.state = CircuitState::Closed;
        entry.consecutive_failures = 0;
    }

    /// Record a failed call against `key`, tripping the breaker open once
    /// `failure_threshold` consecutive failures accumulate (or immediately
    /// if the breaker was half-open, since a half-open trial failing means
    /// recovery has not happened).
    pub fn record_failure(&self, key: &str) {
        let mut entry = self.breakers.entry(key.to_string()).or_insert(Breaker {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at_ms: 0,
        });
        entry.consecutive_failures += 1;
        let should_open =
            entry.state == CircuitState::HalfOpen || entry.consecutive_failures >= self.failure_threshold;
        if should_open {
            entry.state = CircuitState::Open;
            entry.opened_at_ms = self.clock.now_millis();
            warn!(key, failures = entry.consecutive_failures, "circuit open");
        }
    }

    /// Current state of `key`'s breaker, or [`CircuitState::Closed`] if no
    /// calls have been recorded yet.
    #[must_use]
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers.get(key).map_or(CircuitState::Closed, |b| b.state)
    }
}
