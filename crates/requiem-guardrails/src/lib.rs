// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-guardrails
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_budget::TokenBucket;
use requiem_id::{SharedClock, TenantRole};
use requiem_types::InvocationContext;
use std::sync::Arc;

/// Default token-bucket capacity for the per-tenant rate-limit guardrail.
pub const DEFAULT_RATE_LIMIT_CAPACITY: f64 = 100.0;

/// Default token-bucket refill rate, in tokens per second.
pub const DEFAULT_RATE_LIMIT_REFILL_PER_SEC: f64 = 10.0;

/// The subset of a tool's metadata a guardrail needs to make a decision,
/// independent of the full `ToolDefinition` so this crate doesn't need to
/// depend on the registry.
#[derive(Debug, Clone, Copy)]
pub struct GuardrailCheck<'a> {
    /// Name of the tool being invoked.
    pub tool_name: &'a str,
    /// Whether the tool has side effects.
    pub side_effect: bool,
    /// Whether the tool requires a tenant to be present.
    pub tenant_scoped: bool,
}

/// What a single guardrail rule decides for a given context/tool pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailEffect {
    /// The rule has no objection.
    Allow,
    /// The rule denies the call, with a human-readable reason.
    Deny(String),
    /// Reserved for future parameter rewriting; currently treated like
    /// `Allow` by [`GuardrailEngine::evaluate`].
    Transform,
}

/// Outcome of evaluating the full ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardrailDecision {
    /// Whether the call is allowed to proceed.
    pub allowed: bool,
    /// Human-readable explanation of the decision.
    pub reason: String,
    /// Ids of every rule that matched (fired an effect other than `Allow`),
    /// in evaluation order. First-deny-wins: evaluation stops at the first
    /// `Deny`, so only one entry accompanies a denial.
    pub matched_rules: Vec<String>,
}

type RuleFn = dyn Fn(&InvocationContext, &GuardrailCheck) -> GuardrailEffect + Send + Sync;

/// A single named guardrail rule.
pub struct GuardrailRule {
    id: String,
    check: Arc<RuleFn>,
}

impl GuardrailRule {
    /// Construct a rule from its id and decision function.
    pub fn new(
        id: impl Into<String>,
        check: impl Fn(&InvocationContext, &GuardrailCheck) -> GuardrailEffect + Send + Sync + 'static,
    ) -> Self {
        Self { id: id.into(), check: Arc::new(check) }
    }
}

/// Per-tenant token buckets shared across the rate-limit guardrail.
#[derive(Clone)]
struct RateLimiterRegistry {
    buckets: Arc<DashMap<String, Arc<TokenBucket>>>,
    clock: SharedClock,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiterRegistry {
    fn new(clock: SharedClock, capacity: f64, refill_per_sec: f64) -> Self {
        Self { buckets: Arc::new(DashMap::new()), clock, capacity, refill_per_sec }
    }

    fn try_acquire(&self, tenant_id: &str) -> bool {
        let bucket = self
            .buckets
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.clock.clone(), self.capacity, self.refill_per_sec)))
            .clone();
        bucket.try_acquire()
    }
}

/// An ordered list of guardrail rules, evaluated first-deny-wins.
pub struct GuardrailEngine {
    rules: Vec<GuardrailRule>,
}

impl GuardrailEngine {
    /// Create an engine with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule to the end of the evaluation order.
    pub fn add_rule(&mut self, rule: GuardrailRule) {
        self.rules.push(rule);
    }

    /// Build the runtime's four default guardrails, in the order the
    /// policy gate expects them evaluated:
    ///
    /// 1. forbid side-effect tools for the viewer role;
    /// 2. per-tenant token-bucket rate limit;
    /// 3. deny any tool name in `banned_names`;
    /// 4. require `tenant_id` for tenant-scoped tools.
    #[must_use]
    pub fn with_defaults(clock: SharedClock, banned_names: Vec<String>) -> Self {
        let mut engine = Self::new();

        engine.add_rule(GuardrailRule::new("viewer_forbids_side_effects", |ctx, check| {
            if ctx.role == TenantRole::Viewer && check.side_effect {
                GuardrailEffect::Deny(format!("viewer role cannot invoke side-effecting tool '{}'", check.tool_name))
            } else {
                GuardrailEffect::Allow
            }
        }));

        let limiter = RateLimiterRegistry::new(clock, DEFAULT_RATE_LIMIT_CAPACITY, DEFAULT_RATE_LIMIT_REFILL_PER_SEC);
        engine.add_rule(GuardrailRule::new("per_tenant_rate_limit", move |ctx, _check| {
            if limiter.try_acquire(&ctx.tenant_id) {
                GuardrailEffect::Allow
            } else {
                GuardrailEffect::Deny(format!("tenant '{}' exceeded its rate limit", ctx.tenant_id))
            }
        }));

        engine.add_rule(GuardrailRule::new("hard_banned_tool_names", move |_ctx, check| {
            if banned_names.iter().any(|n| n == check.tool_name) {
                GuardrailEffect::Deny(format!("tool '{}' is hard-banned", check.tool_name))
            } else {
                GuardrailEffect::Allow
            }
        }));

        engine.add_rule(GuardrailRule::new("tenant_scoped_requires_tenant_id", |ctx, check| {
            if check.tenant_scoped && ctx.tenant_id.is_empty() {
                GuardrailEffect::Deny("tenant-scoped tool requires a tenant_id".to_string())
            } else {
                GuardrailEffect::Allow
            }
        }));

        engine
    }

    /// Evaluate every rule in order until one denies, or all pass.
    #[must_use]
    pub fn evaluate(&self, context: &InvocationContext, check: &GuardrailCheck) -> GuardrailDecision {
        let mut matched_rules = Vec::new();
        for rule in &self.rules {
            match (rule.check)(context, check) {
                GuardrailEffect::Deny(reason) => {
                    matched_rules.push(rule.id.clone());
                    return GuardrailDecision { allowed: false, reason, matched_rules };
                }
                GuardrailEffect::Transform => matched_rules.push(rule.id.clone()),
                GuardrailEffect::Allow => {}
            }
        }
        GuardrailDecision { allowed: true, reason: "no guardrail denied".to_string(), matched_rules }
    }

    /// Number of rules currently registered.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new()
    }
}
