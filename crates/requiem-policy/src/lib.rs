// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-policy
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_budget::BudgetChecker;
use requiem_capability::check_capabilities;
use requiem_guardrails::{GuardrailCheck, GuardrailEngine};
use requiem_id::TenantRole;
use requiem_types::{Decision, InvocationContext, ToolDefinition};

/// The fixed-order admission check for one invocation.
///
/// Composes, in order:
/// 1. tenant presence, if the tool is tenant-scoped;
/// 2. role vs. side-effect (viewers may not call side-effecting tools);
/// 3. capability subset (`tool.required_capabilities ⊆` the context's
///    granted capabilities);
/// 4. the guardrail engine's ordered rules;
/// 5. a non-debiting budget pre-check against `tool.cost_hint`.
///
/// Evaluation stops at the first denial. The gate is pure given the same
/// `context`, `tool`, and budget snapshot: it never mutates state. The
/// caller debits the budget separately, only once it commits to executing
/// the tool.
#[must_use]
pub fn evaluate_policy(
    context: &InvocationContext,
    tool: &ToolDefinition,
    guardrails: &GuardrailEngine,
    budget: &BudgetChecker,
) -> Decision {
    if tool.tenant_scoped && context.tenant_id.is_empty() {
        return Decision::deny("tenant-scoped tool requires a tenant_id", vec!["tenant_required".to_string()]);
    }

    if context.role == TenantRole::Viewer && tool.side_effect {
        return Decision::deny(
            format!("viewer role cannot invoke side-effecting tool '{}'", tool.name),
            vec!["viewer_forbids_side_effects".to_string()],
        );
    }

    if let Err(err) = check_capabilities(context, &tool.required_capabilities) {
        return Decision::deny(err.message, vec!["capability_missing".to_string()]);
    }

    let check = GuardrailCheck { tool_name: &tool.name, side_effect: tool.side_effect, tenant_scoped: tool.tenant_scoped };
    let guardrail_decision = guardrails.evaluate(context, &check);
    if !guardrail_decision.allowed {
        return Decision::deny(guardrail_decision.reason, guardrail_decision.matched_rules);
    }

    if let Err(err) = budget.peek(&context.tenant_id, tool.cost_hint.cost_cents) {
        return Decision::deny(err.message, vec!["budget_exceeded".to_string()]);
    }

    Decision::allow("all checks passed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use requiem_id::{Environment, FixedClock};
    use std::sync::Arc;

    fn ctx(role: TenantRole, tenant_id: &str, caps: &[&str]) -> InvocationContext {
        let mut c = InvocationContext::root(tenant_id, "trace1", role, Environment::Test);
        c.capabilities = caps.iter().map(|s| s.to_string()).collect();
        c
    }

    fn engine() -> GuardrailEngine {
        GuardrailEngine::with_defaults(Arc::new(FixedClock::new(0)), vec!["run_shell".to_string()])
    }

    fn budget() -> BudgetChecker {
        BudgetChecker::new(Arc::new(FixedClock::new(0)), 1000, 3600)
    }

    #[test]
    fn tenant_scoped_tool_without_tenant_is_denied_first() {
        let t = ToolDefinition::new("search", "search").tenant_scoped();
        let decision = evaluate_policy(&ctx(TenantRole::Admin, "", &[]), &t, &engine(), &budget());
        assert!(!decision.allowed);
        assert_eq!(decision.matched_rules, vec!["tenant_required".to_string()]);
    }

    #[test]
    fn viewer_is_denied_side_effecting_tool() {
        let t = ToolDefinition::new("write_file", "write").side_effect();
        let decision = evaluate_policy(&ctx(TenantRole::Viewer, "t1", &[]), &t, &engine(), &budget());
        assert!(!decision.allowed);
        assert_eq!(decision.matched_rules, vec!["viewer_forbids_side_effects".to_string()]);
    }

    #[test]
    fn missing_capability_is_denied() {
        let t = ToolDefinition::new("write_file", "write").requires_capability("tool.write_file");
        let decision = evaluate_policy(&ctx(TenantRole::Member, "t1", &[]), &t, &engine(), &budget());
        assert!(!decision.allowed);
        assert_eq!(decision.matched_rules, vec!["capability_missing".to_string()]);
    }

    #[test]
    fn hard_banned_tool_is_denied_by_guardrails() {
        let t = ToolDefinition::new("run_shell", "run a shell command");
        let decision = evaluate_policy(&ctx(TenantRole::Admin, "t1", &[]), &t, &engine(), &budget());
        assert!(!decision.allowed);
        assert_eq!(decision.matched_rules, vec!["hard_banned_tool_names".to_string()]);
    }

    #[test]
    fn budget_exhaustion_is_denied_last() {
        let t = ToolDefinition::new("search", "search").with_cost_cents(2000);
        let decision = evaluate_policy(&ctx(TenantRole::Member, "t1", &[]), &t, &engine(), &budget());
        assert!(!decision.allowed);
        assert_eq!(decision.matched_rules, vec!["budget_exceeded".to_string()]);
    }

    #[test]
    fn all_checks_passing_allows_the_call() {
        let t = ToolDefinition::new("search", "search").with_cost_cents(10);
        let decision = evaluate_policy(&ctx(TenantRole::Member, "t1", &[]), &t, &engine(), &budget());
        assert!(decision.allowed);
        assert!(decision.matched_rules.is_empty());
    }

    #[test]
    fn gate_is_pure_and_repeatable_given_the_same_budget_snapshot() {
        let t = ToolDefinition::new("search", "search").with_cost_cents(10);
        let b = budget();
        let c = ctx(TenantRole::Member, "t1", &[]);
        let e = engine();
        let first = evaluate_policy(&c, &t, &e, &b);
        let second = evaluate_policy(&c, &t, &e, &b);
        assert_eq!(first, second);
    }
}
