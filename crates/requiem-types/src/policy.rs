// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The policy gate's verdict for a single invocation: allow or deny, with the
/// rule trail that produced it.
///
/// Distinct from [`crate::ArbitrationDecision`], which picks a provider/model
/// rather than admitting or rejecting a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the invocation may proceed.
    pub allowed: bool,
    /// Human-readable justification for the decision.
    pub reason: String,
    /// Ids of every rule that matched while reaching this decision, in
    /// evaluation order.
    pub matched_rules: Vec<String>,
    /// Side conditions the caller must honor if it proceeds, e.g. a
    /// required redaction pass. Absent when the decision carries none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obligations: Option<BTreeMap<String, Value>>,
}

impl Decision {
    /// Construct an unconditional allow with no matched rules.
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into(), matched_rules: Vec::new(), obligations: None }
    }

    /// Construct a denial citing the rule(s) that matched.
    #[must_use]
    pub fn deny(reason: impl Into<String>, matched_rules: Vec<String>) -> Self {
        Self { allowed: false, reason: reason.into(), matched_rules, obligations: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_has_no_matched_rules_by_default() {
        let d = Decision::allow("ok");
        assert!(d.allowed);
        assert!(d.matched_rules.is_empty());
    }

    #[test]
    fn deny_carries_its_matched_rule() {
        let d = Decision::deny("viewer cannot write", vec!["viewer_forbids_side_effects".into()]);
        assert!(!d.allowed);
        assert_eq!(d.matched_rules, vec!["viewer_forbids_side_effects".to_string()]);
    }

    #[test]
    fn decision_round_trips_through_json() {
        let d = Decision::deny("nope", vec!["r1".into()]);
        let json = serde_json::to_string(&d).unwrap();
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
