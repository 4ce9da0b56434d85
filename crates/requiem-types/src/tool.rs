// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Advisory cost estimate a tool reports for one call, consulted by the
/// budget pre-check in the policy gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CostHint {
    /// Estimated cost of one call, in cents.
    pub cost_cents: i64,
}

/// A tool the runtime can invoke on behalf of a caller.
///
/// Registered once (see `requiem-registry`), then resolved by name on every
/// invocation. The `deterministic` flag gates eligibility for the replay
/// cache; `idempotent` is advisory metadata for callers deciding whether to
/// retry a timed-out call. `side_effect` and `tenant_scoped` drive the
/// guardrail and policy checks that run before every invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolDefinition {
    /// Unique, stable tool name.
    pub name: String,
    /// Semver version of this tool definition.
    pub version: String,
    /// Human-readable summary of what the tool does.
    pub description: String,
    /// JSON Schema the tool's input must validate against.
    pub input_schema: Value,
    /// JSON Schema the tool's output must validate against.
    pub output_schema: Value,
    /// Whether calling this tool twice with the same input and environment
    /// produces the same output. Only deterministic tools are replay-cached.
    pub deterministic: bool,
    /// Whether calling this tool twice with the same input is safe (no
    /// double side effects).
    pub idempotent: bool,
    /// Whether invoking this tool has an effect observable outside the
    /// runtime (writes, sends, external state mutation).
    pub side_effect: bool,
    /// Whether this tool requires an invocation's `tenant_id` to be set.
    pub tenant_scoped: bool,
    /// Capability names a caller must hold, all of them, to invoke this tool.
    pub required_capabilities: Vec<String>,
    /// Advisory per-call cost estimate, consulted by the budget pre-check.
    pub cost_hint: CostHint,
    /// Content digest of this tool definition, if the registry computed one.
    /// A replay cache entry whose recorded digest differs from the current
    /// value is treated as stale.
    pub digest: Option<String>,
    /// Upper bound, in bytes, on this tool's serialized output.
    pub output_max_bytes: usize,
}

impl ToolDefinition {
    /// Construct a tool definition with the runtime's default output cap,
    /// requiring the caller to override fields that matter.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            description: description.into(),
            input_schema: Value::Object(serde_json::Map::new()),
            output_schema: Value::Object(serde_json::Map::new()),
            deterministic: false,
            idempotent: false,
            side_effect: false,
            tenant_scoped: false,
            required_capabilities: Vec::new(),
            cost_hint: CostHint::default(),
            digest: None,
            output_max_bytes: 1_048_576,
        }
    }

    /// Builder: set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Builder: set the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = schema;
        self
    }

    /// Builder: mark as deterministic (eligible for replay caching).
    #[must_use]
    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self
    }

    /// Builder: mark as idempotent.
    #[must_use]
    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// Builder: mark as side-effecting.
    #[must_use]
    pub fn side_effect(mut self) -> Self {
        self.side_effect = true;
        self
    }

    /// Builder: mark as requiring a tenant.
    #[must_use]
    pub fn tenant_scoped(mut self) -> Self {
        self.tenant_scoped = true;
        self
    }

    /// Builder: require a capability to invoke this tool.
    #[must_use]
    pub fn requires_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.push(capability.into());
        self
    }

    /// Builder: set the advisory cost estimate.
    #[must_use]
    pub fn with_cost_cents(mut self, cost_cents: i64) -> Self {
        self.cost_hint = CostHint { cost_cents };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_expected_fields() {
        let t = ToolDefinition::new("search", "search the index")
            .deterministic()
            .idempotent()
            .requires_capability("tool.search");
        assert!(t.deterministic);
        assert!(t.idempotent);
        assert_eq!(t.required_capabilities, vec!["tool.search".to_string()]);
    }

    #[test]
    fn defaults_are_non_side_effecting_and_untenant_scoped() {
        let t = ToolDefinition::new("write_file", "write a file");
        assert!(!t.deterministic);
        assert!(!t.side_effect);
        assert!(!t.tenant_scoped);
        assert!(t.required_capabilities.is_empty());
        assert_eq!(t.cost_hint.cost_cents, 0);
    }

    #[test]
    fn side_effect_and_tenant_scoped_builders_set_flags() {
        let t = ToolDefinition::new("delete_file", "delete a file").side_effect().tenant_scoped().with_cost_cents(5);
        assert!(t.side_effect);
        assert!(t.tenant_scoped);
        assert_eq!(t.cost_hint.cost_cents, 5);
    }
}
