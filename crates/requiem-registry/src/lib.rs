// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-registry
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use jsonschema::Draft;
use requiem_error::{ErrorCode, RequiemError};
use requiem_types::ToolDefinition;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outcome of validating an input against a tool's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaValidation {
    /// Whether `input` satisfies the schema.
    pub valid: bool,
    /// Human-readable violation messages, empty when `valid`.
    pub errors: Vec<String>,
}

/// Compile `schema` (JSON Schema draft 2020-12) and validate `input` against
/// it, collecting every violation rather than stopping at the first.
#[must_use]
pub fn validate_tool_schema(schema: &Value, input: &Value) -> SchemaValidation {
    let compiled = match jsonschema::options().with_draft(Draft::Draft202012).build(schema) {
        Ok(v) => v,
        Err(err) => {
            return SchemaValidation {
                valid: false,
                errors: vec![format!("invalid schema: {err}")],
            }
        }
    };
    let errors: Vec<String> = compiled.iter_errors(input).map(|e| e.to_string()).collect();
    SchemaValidation { valid: errors.is_empty(), errors }
}

/// Process-wide registry of [`ToolDefinition`]s, keyed by name.
///
/// Cheap to clone: backed by an `Arc<DashMap<..>>`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, ToolDefinition>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: Arc::new(DashMap::new()) }
    }

    /// Register a tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ToolAlreadyRegistered`] if `definition.name` is
    /// already present; registrations never silently overwrite.
    pub fn register(&self, definition: ToolDefinition) -> requiem_error::Result<()> {
        if self.tools.contains_key(&definition.name) {
            return Err(RequiemError::new(
                ErrorCode::ToolAlreadyRegistered,
                format!("tool '{}' is already registered", definition.name),
            )
            .with_detail("tool_name", &definition.name));
        }
        debug!(tool = %definition.name, "registering tool");
        self.tools.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Resolve a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ToolNotFound`] if no tool named `name` is
    /// registered.
    pub fn resolve(&self, name: &str) -> requiem_error::Result<ToolDefinition> {
        self.tools
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| RequiemError::new(ErrorCode::ToolNotFound, format!("no tool named '{name}'")).with_detail("tool_name", name))
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Clear every registered tool. Test-only: production code registers
    /// once at startup and never needs to undo that.
    pub fn _clear_registry(&self) {
        self.tools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tool() -> ToolDefinition {
        ToolDefinition::new("search", "search the index").with_input_schema(json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
        }))
    }

    #[test]
    fn register_then_resolve_round_trips() {
        let reg = ToolRegistry::new();
        reg.register(sample_tool()).unwrap();
        let resolved = reg.resolve("search").unwrap();
        assert_eq!(resolved.name, "search");
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let reg = ToolRegistry::new();
        reg.register(sample_tool()).unwrap();
        let err = reg.register(sample_tool()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ToolAlreadyRegistered);
    }

    #[test]
    fn resolving_unknown_tool_fails() {
        let reg = ToolRegistry::new();
        let err = reg.resolve("missing").unwrap_err();
        assert_eq!(err.code, ErrorCode::ToolNotFound);
    }

    #[test]
    fn clear_registry_empties_the_map() {
        let reg = ToolRegistry::new();
        reg.register(sample_tool()).unwrap();
        reg._clear_registry();
        assert!(reg.is_empty());
    }

    #[test]
    fn schema_validation_reports_missing_required_field() {
        let schema = sample_tool().input_schema;
        let result = validate_tool_schema(&schema, &json!({}));
        assert!(!result.valid);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn schema_validation_passes_for_conforming_input() {
        let schema = sample_tool().input_schema;
        let result = validate_tool_schema(&schema, &json!({"query": "hello"}));
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }
}
