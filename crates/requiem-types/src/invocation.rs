// SPDX-License-Identifier: MIT OR Apache-2.0

use requiem_id::{Environment, TenantRole};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The per-invocation context threaded through every pipeline stage.
///
/// Resolved once at the boundary (from an authenticated source, never from
/// the request body) and carried by value/reference through resolve,
/// validate, sandbox, policy, replay, execute, and record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvocationContext {
    /// Identifier for the tenant this invocation is scoped to.
    pub tenant_id: String,
    /// Identifier correlating every record emitted by this invocation.
    pub trace_id: String,
    /// Authenticated role the caller was resolved to.
    pub role: TenantRole,
    /// Capability names granted to this caller, beyond what `role` implies.
    pub capabilities: Vec<String>,
    /// Deployment environment the invocation is running in.
    pub environment: Environment,
    /// Caller-supplied depth counter, incremented on each nested tool call.
    pub depth: u32,
    /// Caller-supplied cumulative chain length for this trace.
    pub chain_length: u32,
}

impl InvocationContext {
    /// Construct a root invocation context (depth 0, chain length 0).
    #[must_use]
    pub fn root(
        tenant_id: impl Into<String>,
        trace_id: impl Into<String>,
        role: TenantRole,
        environment: Environment,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trace_id: trace_id.into(),
            role,
            capabilities: Vec::new(),
            environment,
            depth: 0,
            chain_length: 0,
        }
    }

    /// Derive a child context for a nested tool invocation: depth increments
    /// by one, chain length increments by one, identity and role carry over.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            tenant_id: self.tenant_id.clone(),
            trace_id: self.trace_id.clone(),
            role: self.role,
            capabilities: self.capabilities.clone(),
            environment: self.environment,
            depth: self.depth + 1,
            chain_length: self.chain_length + 1,
        }
    }

    /// Whether the caller's granted capabilities include `name`.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }
}
