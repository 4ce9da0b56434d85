// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::CONTRACT_VERSION;

/// A versioned wrapper every payload crosses a process boundary inside.
///
/// Carries the contract version so a future incompatible change can be
/// detected by a receiver running an older build, plus the trace/tenant
/// identifiers needed to correlate the envelope with logs without opening
/// `payload`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionEnvelope<T> {
    /// Contract version this envelope was produced under.
    pub version: String,
    /// Trace id correlating this envelope with its originating invocation.
    pub trace_id: String,
    /// Tenant this envelope belongs to.
    pub tenant_id: String,
    /// RFC-3339 timestamp the envelope was produced.
    pub produced_at: String,
    /// The wrapped payload.
    pub payload: T,
}

impl<T> ExecutionEnvelope<T> {
    /// Wrap `payload` at the current contract version.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        tenant_id: impl Into<String>,
        produced_at: impl Into<String>,
        payload: T,
    ) -> Self {
        Self {
            version: CONTRACT_VERSION.to_string(),
            trace_id: trace_id.into(),
            tenant_id: tenant_id.into(),
            produced_at: produced_at.into(),
            payload,
        }
    }

    /// Whether this envelope's version matches the contract version this
    /// build was compiled against.
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == CONTRACT_VERSION
    }
}
