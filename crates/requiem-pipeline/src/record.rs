// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The payload wrapped in the [`requiem_types::ExecutionEnvelope`] returned
/// from every invocation and appended to the audit sink.
///
/// One record per invocation, ordered within a trace by `sequence` starting
/// from zero.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvocationRecord {
    /// Position of this invocation within its trace, starting at zero.
    pub sequence: u64,
    /// Name of the tool invoked.
    pub tool_name: String,
    /// Hex BLAKE3 digest of the canonicalized input.
    pub input_digest: String,
    /// Hex BLAKE3 digest of the canonicalized output. Absent when the
    /// invocation failed before producing one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_digest: Option<String>,
    /// Cost debited for this invocation, in cents. Zero for a cache hit or
    /// a call that failed before debiting.
    pub cost_cents: i64,
    /// Whether the output was served from the replay cache.
    pub from_cache: bool,
    /// Wall-clock duration of the invocation in milliseconds.
    pub duration_ms: u64,
    /// The error code, if the invocation failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}
