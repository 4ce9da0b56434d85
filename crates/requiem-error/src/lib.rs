// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-error
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Closed enumeration of every error the runtime can surface.
///
/// This list is additive-only across releases: a code is never renamed or
/// removed, only appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unexpected internal failure with no more specific code.
    InternalError,
    /// A required collaborator (provider, store, sink) was never configured.
    NotConfigured,
    /// The operation exceeded its deadline.
    Timeout,
    /// No tool is registered under the requested name.
    ToolNotFound,
    /// Input or output failed schema validation.
    ToolSchemaViolation,
    /// The tool body raised during execution.
    ToolExecutionFailed,
    /// A tool with this name is already registered.
    ToolAlreadyRegistered,
    /// The tool produced output that fails validation or exceeds its cap.
    ToolOutputInvalid,
    /// Per-trace call depth exceeded `MAX_DEPTH`.
    ToolRecursionLimit,
    /// Per-trace cumulative chain length exceeded `MAX_CHAIN_LENGTH`.
    ToolChainLimit,
    /// A sandboxed path attempted to escape its confinement root.
    SandboxEscapeAttempt,
    /// A sandboxed path is structurally invalid (e.g. contains a NUL byte).
    SandboxPathInvalid,
    /// The policy gate denied the invocation.
    PolicyDenied,
    /// A tenant-scoped operation was attempted without a tenant id.
    TenantRequired,
    /// The resolved tenant does not match the owning tenant of a resource.
    TenantMismatch,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is authenticated but not permitted to perform the action.
    Forbidden,
    /// The tool requires a capability the caller's role does not grant.
    CapabilityMissing,
    /// The tenant's budget would be or was exceeded.
    BudgetExceeded,
    /// No provider is configured for the requested purpose.
    ProviderNotConfigured,
    /// The provider is temporarily unavailable.
    ProviderUnavailable,
    /// The provider rejected the request due to rate limiting.
    ProviderRateLimited,
    /// The requested model is not known to the arbitration engine.
    ModelNotFound,
    /// The circuit breaker for this provider:model is open.
    CircuitOpen,
    /// The memory store failed to persist or retrieve an item.
    MemoryStoreFailed,
    /// A stored memory item's content hash does not match its content.
    MemoryHashMismatch,
    /// No memory item exists for the requested id or hash.
    MemoryNotFound,
    /// No replay cache entry exists for the requested key.
    ReplayNotFound,
    /// No evaluation case exists with the requested id.
    EvalCaseNotFound,
    /// An evaluation case's actual output did not match its golden expectation.
    EvalGoldenMismatch,
}

/// All error codes, for exhaustive iteration in tests and documentation.
pub const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::InternalError,
    ErrorCode::NotConfigured,
    ErrorCode::Timeout,
    ErrorCode::ToolNotFound,
    ErrorCode::ToolSchemaViolation,
    ErrorCode::ToolExecutionFailed,
    ErrorCode::ToolAlreadyRegistered,
    ErrorCode::ToolOutputInvalid,
    ErrorCode::ToolRecursionLimit,
    ErrorCode::ToolChainLimit,
    ErrorCode::SandboxEscapeAttempt,
    ErrorCode::SandboxPathInvalid,
    ErrorCode::PolicyDenied,
    ErrorCode::TenantRequired,
    ErrorCode::TenantMismatch,
    ErrorCode::Unauthorized,
    ErrorCode::Forbidden,
    ErrorCode::CapabilityMissing,
    ErrorCode::BudgetExceeded,
    ErrorCode::ProviderNotConfigured,
    ErrorCode::ProviderUnavailable,
    ErrorCode::ProviderRateLimited,
    ErrorCode::ModelNotFound,
    ErrorCode::CircuitOpen,
    ErrorCode::MemoryStoreFailed,
    ErrorCode::MemoryHashMismatch,
    ErrorCode::MemoryNotFound,
    ErrorCode::ReplayNotFound,
    ErrorCode::EvalCaseNotFound,
    ErrorCode::EvalGoldenMismatch,
];

impl ErrorCode {
    /// Stable snake_case string form, identical to the serde representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalError => "internal_error",
            Self::NotConfigured => "not_configured",
            Self::Timeout => "timeout",
            Self::ToolNotFound => "tool_not_found",
            Self::ToolSchemaViolation => "tool_schema_violation",
            Self::ToolExecutionFailed => "tool_execution_failed",
            Self::ToolAlreadyRegistered => "tool_already_registered",
            Self::ToolOutputInvalid => "tool_output_invalid",
            Self::ToolRecursionLimit => "tool_recursion_limit",
            Self::ToolChainLimit => "tool_chain_limit",
            Self::SandboxEscapeAttempt => "sandbox_escape_attempt",
            Self::SandboxPathInvalid => "sandbox_path_invalid",
            Self::PolicyDenied => "policy_denied",
            Self::TenantRequired => "tenant_required",
            Self::TenantMismatch => "tenant_mismatch",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::CapabilityMissing => "capability_missing",
            Self::BudgetExceeded => "budget_exceeded",
            Self::ProviderNotConfigured => "provider_not_configured",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderRateLimited => "provider_rate_limited",
            Self::ModelNotFound => "model_not_found",
            Self::CircuitOpen => "circuit_open",
            Self::MemoryStoreFailed => "memory_store_failed",
            Self::MemoryHashMismatch => "memory_hash_mismatch",
            Self::MemoryNotFound => "memory_not_found",
            Self::ReplayNotFound => "replay_not_found",
            Self::EvalCaseNotFound => "eval_case_not_found",
            Self::EvalGoldenMismatch => "eval_golden_mismatch",
        }
    }

    /// Default [`Severity`] for this code, absent an override at construction.
    #[must_use]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::MemoryHashMismatch
            | Self::SandboxEscapeAttempt
            | Self::ToolRecursionLimit
            | Self::ToolChainLimit => Severity::Critical,
            Self::ProviderRateLimited | Self::BudgetExceeded | Self::CircuitOpen => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Whether a caller may reasonably retry the same request unchanged.
    #[must_use]
    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ProviderUnavailable
                | Self::ProviderRateLimited
                | Self::CircuitOpen
        )
    }

    /// Deterministic external HTTP status mapping (see spec §4.F).
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized | Self::TenantRequired => 401,
            Self::Forbidden | Self::CapabilityMissing | Self::TenantMismatch => 403,
            Self::BudgetExceeded => 402,
            Self::ToolNotFound
            | Self::ModelNotFound
            | Self::MemoryNotFound
            | Self::ReplayNotFound
            | Self::EvalCaseNotFound => 404,
            Self::ToolSchemaViolation | Self::ToolOutputInvalid => 400,
            Self::CircuitOpen | Self::ProviderUnavailable | Self::ProviderNotConfigured => 503,
            Self::ProviderRateLimited => 429,
            _ => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity / Phase
// ---------------------------------------------------------------------------

/// Severity band for an error, used by telemetry sinks to route alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected, recoverable condition (e.g. rate limited).
    Warning,
    /// Unexpected but contained condition.
    Error,
    /// Invariant violation; the invocation must unwind.
    Critical,
}

/// Pipeline phase in which an error originated, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Resolving the tool definition.
    Resolve,
    /// Input/output schema validation.
    Validate,
    /// Sandbox bound checks (path, depth, chain, output size).
    Sandbox,
    /// Policy gate evaluation.
    Policy,
    /// Replay cache lookup or verification.
    Replay,
    /// Tool body execution.
    Execute,
    /// Result digesting, storage, or telemetry emission.
    Record,
    /// Provider/model arbitration.
    Arbitration,
}

// ---------------------------------------------------------------------------
// RequiemError
// ---------------------------------------------------------------------------

/// The runtime's sum error type.
///
/// Every public fallible function returns `Result<T, RequiemError>`. Use the
/// factory constructors (e.g. [`RequiemError::tool_not_found`]) to build one
/// with sensible defaults for severity/retryability, then refine with the
/// builder methods.
pub struct RequiemError {
    /// Stable, closed-enum code.
    pub code: ErrorCode,
    /// Human-readable message. Never shown with `cause` attached externally.
    pub message: String,
    /// Severity band.
    pub severity: Severity,
    /// Whether a caller may retry unchanged.
    pub retryable: bool,
    /// Pipeline phase the error originated in, if known.
    pub phase: Option<Phase>,
    /// Suggested remediation, surfaced to operators (not necessarily callers).
    pub remediation: Option<String>,
    /// Structured diagnostic context (internal only).
    pub details: BTreeMap<String, serde_json::Value>,
    /// Underlying cause, never serialized.
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Trace id this error occurred within, if known.
    pub trace_id: Option<String>,
}

impl RequiemError {
    /// Construct a new error from a code and message, using the code's
    /// default severity/retryability.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: code.default_severity(),
            retryable: code.default_retryable(),
            code,
            message: message.into(),
            phase: None,
            remediation: None,
            details: BTreeMap::new(),
            cause: None,
            trace_id: None,
        }
    }

    /// Override the phase this error occurred in.
    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Attach a structured detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach the trace id this error occurred within.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Override severity explicitly.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// The external HTTP status this error maps to.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Produce the safe, externally-serializable form: no cause chain, no
    /// internal details, no stack.
    #[must_use]
    pub fn to_safe(&self) -> SafeError {
        SafeError {
            code: self.code,
            message: self.message.clone(),
            severity: self.severity,
            retryable: self.retryable,
            http_status: self.http_status(),
        }
    }

    // -- Factory constructors (spec §9) -------------------------------

    /// `tool_not_found(name)`.
    #[must_use]
    pub fn tool_not_found(name: &str) -> Self {
        Self::new(ErrorCode::ToolNotFound, format!("no tool registered as '{name}'"))
            .with_phase(Phase::Resolve)
            .with_detail("tool_name", name)
    }

    /// `policy_denied(reason, tool?)`.
    #[must_use]
    pub fn policy_denied(reason: impl Into<String>, tool: Option<&str>) -> Self {
        let reason = reason.into();
        let mut err = Self::new(ErrorCode::PolicyDenied, reason.clone())
            .with_phase(Phase::Policy)
            .with_detail("reason", reason);
        if let Some(t) = tool {
            err = err.with_detail("tool_name", t);
        }
        err
    }

    /// `circuit_open(model)`.
    #[must_use]
    pub fn circuit_open(model: &str) -> Self {
        Self::new(ErrorCode::CircuitOpen, format!("circuit open for '{model}'"))
            .with_phase(Phase::Arbitration)
            .with_detail("model", model)
    }

    /// `tenant_required()`.
    #[must_use]
    pub fn tenant_required() -> Self {
        Self::new(ErrorCode::TenantRequired, "tenant_id is required for this operation")
    }

    /// `tenant_mismatch(expected, actual)`.
    #[must_use]
    pub fn tenant_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorCode::TenantMismatch,
            "resource does not belong to the requesting tenant",
        )
        .with_detail("expected_tenant", expected)
        .with_detail("actual_tenant", actual)
    }

    /// `budget_exceeded(tenant, cost_cents)`.
    #[must_use]
    pub fn budget_exceeded(tenant: &str, cost_cents: i64) -> Self {
        Self::new(ErrorCode::BudgetExceeded, "tenant budget would be exceeded")
            .with_detail("tenant_id", tenant)
            .with_detail("cost_cents", cost_cents)
    }

    /// `tool_recursion_limit(trace_id, depth, max)`.
    #[must_use]
    pub fn tool_recursion_limit(trace_id: &str, depth: u32, max: u32) -> Self {
        Self::new(
            ErrorCode::ToolRecursionLimit,
            format!("recursion depth {depth} exceeds max {max}"),
        )
        .with_phase(Phase::Sandbox)
        .with_trace_id(trace_id)
    }

    /// `tool_chain_limit(trace_id, length, max)`.
    #[must_use]
    pub fn tool_chain_limit(trace_id: &str, length: u32, max: u32) -> Self {
        Self::new(
            ErrorCode::ToolChainLimit,
            format!("chain length {length} exceeds max {max}"),
        )
        .with_phase(Phase::Sandbox)
        .with_trace_id(trace_id)
    }

    /// `sandbox_escape_attempt(candidate, root)`.
    #[must_use]
    pub fn sandbox_escape_attempt(candidate: &str, root: &str) -> Self {
        Self::new(
            ErrorCode::SandboxEscapeAttempt,
            format!("path '{candidate}' escapes sandbox root '{root}'"),
        )
        .with_phase(Phase::Sandbox)
    }

    /// `sandbox_path_invalid(candidate)`.
    #[must_use]
    pub fn sandbox_path_invalid(candidate: &str) -> Self {
        Self::new(ErrorCode::SandboxPathInvalid, "path contains an invalid byte sequence")
            .with_phase(Phase::Sandbox)
            .with_detail("candidate", candidate)
    }

    /// `timeout(phase)`.
    #[must_use]
    pub fn timeout(phase: Phase) -> Self {
        Self::new(ErrorCode::Timeout, "operation exceeded its deadline").with_phase(phase)
    }
}

impl fmt::Debug for RequiemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RequiemError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        d.field("severity", &self.severity);
        d.field("retryable", &self.retryable);
        if let Some(phase) = self.phase {
            d.field("phase", &phase);
        }
        if !self.details.is_empty() {
            d.field("details", &self.details);
        }
        if let Some(ref cause) = self.cause {
            d.field("cause", &cause.to_string());
        }
        d.finish()
    }
}

impl fmt::Display for RequiemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for RequiemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// The externally-visible, safe-serialization form of a [`RequiemError`].
///
/// Never includes the cause chain, internal `details`, or a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SafeError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Severity band.
    pub severity: Severity,
    /// Whether the caller may retry.
    pub retryable: bool,
    /// External HTTP status mapping.
    pub http_status: u16,
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RequiemError>;
