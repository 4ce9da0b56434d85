// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use requiem_budget::BudgetChecker;
use requiem_error::{ErrorCode, RequiemError};
use requiem_guardrails::GuardrailEngine;
use requiem_id::SharedClock;
use requiem_registry::ToolRegistry;
use requiem_replay::ReplayCache;
use requiem_sandbox::DepthGuard;
use requiem_telemetry::TelemetrySink;
use requiem_types::{ExecutionEnvelope, InvocationContext, ReplayCacheEntry, ToolDefinition};
use serde_json::Value;
use tracing::debug;

use crate::audit::AuditSink;
use crate::executor::ToolExecutor;
use crate::record::InvocationRecord;

/// The full set of collaborators [`Pipeline::invoke`] threads a call
/// through, in the order spec'd for the invocation flow: resolve, validate,
/// sandbox, policy, replay, budget/execute, output validation, replay
/// write, telemetry/audit, redact.
pub struct Pipeline {
    registry: ToolRegistry,
    sandbox: DepthGuard,
    guardrails: GuardrailEngine,
    budget: BudgetChecker,
    replay: ReplayCache,
    telemetry: Arc<dyn TelemetrySink>,
    audit: Arc<dyn AuditSink>,
    clock: SharedClock,
    replay_max_age_ms: i64,
    sequences: DashMap<String, u64>,
}

/// The fields of an [`InvocationRecord`] known before its wall-clock
/// duration is measured by the caller.
struct StepOutcome {
    tool_name: String,
    input_digest: String,
    output_digest: Option<String>,
    cost_cents: i64,
    from_cache: bool,
}

impl Pipeline {
    /// Assemble a pipeline from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: ToolRegistry,
        sandbox: DepthGuard,
        guardrails: GuardrailEngine,
        budget: BudgetChecker,
        replay: ReplayCache,
        telemetry: Arc<dyn TelemetrySink>,
        audit: Arc<dyn AuditSink>,
        clock: SharedClock,
        replay_max_age_ms: i64,
    ) -> Self {
        Self {
            registry,
            sandbox,
            guardrails,
            budget,
            replay,
            telemetry,
            audit,
            clock,
            replay_max_age_ms,
            sequences: DashMap::new(),
        }
    }

    /// The tool registry this pipeline resolves against, for callers that
    /// register tools after construction.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn next_sequence(&self, trace_id: &str) -> u64 {
        let mut entry = self.sequences.entry(trace_id.to_string()).or_insert(0);
        let seq = *entry;
        *entry += 1;
        seq
    }

    /// Run the full invocation flow for `tool_name` against `input` on
    /// behalf of `context`, executing via `executor` on a cache miss.
    ///
    /// Always appends an [`ExecutionEnvelope`] wrapping an
    /// [`InvocationRecord`] to the audit sink — on both success and
    /// failure — so every attempt is accounted for in trace order.
    ///
    /// # Errors
    ///
    /// Returns a typed [`RequiemError`] for every failure mode the
    /// invocation flow defines: unknown tool, schema violation, recursion
    /// or chain limit, policy denial, budget exhaustion, tool execution
    /// failure, or oversized output. No raw/untyped error escapes.
    pub async fn invoke(
        &self,
        context: &InvocationContext,
        tool_name: &str,
        input: Value,
        executor: &dyn ToolExecutor,
    ) -> requiem_error::Result<(Value, ExecutionEnvelope<InvocationRecord>)> {
        let start_ms = self.clock.now_millis();
        let sequence = self.next_sequence(&context.trace_id);

        let outcome = self.invoke_with_depth(context, tool_name, &input, executor).await;
        let duration_ms = (self.clock.now_millis() - start_ms).max(0) as u64;

        match outcome {
            Ok((output, step)) => {
                let record = InvocationRecord {
                    sequence,
                    tool_name: step.tool_name,
                    input_digest: step.input_digest,
                    output_digest: step.output_digest,
                    cost_cents: step.cost_cents,
                    from_cache: step.from_cache,
                    duration_ms,
                    error_code: None,
                };
                let envelope = self.record_and_emit(context, record)?;
                let redacted = requiem_redact::redact(&output);
                Ok((redacted, envelope))
            }
            Err(err) => {
                let record = InvocationRecord {
                    sequence,
                    tool_name: tool_name.to_string(),
                    input_digest: requiem_hash::digest_hex(&input).unwrap_or_default(),
                    output_digest: None,
                    cost_cents: 0,
                    from_cache: false,
                    duration_ms,
                    error_code: Some(err.code.as_str().to_string()),
                };
                // Best-effort audit: the call still fails even if recording
                // the failure itself cannot be canonicalized.
                let _ = self.record_and_emit(context, record);
                Err(err)
            }
        }
    }

    async fn invoke_with_depth(
        &self,
        context: &InvocationContext,
        tool_name: &str,
        input: &Value,
        executor: &dyn ToolExecutor,
    ) -> requiem_error::Result<(Value, StepOutcome)> {
        // 1. resolve
        let tool = self.registry.resolve(tool_name)?;

        // 2. validate input against the tool's input schema
        let validation = requiem_registry::validate_tool_schema(&tool.input_schema, input);
        if !validation.valid {
            return Err(RequiemError::new(
                ErrorCode::ToolSchemaViolation,
                format!("input for '{tool_name}' failed schema validation"),
            )
            .with_detail("errors", &validation.errors));
        }
        let input_digest = requiem_hash::digest_hex(input)?;

        // 3. sandbox depth/chain check, guaranteed release on every exit
        self.sandbox.check_depth(&context.trace_id)?;
        let result = self.invoke_checked(context, &tool, input, &input_digest, executor).await;
        self.sandbox.release_depth(&context.trace_id);
        result
    }

    async fn invoke_checked(
        &self,
        context: &InvocationContext,
        tool: &ToolDefinition,
        input: &Value,
        input_digest: &str,
        executor: &dyn ToolExecutor,
    ) -> requiem_error::Result<(Value, StepOutcome)> {
        // 4. policy gate: tenant -> role -> capability -> guardrails -> budget
        let decision = requiem_policy::evaluate_policy(context, tool, &self.guardrails, &self.budget);
        if !decision.allowed {
            return Err(RequiemError::policy_denied(decision.reason, Some(&tool.name)));
        }

        let cache_key = requiem_replay::cache_key(&tool.name, input)?;
        let tool_digest = tool.digest.clone().unwrap_or_default();

        // 5. deterministic cache check with digest verification
        if tool.deterministic {
            if let Some(entry) = self.replay.get(&cache_key) {
                if ReplayCache::verify(&entry, &tool_digest) {
                    debug!(tool = %tool.name, trace_id = %context.trace_id, "replay cache hit");
                    return Ok((
                        entry.output.clone(),
                        StepOutcome {
                            tool_name: tool.name.clone(),
                            input_digest: input_digest.to_string(),
                            output_digest: Some(entry.output_digest.clone()),
                            cost_cents: 0,
                            from_cache: true,
                        },
                    ));
                }
                debug!(tool = %tool.name, "replay cache entry stale against current tool digest");
            }
        }

        // 6. debit the budget atomically, then execute
        self.budget.check_and_debit(&context.tenant_id, tool.cost_hint.cost_cents)?;
        let exec_start = self.clock.now_millis();
        let output = executor.execute(context, tool, input).await?;
        let latency_ms = (self.clock.now_millis() - exec_start).max(0) as u64;

        // 7. validate output against the tool's output schema and size cap
        let out_validation = requiem_registry::validate_tool_schema(&tool.output_schema, &output);
        if !out_validation.valid {
            return Err(RequiemError::new(
                ErrorCode::ToolOutputInvalid,
                format!("output of '{}' failed schema validation", tool.name),
            )
            .with_detail("errors", &out_validation.errors));
        }
        let canonical_output = requiem_hash::canonicalize(&output)?;
        requiem_sandbox::check_output_size(canonical_output.len(), tool.output_max_bytes)?;

        // 8. compute the result digest and store it if the tool is deterministic
        let output_digest = requiem_hash::digest_hex(&output)?;
        if tool.deterministic {
            let created_at = self.clock.now_rfc3339();
            let expires_at = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(
                self.clock.now_millis() + self.replay_max_age_ms,
            )
            .map_or_else(|| created_at.clone(), |ts| ts.to_rfc3339());
            self.replay.set(
                cache_key.clone(),
                ReplayCacheEntry {
                    key: cache_key,
                    tool_name: tool.name.clone(),
                    input_digest: input_digest.to_string(),
                    output: output.clone(),
                    output_digest: output_digest.clone(),
                    tool_digest,
                    created_at,
                    expires_at,
                    size_bytes: canonical_output.len(),
                    latency_ms,
                },
            );
        }

        Ok((
            output,
            StepOutcome {
                tool_name: tool.name.clone(),
                input_digest: input_digest.to_string(),
                output_digest: Some(output_digest),
                cost_cents: tool.cost_hint.cost_cents,
                from_cache: false,
            },
        ))
    }

    fn record_and_emit(
        &self,
        context: &InvocationContext,
        record: InvocationRecord,
    ) -> requiem_error::Result<ExecutionEnvelope<InvocationRecord>> {
        let mut attrs = BTreeMap::new();
        attrs.insert("tenant_id".to_string(), context.tenant_id.clone());
        attrs.insert("trace_id".to_string(), context.trace_id.clone());
        attrs.insert("tool_name".to_string(), record.tool_name.clone());
        attrs.insert("sequence".to_string(), record.sequence.to_string());
        attrs.insert("from_cache".to_string(), record.from_cache.to_string());
        if let Some(code) = &record.error_code {
            attrs.insert("error_code".to_string(), code.clone());
        }
        self.telemetry.span("tool_invocation", &attrs);
        self.telemetry.log(
            if record.error_code.is_some() { "error" } else { "info" },
            "tool invocation completed",
            &attrs,
        );
        if record.cost_cents > 0 {
            self.telemetry.record_cost(&context.tenant_id, &record.tool_name, record.cost_cents);
        }

        let now = self.clock.now_rfc3339();
        let line = requiem_serialize::encode_envelope(&context.trace_id, &context.tenant_id, &now, record)?;
        self.audit.append(line.clone());
        requiem_serialize::decode_envelope(&line)
    }
}
