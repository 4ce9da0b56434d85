// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-pipeline

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The append-only structured audit log a [`Pipeline`] writes every
/// invocation's envelope to.
pub mod audit;
/// The caller-supplied tool body a [`Pipeline`] awaits on a cache miss.
pub mod executor;
/// The invocation orchestrator itself.
pub mod pipeline;
/// The audit record wrapped in every invocation's [`ExecutionEnvelope`].
pub mod record;

pub use audit::{AuditSink, InMemoryAuditSink};
pub use executor::{FnExecutor, ToolExecutor};
pub use pipeline::Pipeline;
pub use record::InvocationRecord;
pub use requiem_types::ExecutionEnvelope;

#[cfg(test)]
mod tests {
    use super::*;
    use requiem_budget::BudgetChecker;
    use requiem_guardrails::GuardrailEngine;
    use requiem_id::{Environment, FixedClock, TenantRole};
    use requiem_registry::ToolRegistry;
    use requiem_replay::ReplayCache;
    use requiem_sandbox::DepthGuard;
    use requiem_telemetry::TracingSink;
    use requiem_types::InvocationContext;
    use serde_json::json;
    use std::sync::Arc;

    fn search_tool() -> requiem_types::ToolDefinition {
        requiem_types::ToolDefinition::new("search", "search the index")
            .with_input_schema(json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }))
            .with_output_schema(json!({
                "type": "object",
                "properties": { "hits": { "type": "array" } },
                "required": ["hits"],
            }))
            .deterministic()
    }

    fn test_pipeline() -> Pipeline {
        let clock = Arc::new(FixedClock::new(0));
        Pipeline::new(
            ToolRegistry::new(),
            DepthGuard::default(),
            GuardrailEngine::new(),
            BudgetChecker::new(clock.clone(), 10_000, 3600),
            ReplayCache::new(clock.clone(), 3_600_000, 10_000, true),
            Arc::new(TracingSink),
            Arc::new(InMemoryAuditSink::new()),
            clock,
            3_600_000,
        )
    }

    fn member_context() -> InvocationContext {
        InvocationContext::root("tenant-a", "trace-1", TenantRole::Member, Environment::Test)
    }

    struct CountingExecutor {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ToolExecutor for CountingExecutor {
        async fn execute(
            &self,
            _context: &InvocationContext,
            _tool: &requiem_types::ToolDefinition,
            input: &serde_json::Value,
        ) -> requiem_error::Result<serde_json::Value> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(json!({ "hits": [input["query"].clone()] }))
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_before_any_side_effect() {
        let pipeline = test_pipeline();
        let ctx = member_context();
        let executor = CountingExecutor { calls: std::sync::atomic::AtomicUsize::new(0) };
        let err = pipeline.invoke(&ctx, "missing", json!({}), &executor).await.unwrap_err();
        assert_eq!(err.code, requiem_error::ErrorCode::ToolNotFound);
    }

    #[tokio::test]
    async fn schema_violation_is_rejected() {
        let pipeline = test_pipeline();
        pipeline.registry().register(search_tool()).unwrap();
        let ctx = member_context();
        let executor = CountingExecutor { calls: std::sync::atomic::AtomicUsize::new(0) };
        let err = pipeline.invoke(&ctx, "search", json!({}), &executor).await.unwrap_err();
        assert_eq!(err.code, requiem_error::ErrorCode::ToolSchemaViolation);
    }

    #[tokio::test]
    async fn deterministic_second_call_is_served_from_cache() {
        let pipeline = test_pipeline();
        pipeline.registry().register(search_tool()).unwrap();
        let ctx = member_context();
        let executor = CountingExecutor { calls: std::sync::atomic::AtomicUsize::new(0) };

        let (out1, env1) = pipeline.invoke(&ctx, "search", json!({"query": "x"}), &executor).await.unwrap();
        let (out2, env2) = pipeline.invoke(&ctx, "search", json!({"query": "x"}), &executor).await.unwrap();

        assert_eq!(out1, out2);
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!env1.payload.from_cache);
        assert!(env2.payload.from_cache);
        assert_eq!(env2.payload.sequence, 1);
    }

    #[tokio::test]
    async fn viewer_cannot_invoke_side_effecting_tool() {
        let pipeline = test_pipeline();
        let tool = requiem_types::ToolDefinition::new("write_file", "writes a file")
            .with_input_schema(json!({"type": "object"}))
            .with_output_schema(json!({"type": "object"}))
            .side_effect();
        pipeline.registry().register(tool).unwrap();
        let ctx = InvocationContext::root("tenant-a", "trace-2", TenantRole::Viewer, Environment::Test);
        let executor = CountingExecutor { calls: std::sync::atomic::AtomicUsize::new(0) };
        let err = pipeline.invoke(&ctx, "write_file", json!({}), &executor).await.unwrap_err();
        assert_eq!(err.code, requiem_error::ErrorCode::PolicyDenied);
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
