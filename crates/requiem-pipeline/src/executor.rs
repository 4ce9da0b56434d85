// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use requiem_types::{InvocationContext, ToolDefinition};
use serde_json::Value;

/// The caller-supplied body of a tool: whatever actually runs when the
/// pipeline decides to execute rather than serve from cache.
///
/// Implementations do their own I/O; the pipeline only awaits them at the
/// single suspension point the invocation flow allows for tool execution.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run `tool` against `input` on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Should return [`requiem_error::ErrorCode::ToolExecutionFailed`] (or a
    /// more specific code) on any failure; the pipeline does not inspect
    /// the error beyond propagating it.
    async fn execute(
        &self,
        context: &InvocationContext,
        tool: &ToolDefinition,
        input: &Value,
    ) -> requiem_error::Result<Value>;
}

/// A [`ToolExecutor`] backed by a plain async closure, for tests and small
/// in-process tools that don't need their own type.
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F, Fut> ToolExecutor for FnExecutor<F>
where
    F: Fn(InvocationContext, ToolDefinition, Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = requiem_error::Result<Value>> + Send,
{
    async fn execute(
        &self,
        context: &InvocationContext,
        tool: &ToolDefinition,
        input: &Value,
    ) -> requiem_error::Result<Value> {
        (self.0)(context.clone(), tool.clone(), input.clone()).await
    }
}
