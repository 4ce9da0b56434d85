// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-types
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Arbitration requests, strategies, and decisions for provider/model selection.
pub mod arbitration;
/// Per-tenant budget windows and check-and-debit state.
pub mod budget;
/// The versioned envelope every message crosses a boundary wrapped in.
pub mod envelope;
/// The per-invocation context threaded through the pipeline.
pub mod invocation;
/// Content-addressed memory item shapes.
pub mod memory;
/// The policy gate's allow/deny decision type.
pub mod policy;
/// Replay cache entry shapes.
pub mod replay;
/// Tool definitions and their schemas/flags.
pub mod tool;

pub use arbitration::{ArbitrationDecision, ArbitrationRequest, ArbitrationResult, ArbitrationStrategy, Candidate};
pub use budget::BudgetState;
pub use policy::Decision;
pub use envelope::ExecutionEnvelope;
pub use invocation::InvocationContext;
pub use memory::MemoryItem;
pub use replay::ReplayCacheEntry;
pub use tool::ToolDefinition;

/// Current contract version string embedded in every [`ExecutionEnvelope`].
///
/// # Examples
///
/// ```
/// assert_eq!(requiem_types::CONTRACT_VERSION, "requiem/v1.0");
/// ```
pub const CONTRACT_VERSION: &str = "requiem/v1.0";
