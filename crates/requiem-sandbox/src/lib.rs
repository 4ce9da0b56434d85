// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-sandbox
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_error::{ErrorCode, RequiemError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default maximum nested tool-call depth for a single trace.
pub const MAX_DEPTH: u32 = 10;

/// Default maximum cumulative tool-call count for a single trace.
pub const MAX_CHAIN_LENGTH: u32 = 50;

/// Default output size cap, in bytes, for a tool with no explicit override.
pub const DEFAULT_OUTPUT_MAX_BYTES: usize = 1_048_576;

/// Canonicalize `candidate` against `root` and verify the result stays
/// inside it.
///
/// # Errors
///
/// Returns [`ErrorCode::SandboxPathInvalid`] if `candidate` contains an
/// embedded NUL byte (checked before any filesystem access), or
/// [`ErrorCode::SandboxEscapeAttempt`] if the canonicalized path does not
/// start with `root` — this covers both `..` traversal and absolute paths
/// naming a location outside the sandbox.
pub fn confine_path(root: &Path, candidate: &Path) -> requiem_error::Result<PathBuf> {
    let candidate_str = candidate.to_string_lossy();
    if candidate_str.contains('\0') {
        return Err(RequiemError::sandbox_path_invalid(&candidate_str));
    }

    let root_canon = root
        .canonicalize()
        .map_err(|_| RequiemError::sandbox_path_invalid(&root.to_string_lossy()))?;

    let joined = if candidate.is_absolute() { candidate.to_path_buf() } else { root.join(candidate) };

    let canon = joined.canonicalize().map_err(|_| {
        RequiemError::sandbox_escape_attempt(&candidate_str, &root_canon.to_string_lossy())
    })?;

    if canon.starts_with(&root_canon) {
        Ok(canon)
    } else {
        Err(RequiemError::sandbox_escape_attempt(&candidate_str, &root_canon.to_string_lossy()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TraceCounters {
    depth: u32,
    chain_length: u32,
}

/// Per-trace recursion depth and cumulative chain length counters.
///
/// Cheap to clone: shared via `Arc<DashMap<..>>`.
#[derive(Clone)]
pub struct DepthGuard {
    counters: Arc<DashMap<String, TraceCounters>>,
    max_depth: u32,
    max_chain_length: u32,
}

impl Default for DepthGuard {
    fn default() -> Self {
        Self::new(MAX_DEPTH, MAX_CHAIN_LENGTH)
    }
}

impl DepthGuard {
    /// Create a guard with the given depth and chain-length limits.
    #[must_use]
    pub fn new(max_depth: u32, max_chain_length: u32) -> Self {
        Self { counters: Arc::new(DashMap::new()), max_depth, max_chain_length }
    }

    /// Increment both counters for `trace_id` and check them against their
    /// limits.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ToolRecursionLimit`] if the post-increment depth
    /// exceeds `max_depth`, or [`ErrorCode::ToolChainLimit`] if the
    /// post-increment chain length exceeds `max_chain_length`. Both counters
    /// are incremented even when the check fails — `release_depth` must
    /// still be called by the caller to unwind depth on every exit path.
    pub fn check_depth(&self, trace_id: &str) -> requiem_error::Result<()> {
        let mut entry = self.counters.entry(trace_id.to_string()).or_default();
        entry.depth += 1;
        entry.chain_length += 1;

        if entry.depth > self.max_depth {
            return Err(RequiemError::tool_recursion_limit(trace_id, entry.depth, self.max_depth));
        }
        if entry.chain_length > self.max_chain_length {
            return Err(RequiemError::tool_chain_limit(trace_id, entry.chain_length, self.max_chain_length));
        }
        Ok(())
    }

    /// Decrement the depth counter for `trace_id`. Chain length is
    /// cumulative for the trace's lifetime and is never decremented.
    pub fn release_depth(&self, trace_id: &str) {
        if let Some(mut entry) = self.counters.get_mut(trace_id) {
            entry.depth = entry.depth.saturating_sub(1);
        }
    }

    /// Current depth for `trace_id`, or `0` if untracked.
    #[must_use]
    pub fn depth(&self, trace_id: &str) -> u32 {
        self.counters.get(trace_id).map_or(0, |e| e.depth)
    }

    /// Current cumulative chain length for `trace_id`, or `0` if untracked.
    #[must_use]
    pub fn chain_length(&self, trace_id: &str) -> u32 {
        self.counters.get(trace_id).map_or(0, |e| e.chain_length)
    }

    /// Clear every tracked trace's counters. Test-only.
    pub fn _reset_sandbox(&self) {
        self.counters.clear();
    }
}

/// Check a tool's serialized output against its byte cap.
///
/// # Errors
///
/// Returns [`ErrorCode::ToolOutputInvalid`] if `size_bytes` exceeds `cap`.
pub fn check_output_size(size_bytes: usize, cap: usize) -> requiem_error::Result<()> {
    if size_bytes > cap {
        Err(RequiemError::new(
            ErrorCode::ToolOutputInvalid,
            format!("output size {size_bytes} bytes exceeds cap of {cap} bytes"),
        )
        .with_detail("size_bytes", size_bytes)
        .with_detail("cap", cap))
    } else {
        Ok(())
    }
}
