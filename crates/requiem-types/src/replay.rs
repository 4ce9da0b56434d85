// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached result for a deterministic tool invocation.
///
/// Keyed externally as `tool:{tool_name}:{16-hex-char prefix of the BLAKE3
/// digest of the canonicalized input}` (see `requiem-replay`). The entry
/// carries its own `output_digest` so a lookup can cheaply verify the cached
/// bytes weren't corrupted without re-running the tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReplayCacheEntry {
    /// The cache key this entry is stored under.
    pub key: String,
    /// Name of the tool this result was produced by.
    pub tool_name: String,
    /// Full hex BLAKE3 digest of the canonicalized input.
    pub input_digest: String,
    /// The cached tool output.
    pub output: Value,
    /// Hex BLAKE3 digest of the canonicalized output, for integrity checks.
    pub output_digest: String,
    /// Snapshot of the tool definition's own digest at cache-write time, if
    /// the tool carries one. Empty when the tool has no digest configured.
    /// A non-empty value that differs from the tool's current digest at
    /// lookup time means the tool changed since this entry was cached.
    pub tool_digest: String,
    /// RFC-3339 timestamp the entry was written.
    pub created_at: String,
    /// RFC-3339 timestamp after which the entry is considered expired.
    pub expires_at: String,
    /// Serialized size of `output` in bytes, checked against the store's cap.
    pub size_bytes: usize,
    /// Latency of the original (non-cached) execution, in milliseconds.
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_cache_entry_round_trips() {
        let entry = ReplayCacheEntry {
            key: "tool:search:0123456789abcdef".into(),
            tool_name: "search".into(),
            input_digest: "f".repeat(64),
            output: serde_json::json!({"hits": []}),
            output_digest: "e".repeat(64),
            tool_digest: String::new(),
            created_at: "2026-07-28T00:00:00Z".into(),
            expires_at: "2026-07-29T00:00:00Z".into(),
            size_bytes: 13,
            latency_ms: 42,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: ReplayCacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, entry.key);
    }
}
