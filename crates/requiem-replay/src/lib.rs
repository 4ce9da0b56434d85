// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-replay
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_id::SharedClock;
use requiem_types::ReplayCacheEntry;
use serde_json::Value;
use std::sync::Arc;

/// Default cache entry lifetime, in milliseconds (1 hour).
pub const DEFAULT_MAX_AGE_MS: i64 = 3_600_000;

/// Default maximum number of entries before oldest-first eviction kicks in.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct Stored {
    entry: ReplayCacheEntry,
    cached_at_ms: i64,
}

/// Build a replay cache key for `tool_name` given its canonicalized input.
///
/// # Errors
///
/// Propagates [`requiem_hash::canonicalize`]'s errors.
pub fn cache_key(tool_name: &str, input: &Value) -> requiem_error::Result<String> {
    let digest = requiem_hash::digest_hex(input)?;
    Ok(format!("tool:{tool_name}:{}", requiem_hash::short_hex(&digest, 16)))
}

/// Deterministic-tool result cache keyed by `tool:{name}:{input digest
/// prefix}`.
///
/// Cheap to clone: entries live behind an `Arc<DashMap<..>>`.
#[derive(Clone)]
pub struct ReplayCache {
    entries: Arc<DashMap<String, Stored>>,
    clock: SharedClock,
    max_age_ms: i64,
    max_entries: usize,
    enabled: bool,
}

impl ReplayCache {
    /// Create a cache. `enabled = false` makes every `get`/`set` a no-op.
    #[must_use]
    pub fn new(clock: SharedClock, max_age_ms: i64, max_entries: usize, enabled: bool) -> Self {
        Self { entries: Arc::new(DashMap::new()), clock, max_age_ms, max_entries, enabled }
    }

    /// Look up `key`, evicting and returning `None` if the entry has aged
    /// past `max_age_ms`. Always `None` when the cache is disabled.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ReplayCacheEntry> {
        if !self.enabled {
            return None;
        }
        let now = self.clock.now_millis();
        let stale = self
            .entries
            .get(key)
            .map(|stored| now.saturating_sub(stored.cached_at_ms) > self.max_age_ms)?;
        if stale {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|stored| stored.entry.clone())
    }

    /// Whether a cache-hit entry is still valid against the tool's current
    /// digest. A non-empty stored `tool_digest` that differs from
    /// `current_tool_digest` means the tool changed since caching and the
    /// entry must be treated as stale.
    #[must_use]
    pub fn verify(entry: &ReplayCacheEntry, current_tool_digest: &str) -> bool {
        entry.tool_digest.is_empty() || entry.tool_digest == current_tool_digest
    }

    /// Insert or overwrite `entry` under `key`, evicting the oldest entry by
    /// `cached_at_ms` if the cache is already at `max_entries`. A no-op when
    /// the cache is disabled.
    pub fn set(&self, key: String, entry: ReplayCacheEntry) {
        if !self.enabled {
            return;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|e| e.value().cached_at_ms)
                .map(|e| e.key().clone())
            {
                self.entries.remove(&oldest_key);
            }
        }
        let cached_at_ms = self.clock.now_millis();
        self.entries.insert(key, Stored { entry, cached_at_ms });
    }

    /// Drop every entry whose key starts with `tool:{tool_name}:`.
    pub fn invalidate_tool(&self, tool_name: &str) {
        let prefix = format!("tool:{tool_name}:");
        self.entries.retain(|k, _| !k.starts_with(&prefix));
    }

    /// Number of entries currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
