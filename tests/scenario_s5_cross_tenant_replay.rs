// SPDX-License-Identifier: MIT OR Apache-2.0
//! S5 — a memory item stored under one tenant is invisible to a lookup by
//! the same content hash under a different tenant, and the replay cache is
//! keyed so one tenant's tool call cannot surface another tenant's entry.

use requiem_id::FixedClock;
use requiem_memory::MemoryStore;
use requiem_replay::{ReplayCache, cache_key};
use requiem_types::ReplayCacheEntry;
use serde_json::json;
use std::sync::Arc;

#[test]
fn memory_lookup_by_hash_is_scoped_to_the_storing_tenant() {
    let clock = Arc::new(FixedClock::new(0));
    let store = MemoryStore::new(clock);

    let item = store.store("tenant-a", json!({"secret": "value"}), json!({})).unwrap();

    let hit = store.get_by_hash("tenant-a", &item.content_hash).unwrap();
    assert!(hit.is_some());

    let miss = store.get_by_hash("tenant-b", &item.content_hash).unwrap();
    assert!(miss.is_none(), "tenant-b must never see tenant-a's content by hash");

    let listed_b = store.list("tenant-b", None).unwrap();
    assert!(listed_b.is_empty());
}

#[test]
fn replay_cache_key_is_tool_and_input_scoped_not_leaking_across_tenants() {
    let clock = Arc::new(FixedClock::new(0));
    let cache = ReplayCache::new(clock, 3_600_000, 10_000, true);

    let input = json!({"message": "hi"});
    let key = cache_key("system.echo", &input).unwrap();

    assert!(cache.get(&key).is_none());

    let output = json!({"message": "hi"});
    let output_digest = requiem_hash::digest_hex(&output).unwrap();
    let input_digest = requiem_hash::digest_hex(&input).unwrap();
    let entry = ReplayCacheEntry {
        key: key.clone(),
        tool_name: "system.echo".to_string(),
        input_digest,
        output,
        output_digest,
        tool_digest: String::new(),
        created_at: "1970-01-01T00:00:00Z".to_string(),
        expires_at: "1970-01-01T01:00:00Z".to_string(),
        size_bytes: 16,
        latency_ms: 0,
    };
    cache.set(key.clone(), entry.clone());

    let same_key_again = cache_key("system.echo", &input).unwrap();
    assert_eq!(key, same_key_again, "identical tool+input must hash to the same cache key");
    assert!(cache.get(&same_key_again).is_some());

    let different_input = json!({"message": "bye"});
    let different_key = cache_key("system.echo", &different_input).unwrap();
    assert_ne!(key, different_key);
    assert!(cache.get(&different_key).is_none());
}
