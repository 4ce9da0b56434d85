// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-memory
#![deny(unsafe_code)]
#![warn(missing_docs)]

use dashmap::DashMap;
use requiem_error::{ErrorCode, RequiemError};
use requiem_id::SharedClock;
use requiem_types::MemoryItem;
use serde_json::Value;
use std::sync::Arc;

const DEFAULT_LIST_LIMIT: usize = 100;

fn require_tenant(tenant_id: &str) -> requiem_error::Result<()> {
    if tenant_id.is_empty() {
        Err(RequiemError::new(ErrorCode::TenantRequired, "tenant_id must not be empty"))
    } else {
        Ok(())
    }
}

/// A tenant-scoped, content-addressed store of [`MemoryItem`]s.
///
/// Cheap to clone: partitions live behind an `Arc<DashMap<..>>`, one entry
/// per tenant.
#[derive(Clone)]
pub struct MemoryStore {
    partitions: Arc<DashMap<String, Vec<MemoryItem>>>,
    clock: SharedClock,
}

impl MemoryStore {
    /// Create an empty store using `clock` for `created_at` timestamps.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self { partitions: Arc::new(DashMap::new()), clock }
    }

    /// Redact `content`, hash it, and append a new item — or return the
    /// existing one if `(tenant_id, content_hash)` is already present.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TenantRequired`] if `tenant_id` is empty.
    pub fn store(
        &self,
        tenant_id: &str,
        content: Value,
        metadata: Value,
    ) -> requiem_error::Result<MemoryItem> {
        require_tenant(tenant_id)?;

        let redacted = requiem_redact::redact(&content);
        let was_redacted = redacted != content;
        let content_hash = requiem_hash::digest_hex(&redacted)?;

        let mut partition = self.partitions.entry(tenant_id.to_string()).or_default();
        if let Some(existing) = partition.iter().find(|item| item.content_hash == content_hash) {
            return Ok(existing.clone());
        }

        let item = MemoryItem {
            id: requiem_id::new_id("mem"),
            tenant_id: tenant_id.to_string(),
            content: redacted,
            content_hash,
            was_redacted,
            metadata,
            created_at: self.clock.now_rfc3339(),
            vector_pointer: None,
        };
        partition.push(item.clone());
        Ok(item)
    }

    /// Look up an item by its content hash.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TenantRequired`] if `tenant_id` is empty.
    pub fn get_by_hash(&self, tenant_id: &str, hash: &str) -> requiem_error::Result<Option<MemoryItem>> {
        require_tenant(tenant_id)?;
        Ok(self
            .partitions
            .get(tenant_id)
            .and_then(|p| p.iter().find(|item| item.content_hash == hash).cloned()))
    }

    /// Look up an item by its id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TenantRequired`] if `tenant_id` is empty.
    pub fn get_by_id(&self, tenant_id: &str, id: &str) -> requiem_error::Result<Option<MemoryItem>> {
        require_tenant(tenant_id)?;
        Ok(self.partitions.get(tenant_id).and_then(|p| p.iter().find(|item| item.id == id).cloned()))
    }

    /// List a tenant's items in insertion order, capped at `limit` (defaults
    /// to 100 when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TenantRequired`] if `tenant_id` is empty.
    pub fn list(&self, tenant_id: &str, limit: Option<usize>) -> requiem_error::Result<Vec<MemoryItem>> {
        require_tenant(tenant_id)?;
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        Ok(self
            .partitions
            .get(tenant_id)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    /// Delete an item by id. Returns `true` if an item was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TenantRequired`] if `tenant_id` is empty.
    pub fn delete(&self, tenant_id: &str, id: &str) -> requiem_error::Result<bool> {
        require_tenant(tenant_id)?;
        let Some(mut partition) = self.partitions.get_mut(tenant_id) else {
            return Ok(false);
        };
        let before = partition.len();
        partition.retain(|item| item.id != id);
        Ok(partition.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use requiem_id::FixedClock;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(FixedClock::new(0)))
    }

    #[test]
    fn storing_same_content_twice_returns_existing_item() {
        let s = store();
        let a = s.store("t1", json!({"note": "hi"}), json!({})).unwrap();
        let b = s.store("t1", json!({"note": "hi"}), json!({})).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(s.list("t1", None).unwrap().len(), 1);
    }

    #[test]
    fn store_redacts_secrets_before_hashing() {
        let s = store();
        let item = s.store("t1", json!({"api_key": "sk-abcdefghijklmnopqrstuvwx"}), json!({})).unwrap();
        assert!(item.was_redacted);
        assert_eq!(item.content["api_key"], json!("[REDACTED]"));
    }

    #[test]
    fn empty_tenant_id_is_rejected() {
        let s = store();
        let err = s.store("", json!({}), json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::TenantRequired);
    }

    #[test]
    fn get_by_hash_and_id_find_the_same_item() {
        let s = store();
        let item = s.store("t1", json!({"a": 1}), json!({})).unwrap();
        let by_hash = s.get_by_hash("t1", &item.content_hash).unwrap().unwrap();
        let by_id = s.get_by_id("t1", &item.id).unwrap().unwrap();
        assert_eq!(by_hash.id, by_id.id);
    }

    #[test]
    fn tenants_are_isolated() {
        let s = store();
        let item = s.store("t1", json!({"a": 1}), json!({})).unwrap();
        assert!(s.get_by_id("t2", &item.id).unwrap().is_none());
    }

    #[test]
    fn delete_removes_item() {
        let s = store();
        let item = s.store("t1", json!({"a": 1}), json!({})).unwrap();
        assert!(s.delete("t1", &item.id).unwrap());
        assert!(s.get_by_id("t1", &item.id).unwrap().is_none());
    }
}
