// SPDX-License-Identifier: MIT OR Apache-2.0

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single content-addressed item in the tenant-scoped memory store.
///
/// `content_hash` is the BLAKE3 digest (see `requiem-hash::digest_hex`) of
/// `content` *after* redaction — the store never hashes or persists the
/// pre-redaction form.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemoryItem {
    /// Prefixed ULID identifying this item (`mem_<ULID>`).
    pub id: String,
    /// Tenant this item belongs to. Every read/write is scoped by this field.
    pub tenant_id: String,
    /// Redacted content, as stored.
    pub content: Value,
    /// Hex-encoded BLAKE3 digest of the redacted content's canonical form.
    pub content_hash: String,
    /// Whether redaction altered the content before storage.
    pub was_redacted: bool,
    /// Free-form metadata attached at store time.
    pub metadata: Value,
    /// RFC-3339 creation timestamp.
    pub created_at: String,
    /// Optional pointer into an external vector index, for embedding-backed
    /// retrieval layered on top of this store.
    pub vector_pointer: Option<String>,
}
