// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-serialize
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Contract version parsing and compatibility checks.
pub mod version;

use requiem_error::{ErrorCode, RequiemError};
use requiem_types::ExecutionEnvelope;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use version::{check_compatible, ContractVersion, VersionError};

/// Serialize `payload` wrapped in an [`ExecutionEnvelope`] to a canonical,
/// single-line JSON string (see `requiem-hash::canonicalize` for the
/// normalization rules applied).
///
/// # Errors
///
/// Returns [`RequiemError`] with [`ErrorCode::InternalError`] if the
/// envelope cannot be serialized.
pub fn encode_envelope<T: Serialize>(
    trace_id: &str,
    tenant_id: &str,
    produced_at: &str,
    payload: T,
) -> requiem_error::Result<String> {
    let envelope = ExecutionEnvelope::new(trace_id, tenant_id, produced_at, payload);
    requiem_hash::canonicalize(&envelope)
}

/// Decode a canonical envelope string, verifying its contract version is
/// compatible with this build before the payload is deserialized.
///
/// # Errors
///
/// Returns [`RequiemError`] with [`ErrorCode::InternalError`] if the string
/// is not valid JSON for an envelope of `T`, or if the embedded version is
/// malformed or incompatible with [`ContractVersion::current`].
pub fn decode_envelope<T: DeserializeOwned>(line: &str) -> requiem_error::Result<ExecutionEnvelope<T>> {
    let envelope: ExecutionEnvelope<T> = serde_json::from_str(line).map_err(|e| {
        RequiemError::new(ErrorCode::InternalError, "failed to decode envelope").with_cause(e)
    })?;
    let remote = ContractVersion::parse(&envelope.version).map_err(|e| {
        RequiemError::new(ErrorCode::InternalError, "envelope carries a malformed contract version")
            .with_cause(e)
    })?;
    check_compatible(&remote).map_err(|e| {
        RequiemError::new(ErrorCode::InternalError, "incompatible contract version")
            .with_cause(e)
    })?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn round_trips_through_encode_and_decode() {
        let line = encode_envelope("trace1", "tenant-a", "2026-07-28T00:00:00Z", Payload { value: 7 })
            .unwrap();
        let decoded: ExecutionEnvelope<Payload> = decode_envelope(&line).unwrap();
        assert_eq!(decoded.payload, Payload { value: 7 });
        assert_eq!(decoded.tenant_id, "tenant-a");
    }

    #[test]
    fn rejects_envelope_with_incompatible_major_version() {
        let mut line = encode_envelope("trace1", "tenant-a", "now", Payload { value: 1 }).unwrap();
        line = line.replace("requiem/v1.0", "requiem/v99.0");
        let result: requiem_error::Result<ExecutionEnvelope<Payload>> = decode_envelope(&line);
        assert!(result.is_err());
    }

    #[test]
    fn canonical_encoding_is_key_order_independent() {
        let a = encode_envelope("t", "tenant-a", "now", Payload { value: 1 }).unwrap();
        let b = encode_envelope("t", "tenant-a", "now", Payload { value: 1 }).unwrap();
        assert_eq!(a, b);
    }
}
