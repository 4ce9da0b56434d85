// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-hash
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_error::{ErrorCode, RequiemError};
use serde::Serialize;
use serde_json::Value;

/// Number of decimal places floats are rounded to before hashing.
///
/// Chosen so that values derived from cost-in-cents arithmetic (which can
/// pick up float noise past the sixth place) still canonicalize identically.
pub const FLOAT_PRECISION: i32 = 6;

/// Normalize a JSON value into the runtime's canonical form.
///
/// Rules, applied recursively:
/// - object keys are sorted lexicographically (guaranteed by `serde_json`'s
///   default `BTreeMap`-backed `Map` as long as the `preserve_order` feature
///   is not enabled upstream);
/// - floats are rounded to [`FLOAT_PRECISION`] decimal places;
/// - `NaN` and `Infinity`/`-Infinity` collapse to `null`;
/// - string values are left untouched internally; only the canonicalized
///   document's outer serialization has no surrounding whitespace (there is
///   none to trim — no pretty-printing is ever used).
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.is_nan() || f.is_infinite() {
                    Value::Null
                } else {
                    let scale = 10f64.powi(FLOAT_PRECISION);
                    let rounded = (f * scale).round() / scale;
                    serde_json::Number::from_f64(rounded).map_or(Value::Null, Value::Number)
                }
            } else {
                Value::Number(n)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            let normalized = map.into_iter().map(|(k, v)| (k, normalize(v)));
            Value::Object(normalized.collect())
        }
        other => other,
    }
}

/// Produce the canonical JSON byte string for any serializable value.
///
/// # Errors
///
/// Returns [`RequiemError`] with [`ErrorCode::InternalError`] if `value`
/// cannot be serialized to JSON.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let a = requiem_hash::canonicalize(&json!({"b": 1, "a": 2.0000001})).unwrap();
/// let b = requiem_hash::canonicalize(&json!({"a": 2.0000001, "b": 1})).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn canonicalize<T: Serialize>(value: &T) -> requiem_error::Result<String> {
    let v = serde_json::to_value(value).map_err(|e| {
        RequiemError::new(ErrorCode::InternalError, "failed to serialize value for canonicalization")
            .with_cause(e)
    })?;
    let normalized = normalize(v);
    serde_json::to_string(&normalized).map_err(|e| {
        RequiemError::new(ErrorCode::InternalError, "failed to encode canonical form")
            .with_cause(e)
    })
}

/// Compute the raw 32-byte BLAKE3 digest of a value's canonical form.
///
/// # Errors
///
/// Propagates [`canonicalize`]'s errors.
pub fn digest<T: Serialize>(value: &T) -> requiem_error::Result<[u8; 32]> {
    let canon = canonicalize(value)?;
    Ok(*blake3::hash(canon.as_bytes()).as_bytes())
}

/// Compute the hex-encoded BLAKE3 digest of a value's canonical form.
///
/// This is the runtime's primary content address (spec §4.B): memory items,
/// replay cache keys, and registry schema fingerprints all use this.
///
/// # Errors
///
/// Propagates [`canonicalize`]'s errors.
///
/// # Examples
///
/// ```
/// let h1 = requiem_hash::digest_hex(&serde_json::json!({"x": 1})).unwrap();
/// let h2 = requiem_hash::digest_hex(&serde_json::json!({"x": 1})).unwrap();
/// assert_eq!(h1, h2);
/// assert_eq!(h1.len(), 64);
/// ```
pub fn digest_hex<T: Serialize>(value: &T) -> requiem_error::Result<String> {
    Ok(blake3::hash(canonicalize(value)?.as_bytes()).to_hex().to_string())
}

/// Compute the hex-encoded SHA-256 digest of a value's canonical form.
///
/// Kept for interoperability with call sites (or external auditors) that
/// verify content addresses with a SHA-256 toolchain instead of BLAKE3.
/// The runtime itself always writes and checks the BLAKE3 form.
///
/// # Errors
///
/// Propagates [`canonicalize`]'s errors.
pub fn sha256_hex<T: Serialize>(value: &T) -> requiem_error::Result<String> {
    use sha2::{Digest, Sha256};
    let canon = canonicalize(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canon.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Truncate a hex digest to its first `len` hex characters.
///
/// Used to build short cache keys (e.g. the 16-hex-character input digest
/// embedded in a replay cache key) without losing collision resistance for
/// the narrower use case a cache key serves.
#[must_use]
pub fn short_hex(full_hex: &str, len: usize) -> String {
    full_hex.chars().take(len).collect()
}
