// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-capability
#![deny(unsafe_code)]
#![warn(missing_docs)]

use requiem_error::{ErrorCode, RequiemError};
use requiem_types::InvocationContext;

/// Capabilities granted implicitly by a role, independent of whatever is
/// listed in [`InvocationContext::capabilities`].
///
/// Admin receives a wildcard (every capability check against an admin
/// context short-circuits to true); viewer and member get nothing beyond
/// what's explicitly granted.
#[must_use]
pub fn role_grants_wildcard(role: requiem_id::TenantRole) -> bool {
    role == requiem_id::TenantRole::Admin
}

/// Whether `context` holds `required`, combining the role wildcard with
/// explicitly granted capabilities.
#[must_use]
pub fn has_capability(context: &InvocationContext, required: &str) -> bool {
    role_grants_wildcard(context.role) || context.has_capability(required)
}

/// Check a tool's single required capability (if any) against `context`.
///
/// # Errors
///
/// Returns [`ErrorCode::CapabilityMissing`] if the tool names a required
/// capability the context doesn't hold.
pub fn check_capability(
    context: &InvocationContext,
    required_capability: Option<&str>,
) -> requiem_error::Result<()> {
    let Some(required) = required_capability else {
        return Ok(());
    };
    if has_capability(context, required) {
        Ok(())
    } else {
        Err(RequiemError::new(
            ErrorCode::CapabilityMissing,
            format!("missing required capability '{required}'"),
        )
        .with_detail("required_capability", required)
        .with_detail("tenant_id", &context.tenant_id))
    }
}

/// Check a full set of required capabilities (`tool.required_capabilities ⊆
/// context.capabilities`), returning the first missing one as an error.
///
/// # Errors
///
/// Returns [`ErrorCode::CapabilityMissing`] naming the first capability in
/// `required` that `context` doesn't hold.
pub fn check_capabilities(
    context: &InvocationContext,
    required: &[String],
) -> requiem_error::Result<()> {
    for cap in required {
        check_capability(context, Some(cap.as_str()))?;
    }
    Ok(())
}
