// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured contract version parsing and compatibility checks.

use std::fmt;

use requiem_types::CONTRACT_VERSION;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors parsing or comparing contract versions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The string did not match `"requiem/vMAJOR.MINOR"`.
    #[error("invalid version format (expected \"requiem/vMAJOR.MINOR\")")]
    InvalidFormat,
    /// The major component was not a valid integer.
    #[error("invalid major version component")]
    InvalidMajor,
    /// The minor component was not a valid integer.
    #[error("invalid minor version component")]
    InvalidMinor,
    /// Two versions have different major components and cannot interoperate.
    #[error("incompatible contract versions: local {local}, remote {remote}")]
    Incompatible {
        /// This build's version.
        local: ContractVersion,
        /// The peer's reported version.
        remote: ContractVersion,
    },
}

/// A parsed `"requiem/vMAJOR.MINOR"` contract version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractVersion {
    /// Major version. A mismatch is always incompatible.
    pub major: u32,
    /// Minor version. A receiver may be newer (higher minor) and still compatible.
    pub minor: u32,
}

impl ContractVersion {
    /// Parse a version string of the form `"requiem/vMAJOR.MINOR"`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the string does not match the expected format.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let rest = s.strip_prefix("requiem/v").ok_or(VersionError::InvalidFormat)?;
        let (major_str, minor_str) = rest.split_once('.').ok_or(VersionError::InvalidFormat)?;
        let major = major_str.parse::<u32>().map_err(|_| VersionError::InvalidMajor)?;
        let minor = minor_str.parse::<u32>().map_err(|_| VersionError::InvalidMinor)?;
        Ok(Self { major, minor })
    }

    /// Two versions are compatible when they share the same major version
    /// and `other.minor >= self.minor` (the remote side is at least as new).
    #[must_use]
    pub fn is_compatible(&self, other: &ContractVersion) -> bool {
        self.major == other.major && other.minor >= self.minor
    }

    /// The [`ContractVersion`] corresponding to [`CONTRACT_VERSION`].
    #[must_use]
    pub fn current() -> Self {
        Self::parse(CONTRACT_VERSION).expect("CONTRACT_VERSION must be a valid version string")
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requiem/v{}.{}", self.major, self.minor)
    }
}

/// Check that `remote` can interoperate with this build's [`ContractVersion::current`].
///
/// # Errors
///
/// Returns [`VersionError::Incompatible`] when the major versions differ.
pub fn check_compatible(remote: &ContractVersion) -> Result<(), VersionError> {
    let local = ContractVersion::current();
    if local.is_compatible(remote) || remote.is_compatible(&local) {
        Ok(())
    } else {
        Err(VersionError::Incompatible { local, remote: *remote })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_contract_version() {
        let v = ContractVersion::current();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 0);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(ContractVersion::parse("nope"), Err(VersionError::InvalidFormat));
        assert_eq!(ContractVersion::parse("requiem/v1"), Err(VersionError::InvalidFormat));
        assert_eq!(ContractVersion::parse("requiem/vX.0"), Err(VersionError::InvalidMajor));
    }

    #[test]
    fn same_major_newer_minor_is_compatible() {
        let a = ContractVersion { major: 1, minor: 0 };
        let b = ContractVersion { major: 1, minor: 3 };
        assert!(a.is_compatible(&b));
    }

    #[test]
    fn different_major_is_incompatible() {
        let remote = ContractVersion { major: 2, minor: 0 };
        assert!(check_compatible(&remote).is_err());
    }
}
