//! Protocol version model for the Slurm REST API.
//!
//! A protocol version (`v0.0.42`) names a wire schema revision and is
//! distinct from the Slurm release (`25.05.3`) of the server speaking
//! it. The [`CompatibilityMatrix`] maps one to the other.

use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// A Slurm REST API protocol version, totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ApiVersion {
    pub const V0_0_40: ApiVersion = ApiVersion::new(0, 0, 40);
    pub const V0_0_41: ApiVersion = ApiVersion::new(0, 0, 41);
    pub const V0_0_42: ApiVersion = ApiVersion::new(0, 0, 42);
    pub const V0_0_43: ApiVersion = ApiVersion::new(0, 0, 43);

    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        ApiVersion { major, minor, patch }
    }

    /// Whether this version is in the supported registry.
    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.contains(self)
    }
}

/// Versions this client ships adapters for.
pub const SUPPORTED_VERSIONS: &[ApiVersion] = &[
    ApiVersion::V0_0_40,
    ApiVersion::V0_0_41,
    ApiVersion::V0_0_42,
    ApiVersion::V0_0_43,
];

/// The version used when auto-detection fails.
pub const DEFAULT_VERSION: ApiVersion = ApiVersion::V0_0_42;

/// The newest supported version.
pub fn latest_version() -> ApiVersion {
    *SUPPORTED_VERSIONS
        .iter()
        .max()
        .expect("supported version registry is non-empty")
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    /// Parses `v0.0.42` or `0.0.42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('v').unwrap_or(s);
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidVersion {
                value: s.to_string(),
                reason: format!("expected x.y.z, got {} component(s)", parts.len()),
            });
        }

        let component = |part: &str, name: &str| {
            part.parse::<u16>().map_err(|_| Error::InvalidVersion {
                value: s.to_string(),
                reason: format!("{name} component {part:?} is not numeric"),
            })
        };

        Ok(ApiVersion {
            major: component(parts[0], "major")?,
            minor: component(parts[1], "minor")?,
            patch: component(parts[2], "patch")?,
        })
    }
}

/// Maps Slurm release strings to the protocol versions they speak.
///
/// Resolution always picks the highest compatible protocol version.
#[derive(Debug, Clone)]
pub struct CompatibilityMatrix {
    /// (protocol version, release prefixes it is compatible with)
    entries: Vec<(ApiVersion, &'static [&'static str])>,
}

impl Default for CompatibilityMatrix {
    fn default() -> Self {
        CompatibilityMatrix {
            entries: vec![
                (ApiVersion::V0_0_40, &["24.05", "24.11", "25.05"]),
                (ApiVersion::V0_0_41, &["24.11", "25.05", "25.11"]),
                (ApiVersion::V0_0_42, &["25.05", "25.11"]),
                (ApiVersion::V0_0_43, &["25.05", "25.11"]),
            ],
        }
    }
}

impl CompatibilityMatrix {
    /// Whether `release` is covered by the declared range of `version`.
    pub fn is_release_supported(&self, version: ApiVersion, release: &str) -> bool {
        self.entries
            .iter()
            .filter(|(v, _)| *v == version)
            .any(|(_, prefixes)| prefixes.iter().any(|p| release.starts_with(p)))
    }

    /// Resolve a Slurm release string (e.g. `25.05.3`) to the highest
    /// compatible protocol version.
    pub fn resolve(&self, release: &str) -> Result<ApiVersion, Error> {
        if release.is_empty() || !release.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(Error::UnsupportedSlurmVersion(release.to_string()));
        }

        self.entries
            .iter()
            .filter(|(_, prefixes)| prefixes.iter().any(|p| release.starts_with(p)))
            .map(|(v, _)| *v)
            .max()
            .ok_or_else(|| Error::UnsupportedSlurmVersion(release.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("v0.0.40", ApiVersion::V0_0_40)]
    #[case("0.0.42", ApiVersion::V0_0_42)]
    #[case("v0.0.43", ApiVersion::V0_0_43)]
    fn parse_accepts_prefixed_and_bare_forms(#[case] input: &str, #[case] expected: ApiVersion) {
        assert_eq!(input.parse::<ApiVersion>().unwrap(), expected);
    }

    #[rstest]
    #[case("v0.0")]
    #[case("v0.0.42.1")]
    #[case("v0.x.42")]
    #[case("")]
    fn parse_rejects_malformed_input(#[case] input: &str) {
        assert!(matches!(
            input.parse::<ApiVersion>(),
            Err(Error::InvalidVersion { .. })
        ));
    }

    #[test]
    fn parse_round_trips_display() {
        for v in SUPPORTED_VERSIONS {
            assert_eq!(v.to_string().parse::<ApiVersion>().unwrap(), *v);
        }
    }

    #[test]
    fn ordering_is_three_component() {
        assert!(ApiVersion::V0_0_40 < ApiVersion::V0_0_41);
        assert!(ApiVersion::V0_0_43 > ApiVersion::V0_0_42);
        assert!(ApiVersion::new(1, 0, 0) > ApiVersion::new(0, 9, 99));
    }

    #[test]
    fn matrix_resolves_to_highest_compatible() {
        let matrix = CompatibilityMatrix::default();
        // 25.05 is covered by v0.0.40 through v0.0.43; highest wins.
        assert_eq!(matrix.resolve("25.05.3").unwrap(), ApiVersion::V0_0_43);
        assert_eq!(matrix.resolve("24.05.1").unwrap(), ApiVersion::V0_0_40);
    }

    #[test]
    fn matrix_rejects_unknown_release() {
        let matrix = CompatibilityMatrix::default();
        assert!(matches!(
            matrix.resolve("20.11"),
            Err(Error::UnsupportedSlurmVersion(_))
        ));
        assert!(matches!(
            matrix.resolve("not-a-release"),
            Err(Error::UnsupportedSlurmVersion(_))
        ));
    }

    #[test]
    fn latest_is_v0_0_43() {
        assert_eq!(latest_version(), ApiVersion::V0_0_43);
    }
}
