//! Per-version wire profiles.
//!
//! One adapter family serves every supported protocol version; the
//! differences between versions live here as data. Each profile names
//! the endpoint prefixes and the capability flags that drive field
//! renames, dropped output fields, and `NotImplemented` answers.

use crate::version::ApiVersion;

/// Capability flags for one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Reservation create/update/delete endpoints exist (v0.0.43+).
    pub reservation_writes: bool,
    /// Job submission names the switch count `minimum_switches`
    /// (v0.0.40); later versions renamed it `required_switches`.
    pub legacy_switches_field: bool,
    /// Job output still reports the `exclusive` flag (dropped from the
    /// wire in v0.0.42).
    pub job_exclusive_in_output: bool,
}

/// Wire-level description of one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProfile {
    pub version: ApiVersion,
    /// Prefix for slurmctld-backed endpoints (jobs, nodes, ping, ...).
    pub slurm_prefix: &'static str,
    /// Prefix for slurmdbd-backed endpoints (accounts, QoS, ...).
    pub slurmdb_prefix: &'static str,
    pub caps: Capabilities,
}

static PROFILES: &[VersionProfile] = &[
    VersionProfile {
        version: ApiVersion::V0_0_40,
        slurm_prefix: "/slurm/v0.0.40",
        slurmdb_prefix: "/slurmdb/v0.0.40",
        caps: Capabilities {
            reservation_writes: false,
            legacy_switches_field: true,
            job_exclusive_in_output: true,
        },
    },
    VersionProfile {
        version: ApiVersion::V0_0_41,
        slurm_prefix: "/slurm/v0.0.41",
        slurmdb_prefix: "/slurmdb/v0.0.41",
        caps: Capabilities {
            reservation_writes: false,
            legacy_switches_field: false,
            job_exclusive_in_output: true,
        },
    },
    VersionProfile {
        version: ApiVersion::V0_0_42,
        slurm_prefix: "/slurm/v0.0.42",
        slurmdb_prefix: "/slurmdb/v0.0.42",
        caps: Capabilities {
            reservation_writes: false,
            legacy_switches_field: false,
            job_exclusive_in_output: false,
        },
    },
    VersionProfile {
        version: ApiVersion::V0_0_43,
        slurm_prefix: "/slurm/v0.0.43",
        slurmdb_prefix: "/slurmdb/v0.0.43",
        caps: Capabilities {
            reservation_writes: true,
            legacy_switches_field: false,
            job_exclusive_in_output: false,
        },
    },
];

/// The registered profile for `version`, if any.
///
/// A version that parses but has no profile here has no adapter set
/// and must be reported as unsupported by the factory.
pub fn profile_for(version: ApiVersion) -> Option<&'static VersionProfile> {
    PROFILES.iter().find(|p| p.version == version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SUPPORTED_VERSIONS;

    #[test]
    fn every_supported_version_has_a_profile() {
        for version in SUPPORTED_VERSIONS {
            let profile = profile_for(*version).expect("profile registered");
            assert_eq!(profile.version, *version);
            assert!(profile.slurm_prefix.ends_with(&version.to_string()));
        }
    }

    #[test]
    fn unregistered_version_has_no_profile() {
        assert!(profile_for(ApiVersion::new(0, 0, 39)).is_none());
    }

    #[test]
    fn reservation_writes_start_at_v0_0_43() {
        assert!(!profile_for(ApiVersion::V0_0_40).unwrap().caps.reservation_writes);
        assert!(!profile_for(ApiVersion::V0_0_42).unwrap().caps.reservation_writes);
        assert!(profile_for(ApiVersion::V0_0_43).unwrap().caps.reservation_writes);
    }
}
