//! Client factory and the canonical client handle.
//!
//! The factory resolves a protocol version (explicit, auto-detected,
//! or derived from a Slurm release string) and assembles the matching
//! adapter set behind one [`SlurmClient`]. A handle is immutable
//! after construction and safe to share across tasks.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::adapters::accounts::AccountAdapter;
use crate::adapters::associations::AssociationAdapter;
use crate::adapters::clusters::ClusterAdapter;
use crate::adapters::info::InfoAdapter;
use crate::adapters::jobs::JobAdapter;
use crate::adapters::nodes::NodeAdapter;
use crate::adapters::partitions::PartitionAdapter;
use crate::adapters::profile::profile_for;
use crate::adapters::qos::QosAdapter;
use crate::adapters::reservations::ReservationAdapter;
use crate::adapters::users::UserAdapter;
use crate::config::ClientConfig;
use crate::detect::detect_version;
use crate::errors::{Error, Result};
use crate::hierarchy::{self, AccountHierarchy, FairShareNode};
use crate::transport::{HttpTransport, Transport};
use crate::version::{ApiVersion, CompatibilityMatrix, DEFAULT_VERSION, SUPPORTED_VERSIONS};

/// Creates [`SlurmClient`] handles for a configured endpoint.
pub struct ClientFactory {
    config: ClientConfig,
    matrix: CompatibilityMatrix,
    /// First successful detection result, kept for the factory's
    /// lifetime. No TTL, no re-detection.
    detected: Mutex<Option<ApiVersion>>,
}

impl ClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        ClientFactory {
            config,
            matrix: CompatibilityMatrix::default(),
            detected: Mutex::new(None),
        }
    }

    /// Versions this factory can bind adapters for.
    pub fn supported_versions(&self) -> &'static [ApiVersion] {
        SUPPORTED_VERSIONS
    }

    /// Build a client by auto-detection.
    ///
    /// Detection failure never blocks construction: any failure falls
    /// back to the default version silently (logged at debug).
    pub async fn client(&self) -> Result<SlurmClient> {
        let version = match self.detect().await {
            Ok(version) => version,
            Err(err) => {
                debug!("version detection failed, using {DEFAULT_VERSION}: {err}");
                DEFAULT_VERSION
            }
        };
        self.build(version)
    }

    /// Build a client for an explicitly requested version.
    pub fn client_with_version(&self, version: ApiVersion) -> Result<SlurmClient> {
        if !version.is_supported() {
            return Err(Error::UnsupportedVersion(version));
        }
        self.build(version)
    }

    /// Build a client for the backend's own release string, resolved
    /// through the compatibility matrix only. Unlike auto-detection,
    /// failure here is surfaced.
    pub fn client_for_slurm_version(&self, release: &str) -> Result<SlurmClient> {
        let version = self.matrix.resolve(release)?;
        self.build(version)
    }

    async fn detect(&self) -> Result<ApiVersion> {
        if let Some(version) = *self.detected.lock().expect("detection cache poisoned") {
            return Ok(version);
        }

        let probe = HttpTransport::new(&self.config, DEFAULT_VERSION)?;
        let version = detect_version(&probe, &self.matrix).await?;

        *self.detected.lock().expect("detection cache poisoned") = Some(version);
        Ok(version)
    }

    /// Assemble the adapter set for a resolved version. A version
    /// that parses but has no registered adapter profile is still
    /// unsupported.
    fn build(&self, version: ApiVersion) -> Result<SlurmClient> {
        let profile = profile_for(version).ok_or(Error::UnsupportedVersion(version))?;
        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&self.config, version)?);

        Ok(SlurmClient {
            version,
            jobs: JobAdapter::new(transport.clone(), profile),
            nodes: NodeAdapter::new(transport.clone(), profile),
            partitions: PartitionAdapter::new(transport.clone(), profile),
            accounts: AccountAdapter::new(transport.clone(), profile),
            users: UserAdapter::new(transport.clone(), profile),
            qos: QosAdapter::new(transport.clone(), profile),
            reservations: ReservationAdapter::new(transport.clone(), profile),
            associations: AssociationAdapter::new(transport.clone(), profile),
            clusters: ClusterAdapter::new(transport.clone(), profile),
            info: InfoAdapter::new(transport, profile),
        })
    }
}

/// The canonical, version-agnostic client handle.
///
/// Owns exactly one resolved protocol version and one bound adapter
/// set; cloning shares both.
#[derive(Clone)]
pub struct SlurmClient {
    version: ApiVersion,
    jobs: JobAdapter,
    nodes: NodeAdapter,
    partitions: PartitionAdapter,
    accounts: AccountAdapter,
    users: UserAdapter,
    qos: QosAdapter,
    reservations: ReservationAdapter,
    associations: AssociationAdapter,
    clusters: ClusterAdapter,
    info: InfoAdapter,
}

impl SlurmClient {
    /// The protocol version this handle is bound to.
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn jobs(&self) -> &JobAdapter {
        &self.jobs
    }

    pub fn nodes(&self) -> &NodeAdapter {
        &self.nodes
    }

    pub fn partitions(&self) -> &PartitionAdapter {
        &self.partitions
    }

    pub fn accounts(&self) -> &AccountAdapter {
        &self.accounts
    }

    pub fn users(&self) -> &UserAdapter {
        &self.users
    }

    pub fn qos(&self) -> &QosAdapter {
        &self.qos
    }

    pub fn reservations(&self) -> &ReservationAdapter {
        &self.reservations
    }

    pub fn associations(&self) -> &AssociationAdapter {
        &self.associations
    }

    pub fn clusters(&self) -> &ClusterAdapter {
        &self.clusters
    }

    pub fn info(&self) -> &InfoAdapter {
        &self.info
    }

    /// Build the account hierarchy from a fresh association listing.
    pub async fn account_hierarchy(&self, root: &str) -> Result<AccountHierarchy> {
        let associations = self.associations.list_all().await?;
        hierarchy::account_hierarchy(root, &associations)
    }

    /// Build the fairshare tree from a fresh association listing.
    pub async fn fairshare_tree(&self, root: &str) -> Result<FairShareNode> {
        let associations = self.associations.list_all().await?;
        Ok(hierarchy::fairshare_tree(root, &associations))
    }

    /// Validate that linking `account` under `parent` would keep the
    /// hierarchy acyclic, against a fresh association listing.
    pub async fn validate_hierarchy(&self, account: &str, parent: &str) -> Result<()> {
        let associations = self.associations.list_all().await?;
        hierarchy::validate_hierarchy(account, parent, &associations)
    }
}
