//! Cluster operations (slurmdbd-backed).

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{cluster_to_canonical, WireClustersResponse};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{Cluster, ClusterList, ListClustersOptions};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical cluster manager bound to one protocol version.
#[derive(Clone)]
pub struct ClusterAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl ClusterAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        ClusterAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        ClusterAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    pub async fn list(&self, options: &ListClustersOptions) -> Result<ClusterList> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/clusters", self.profile.slurmdb_prefix));
        let response = transport.execute(request).await?;
        let wire: WireClustersResponse = response.json()?;

        let mut clusters: Vec<Cluster> =
            wire.clusters.into_iter().map(cluster_to_canonical).collect();

        if !options.names.is_empty() {
            clusters.retain(|c| options.names.iter().any(|n| *n == c.name));
        }

        let (clusters, total) = paginate(clusters, options.offset, options.limit);
        Ok(ClusterList { clusters, total })
    }

    pub async fn get(&self, name: &str) -> Result<Cluster> {
        validate_name(name, "cluster.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::get(format!("{}/cluster/{}", self.profile.slurmdb_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "cluster", name))?;

        let wire: WireClustersResponse = response.json()?;
        wire.clusters
            .into_iter()
            .next()
            .map(cluster_to_canonical)
            .ok_or(Error::NotFound {
                resource: "cluster",
                id: name.to_string(),
            })
    }
}
