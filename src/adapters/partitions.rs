//! Partition operations.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{partition_to_canonical, WirePartitionsResponse};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{ListPartitionsOptions, Partition, PartitionList};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;
use crate::watch::{spawn_watch, WatchHandle, WatchOptions};

/// Canonical partition manager bound to one protocol version.
#[derive(Clone)]
pub struct PartitionAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl PartitionAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        PartitionAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        PartitionAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    pub async fn list(&self, options: &ListPartitionsOptions) -> Result<PartitionList> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/partitions", self.profile.slurm_prefix));
        let response = transport.execute(request).await?;
        let wire: WirePartitionsResponse = response.json()?;

        let mut partitions: Vec<Partition> = wire
            .partitions
            .into_iter()
            .map(partition_to_canonical)
            .collect();

        partitions
            .retain(|p| options.states.is_empty() || options.states.contains(&p.state));

        let (partitions, total) = paginate(partitions, options.offset, options.limit);
        Ok(PartitionList { partitions, total })
    }

    pub async fn get(&self, name: &str) -> Result<Partition> {
        validate_name(name, "partition.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::get(format!("{}/partition/{}", self.profile.slurm_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "partition", name))?;

        let wire: WirePartitionsResponse = response.json()?;
        wire.partitions
            .into_iter()
            .next()
            .map(partition_to_canonical)
            .ok_or(Error::NotFound {
                resource: "partition",
                id: name.to_string(),
            })
    }

    /// Watch partitions by polling the list endpoint.
    pub fn watch(
        &self,
        options: WatchOptions,
        filter: ListPartitionsOptions,
    ) -> Result<WatchHandle<Partition>> {
        require_transport(&self.transport)?;

        let adapter = self.clone();
        Ok(spawn_watch(options, move || {
            let adapter = adapter.clone();
            let filter = filter.clone();
            async move { adapter.list(&filter).await.map(|list| list.partitions) }
        }))
    }
}
