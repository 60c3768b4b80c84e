//! Node operations.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{node_to_canonical, node_update_to_wire, WireNodesResponse};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{ListNodesOptions, Node, NodeList, NodeState, NodeUpdateRequest};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;
use crate::watch::{spawn_watch, WatchHandle, WatchOptions};

/// Canonical node manager bound to one protocol version.
#[derive(Clone)]
pub struct NodeAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl NodeAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        NodeAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        NodeAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    pub async fn list(&self, options: &ListNodesOptions) -> Result<NodeList> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/nodes", self.profile.slurm_prefix));
        let response = transport.execute(request).await?;
        let wire: WireNodesResponse = response.json()?;

        let mut nodes: Vec<Node> = wire.nodes.into_iter().map(node_to_canonical).collect();

        nodes.retain(|node| {
            (options.states.is_empty() || options.states.contains(&node.state))
                && options
                    .partition
                    .as_deref()
                    .is_none_or(|p| node.partitions.iter().any(|np| np == p))
        });

        let (nodes, total) = paginate(nodes, options.offset, options.limit);
        Ok(NodeList { nodes, total })
    }

    pub async fn get(&self, name: &str) -> Result<Node> {
        validate_name(name, "node.name")?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/node/{}", self.profile.slurm_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "node", name))?;

        let wire: WireNodesResponse = response.json()?;
        wire.nodes
            .into_iter()
            .next()
            .map(node_to_canonical)
            .ok_or(Error::NotFound {
                resource: "node",
                id: name.to_string(),
            })
    }

    /// Update a node's administrative state. Draining or downing a
    /// node requires a reason, matching slurmctld's own rule.
    pub async fn update(&self, name: &str, request: &NodeUpdateRequest) -> Result<()> {
        validate_name(name, "node.name")?;
        if matches!(request.state, Some(NodeState::Down) | Some(NodeState::Draining))
            && request.reason.as_deref().unwrap_or("").is_empty()
        {
            return Err(Error::validation(
                "node.reason",
                "a reason is required when downing or draining a node",
            ));
        }
        let transport = require_transport(&self.transport)?;

        let body = node_update_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/node/{}", self.profile.slurm_prefix, name), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "node", name))?;
        Ok(())
    }

    /// Watch nodes matching `filter` by polling the list endpoint.
    pub fn watch(
        &self,
        options: WatchOptions,
        filter: ListNodesOptions,
    ) -> Result<WatchHandle<Node>> {
        require_transport(&self.transport)?;

        let adapter = self.clone();
        Ok(spawn_watch(options, move || {
            let adapter = adapter.clone();
            let filter = filter.clone();
            async move { adapter.list(&filter).await.map(|list| list.nodes) }
        }))
    }
}
