//! Association operations (slurmdbd-backed).
//!
//! Associations are also the raw input for the hierarchy and
//! fairshare engines; [`AssociationAdapter::list_all`] is the
//! unpaginated listing those engines rebuild their trees from.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_id_u32, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    association_create_to_wire, association_to_canonical, association_update_to_wire,
    WireAssociationsResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{
    Association, AssociationCreateRequest, AssociationList, AssociationUpdateRequest,
    ListAssociationsOptions,
};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical association manager bound to one protocol version.
#[derive(Clone)]
pub struct AssociationAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl AssociationAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        AssociationAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        AssociationAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    /// List associations. Account/user/cluster filters ride the query
    /// string where slurmdbd supports them; partition filtering and
    /// pagination are client-side.
    pub async fn list(&self, options: &ListAssociationsOptions) -> Result<AssociationList> {
        let transport = require_transport(&self.transport)?;

        let mut request =
            ApiRequest::get(format!("{}/associations", self.profile.slurmdb_prefix));
        if !options.accounts.is_empty() {
            request = request.with_query("account", options.accounts.join(","));
        }
        if !options.users.is_empty() {
            request = request.with_query("user", options.users.join(","));
        }
        if !options.clusters.is_empty() {
            request = request.with_query("cluster", options.clusters.join(","));
        }

        let response = transport.execute(request).await?;
        let wire: WireAssociationsResponse = response.json()?;

        let mut associations: Vec<Association> = wire
            .associations
            .into_iter()
            .map(association_to_canonical)
            .collect();

        if !options.partitions.is_empty() {
            associations.retain(|a| {
                a.partition
                    .as_deref()
                    .is_some_and(|p| options.partitions.iter().any(|f| f == p))
            });
        }

        let (associations, total) = paginate(associations, options.offset, options.limit);
        Ok(AssociationList { associations, total })
    }

    /// The full association set, unfiltered and unpaginated. Hierarchy
    /// and fairshare queries start from this.
    pub async fn list_all(&self) -> Result<Vec<Association>> {
        Ok(self
            .list(&ListAssociationsOptions::default())
            .await?
            .associations)
    }

    pub async fn get(&self, id: u32) -> Result<Association> {
        validate_id_u32(Some(id), "association.id")?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/associations", self.profile.slurmdb_prefix))
            .with_query("id", id.to_string());
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "association", id.to_string()))?;

        let wire: WireAssociationsResponse = response.json()?;
        wire.associations
            .into_iter()
            .map(association_to_canonical)
            .find(|a| a.id == Some(id))
            .ok_or(Error::NotFound {
                resource: "association",
                id: id.to_string(),
            })
    }

    /// Create an association. A user-level association cannot also
    /// declare a parent account; parents belong to account-level
    /// associations only.
    pub async fn create(&self, request: &AssociationCreateRequest) -> Result<()> {
        validate_name(&request.account, "association.account")?;
        validate_name(&request.cluster, "association.cluster")?;
        if !request.user.is_empty() && request.parent_account.is_some() {
            return Err(Error::validation(
                "association.parent_account",
                "user and parent_account are mutually exclusive",
            ));
        }
        if request.parent_account.as_deref() == Some(request.account.as_str()) {
            return Err(Error::validation(
                "association.parent_account",
                "account cannot be its own parent",
            ));
        }
        let transport = require_transport(&self.transport)?;

        let body = association_create_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/associations", self.profile.slurmdb_prefix), body);
        transport.execute(api_request).await?;
        Ok(())
    }

    pub async fn update(&self, id: u32, request: &AssociationUpdateRequest) -> Result<()> {
        validate_id_u32(Some(id), "association.id")?;
        let transport = require_transport(&self.transport)?;

        let body = association_update_to_wire(id, request);
        let api_request =
            ApiRequest::post(format!("{}/associations", self.profile.slurmdb_prefix), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "association", id.to_string()))?;
        Ok(())
    }

    /// Delete the association binding `user` (possibly empty for the
    /// account-level association) to `account` on `cluster`.
    pub async fn delete(&self, account: &str, user: &str, cluster: &str) -> Result<()> {
        validate_name(account, "association.account")?;
        validate_name(cluster, "association.cluster")?;
        let transport = require_transport(&self.transport)?;

        let mut request =
            ApiRequest::delete(format!("{}/associations", self.profile.slurmdb_prefix))
                .with_query("account", account)
                .with_query("cluster", cluster);
        if !user.is_empty() {
            request = request.with_query("user", user);
        }
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "association", format!("{account}/{user}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;

    #[tokio::test]
    async fn user_and_parent_account_are_mutually_exclusive() {
        let adapter = AssociationAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
        let request = AssociationCreateRequest {
            account: "physics".into(),
            user: "alice".into(),
            cluster: "main".into(),
            parent_account: Some("science".into()),
            ..AssociationCreateRequest::default()
        };
        let err = adapter.create(&request).await.unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"), "{err}");
    }

    #[tokio::test]
    async fn association_self_parent_is_rejected() {
        let adapter = AssociationAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
        let request = AssociationCreateRequest {
            account: "physics".into(),
            cluster: "main".into(),
            parent_account: Some("physics".into()),
            ..AssociationCreateRequest::default()
        };
        assert!(matches!(
            adapter.create(&request).await,
            Err(Error::Validation { .. })
        ));
    }
}
