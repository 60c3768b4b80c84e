//! Account operations (slurmdbd-backed).

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    account_create_to_wire, account_to_canonical, account_update_to_wire, WireAccountsResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{
    Account, AccountCreateRequest, AccountList, AccountUpdateRequest, ListAccountsOptions,
};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical account manager bound to one protocol version.
#[derive(Clone)]
pub struct AccountAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl AccountAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        AccountAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        AccountAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    pub async fn list(&self, options: &ListAccountsOptions) -> Result<AccountList> {
        let transport = require_transport(&self.transport)?;

        let mut request = ApiRequest::get(format!("{}/accounts", self.profile.slurmdb_prefix));
        if options.with_deleted {
            request = request.with_query("with_deleted", "true");
        }
        let response = transport.execute(request).await?;
        let wire: WireAccountsResponse = response.json()?;

        let mut accounts: Vec<Account> =
            wire.accounts.into_iter().map(account_to_canonical).collect();

        if !options.names.is_empty() {
            accounts.retain(|a| options.names.iter().any(|n| *n == a.name));
        }

        let (accounts, total) = paginate(accounts, options.offset, options.limit);
        Ok(AccountList { accounts, total })
    }

    pub async fn get(&self, name: &str) -> Result<Account> {
        validate_name(name, "account.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::get(format!("{}/account/{}", self.profile.slurmdb_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "account", name))?;

        let wire: WireAccountsResponse = response.json()?;
        wire.accounts
            .into_iter()
            .next()
            .map(account_to_canonical)
            .ok_or(Error::NotFound {
                resource: "account",
                id: name.to_string(),
            })
    }

    /// Create an account. Self-parenting is rejected locally; deeper
    /// cycle checks belong to the hierarchy engine.
    pub async fn create(&self, request: &AccountCreateRequest) -> Result<()> {
        validate_name(&request.name, "account.name")?;
        if request.parent_account.as_deref() == Some(request.name.as_str()) {
            return Err(Error::validation(
                "account.parent_account",
                "account cannot be its own parent",
            ));
        }
        let transport = require_transport(&self.transport)?;

        let body = account_create_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/accounts", self.profile.slurmdb_prefix), body);
        transport.execute(api_request).await?;
        Ok(())
    }

    pub async fn update(&self, name: &str, request: &AccountUpdateRequest) -> Result<()> {
        validate_name(name, "account.name")?;
        let transport = require_transport(&self.transport)?;

        let body = account_update_to_wire(name, request);
        let api_request =
            ApiRequest::post(format!("{}/accounts", self.profile.slurmdb_prefix), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "account", name))?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name, "account.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::delete(format!("{}/account/{}", self.profile.slurmdb_prefix, name));
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "account", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;

    #[tokio::test]
    async fn self_parenting_account_is_rejected() {
        let adapter = AccountAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
        let request = AccountCreateRequest {
            name: "physics".into(),
            parent_account: Some("physics".into()),
            ..AccountCreateRequest::default()
        };
        assert!(matches!(
            adapter.create(&request).await,
            Err(Error::Validation { .. })
        ));
    }
}
