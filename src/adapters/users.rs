//! User operations (slurmdbd-backed).

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    user_create_to_wire, user_to_canonical, user_update_to_wire, WireUsersResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{ListUsersOptions, User, UserCreateRequest, UserList, UserUpdateRequest};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical user manager bound to one protocol version.
#[derive(Clone)]
pub struct UserAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl UserAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        UserAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        UserAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    pub async fn list(&self, options: &ListUsersOptions) -> Result<UserList> {
        let transport = require_transport(&self.transport)?;

        let mut request = ApiRequest::get(format!("{}/users", self.profile.slurmdb_prefix));
        if options.with_deleted {
            request = request.with_query("with_deleted", "true");
        }
        let response = transport.execute(request).await?;
        let wire: WireUsersResponse = response.json()?;

        let mut users: Vec<User> = wire.users.into_iter().map(user_to_canonical).collect();

        if !options.names.is_empty() {
            users.retain(|u| options.names.iter().any(|n| *n == u.name));
        }

        let (users, total) = paginate(users, options.offset, options.limit);
        Ok(UserList { users, total })
    }

    pub async fn get(&self, name: &str) -> Result<User> {
        validate_name(name, "user.name")?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/user/{}", self.profile.slurmdb_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "user", name))?;

        let wire: WireUsersResponse = response.json()?;
        wire.users
            .into_iter()
            .next()
            .map(user_to_canonical)
            .ok_or(Error::NotFound {
                resource: "user",
                id: name.to_string(),
            })
    }

    pub async fn create(&self, request: &UserCreateRequest) -> Result<()> {
        validate_name(&request.name, "user.name")?;
        let transport = require_transport(&self.transport)?;

        let body = user_create_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/users", self.profile.slurmdb_prefix), body);
        transport.execute(api_request).await?;
        Ok(())
    }

    pub async fn update(&self, name: &str, request: &UserUpdateRequest) -> Result<()> {
        validate_name(name, "user.name")?;
        let transport = require_transport(&self.transport)?;

        let body = user_update_to_wire(name, request);
        let api_request =
            ApiRequest::post(format!("{}/users", self.profile.slurmdb_prefix), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "user", name))?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name, "user.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::delete(format!("{}/user/{}", self.profile.slurmdb_prefix, name));
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "user", name))?;
        Ok(())
    }
}
