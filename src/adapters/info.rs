//! Controller info operations: ping and version report.

use std::sync::Arc;

use crate::adapters::profile::VersionProfile;
use crate::adapters::require_transport;
use crate::adapters::wire::{ping_to_canonical, WirePingsResponse};
use crate::errors::Result;
use crate::models::{ApiInfo, Ping};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical info manager bound to one protocol version.
#[derive(Clone)]
pub struct InfoAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl InfoAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        InfoAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        InfoAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    /// Ping every controller behind the bound endpoint.
    pub async fn ping(&self) -> Result<Vec<Ping>> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/ping", self.profile.slurm_prefix));
        let response = transport.execute(request).await?;
        let wire: WirePingsResponse = response.json()?;

        Ok(wire.pings.into_iter().map(ping_to_canonical).collect())
    }

    /// Version information for the bound client. The server release
    /// is read from the OpenAPI description when it reports one.
    pub async fn api_info(&self) -> Result<ApiInfo> {
        let transport = require_transport(&self.transport)?;

        #[derive(serde::Deserialize, Default)]
        struct Description {
            #[serde(default)]
            info: DescriptionInfo,
        }
        #[derive(serde::Deserialize, Default)]
        struct DescriptionInfo {
            #[serde(default)]
            version: Option<String>,
        }

        let response = transport
            .execute(ApiRequest::get(crate::detect::OPENAPI_PATH))
            .await?;
        let description: Description = response.json().unwrap_or_default();

        let release = description
            .info
            .version
            .as_deref()
            .and_then(|v| v.strip_prefix("Slurm-"))
            .map(str::to_string);

        Ok(ApiInfo {
            release,
            protocol_version: self.profile.version.to_string(),
        })
    }
}
