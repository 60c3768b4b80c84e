//! QoS operations (slurmdbd-backed).
//!
//! QoS requests carry a few edge-case rules of their own beyond the
//! shared validation: a QoS cannot preempt itself, usage factors are
//! bounded, and names must be clean of separators.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name, validate_non_negative};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    qos_create_to_wire, qos_to_canonical, qos_update_to_wire, WireQosResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{ListQosOptions, Qos, QosCreateRequest, QosList, QosUpdateRequest};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Largest accepted usage factor, matching slurmdbd's own bound.
const MAX_USAGE_FACTOR: f64 = 10_000.0;

/// Canonical QoS manager bound to one protocol version.
#[derive(Clone)]
pub struct QosAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl QosAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        QosAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        QosAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    fn validate_qos_name(name: &str) -> Result<()> {
        validate_name(name, "qos.name")?;
        if name.contains(',') || name.chars().any(char::is_whitespace) {
            return Err(Error::validation_value(
                "qos.name",
                name,
                "name must not contain commas or whitespace",
            ));
        }
        Ok(())
    }

    fn validate_common(
        name: &str,
        preempts: &[String],
        usage_factor: Option<f64>,
    ) -> Result<()> {
        Self::validate_qos_name(name)?;
        if preempts.iter().any(|p| p == name) {
            return Err(Error::validation_value(
                "qos.preempts",
                name,
                "QoS cannot preempt itself",
            ));
        }
        if let Some(factor) = usage_factor {
            validate_non_negative(factor, "qos.usage_factor")?;
            if factor > MAX_USAGE_FACTOR {
                return Err(Error::validation_value(
                    "qos.usage_factor",
                    factor,
                    "usage factor out of range",
                ));
            }
        }
        Ok(())
    }

    pub async fn list(&self, options: &ListQosOptions) -> Result<QosList> {
        let transport = require_transport(&self.transport)?;

        let mut request = ApiRequest::get(format!("{}/qos", self.profile.slurmdb_prefix));
        if options.with_deleted {
            request = request.with_query("with_deleted", "true");
        }
        let response = transport.execute(request).await?;
        let wire: WireQosResponse = response.json()?;

        let mut entries: Vec<Qos> = wire.qos.into_iter().map(qos_to_canonical).collect();

        if !options.names.is_empty() {
            entries.retain(|q| options.names.iter().any(|n| *n == q.name));
        }

        let (entries, total) = paginate(entries, options.offset, options.limit);
        Ok(QosList { qos: entries, total })
    }

    pub async fn get(&self, name: &str) -> Result<Qos> {
        Self::validate_qos_name(name)?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/qos/{}", self.profile.slurmdb_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "qos", name))?;

        let wire: WireQosResponse = response.json()?;
        wire.qos
            .into_iter()
            .next()
            .map(qos_to_canonical)
            .ok_or(Error::NotFound {
                resource: "qos",
                id: name.to_string(),
            })
    }

    pub async fn create(&self, request: &QosCreateRequest) -> Result<()> {
        Self::validate_common(&request.name, &request.preempts, request.usage_factor)?;
        let transport = require_transport(&self.transport)?;

        let body = qos_create_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/qos", self.profile.slurmdb_prefix), body);
        transport.execute(api_request).await?;
        Ok(())
    }

    pub async fn update(&self, name: &str, request: &QosUpdateRequest) -> Result<()> {
        Self::validate_common(name, &[], request.usage_factor)?;
        let transport = require_transport(&self.transport)?;

        let body = qos_update_to_wire(name, request);
        let api_request =
            ApiRequest::post(format!("{}/qos", self.profile.slurmdb_prefix), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "qos", name))?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        Self::validate_qos_name(name)?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::delete(format!("{}/qos/{}", self.profile.slurmdb_prefix, name));
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "qos", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;

    fn adapter() -> QosAdapter {
        QosAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap())
    }

    #[tokio::test]
    async fn qos_cannot_preempt_itself() {
        let request = QosCreateRequest {
            name: "high".into(),
            preempts: vec!["low".into(), "high".into()],
            ..QosCreateRequest::default()
        };
        let err = adapter().create(&request).await.unwrap_err();
        assert!(err.to_string().contains("preempt itself"), "{err}");
    }

    #[tokio::test]
    async fn usage_factor_bounds_are_enforced() {
        let negative = QosCreateRequest {
            name: "burst".into(),
            usage_factor: Some(-1.0),
            ..QosCreateRequest::default()
        };
        assert!(matches!(
            adapter().create(&negative).await,
            Err(Error::Validation { .. })
        ));

        let huge = QosCreateRequest {
            name: "burst".into(),
            usage_factor: Some(20_000.0),
            ..QosCreateRequest::default()
        };
        assert!(matches!(
            adapter().create(&huge).await,
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn qos_name_must_be_clean() {
        let request = QosCreateRequest {
            name: "a,b".into(),
            ..QosCreateRequest::default()
        };
        assert!(matches!(
            adapter().create(&request).await,
            Err(Error::Validation { .. })
        ));
    }
}
