//! Reservation operations.
//!
//! Reservation listing exists in every supported protocol version;
//! the write endpoints only appeared in v0.0.43. On earlier versions
//! create/update/delete answer [`Error::NotImplemented`] rather than
//! attempting a lossy translation.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    reservation_create_to_wire, reservation_to_canonical, reservation_update_to_wire,
    WireReservationsResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{
    ListReservationsOptions, Reservation, ReservationCreateRequest, ReservationList,
    ReservationUpdateRequest,
};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;

/// Canonical reservation manager bound to one protocol version.
#[derive(Clone)]
pub struct ReservationAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl ReservationAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        ReservationAdapter {
            transport: Some(transport),
            profile,
        }
    }

    pub fn detached(profile: &'static VersionProfile) -> Self {
        ReservationAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    fn require_writes(&self, operation: &'static str) -> Result<()> {
        if !self.profile.caps.reservation_writes {
            return Err(Error::NotImplemented {
                operation,
                version: self.profile.version,
            });
        }
        Ok(())
    }

    pub async fn list(&self, options: &ListReservationsOptions) -> Result<ReservationList> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/reservations", self.profile.slurm_prefix));
        let response = transport.execute(request).await?;
        let wire: WireReservationsResponse = response.json()?;

        let mut reservations: Vec<Reservation> = wire
            .reservations
            .into_iter()
            .map(reservation_to_canonical)
            .collect();

        if !options.names.is_empty() {
            reservations.retain(|r| options.names.iter().any(|n| *n == r.name));
        }

        let (reservations, total) = paginate(reservations, options.offset, options.limit);
        Ok(ReservationList { reservations, total })
    }

    pub async fn get(&self, name: &str) -> Result<Reservation> {
        validate_name(name, "reservation.name")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::get(format!("{}/reservation/{}", self.profile.slurm_prefix, name));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "reservation", name))?;

        let wire: WireReservationsResponse = response.json()?;
        wire.reservations
            .into_iter()
            .next()
            .map(reservation_to_canonical)
            .ok_or(Error::NotFound {
                resource: "reservation",
                id: name.to_string(),
            })
    }

    /// Create a reservation (v0.0.43+). At least one of users or
    /// accounts must be named, matching slurmctld's own rule.
    pub async fn create(&self, request: &ReservationCreateRequest) -> Result<()> {
        validate_name(&request.name, "reservation.name")?;
        if request.users.is_empty() && request.accounts.is_empty() {
            return Err(Error::validation(
                "reservation.users",
                "a reservation needs at least one user or account",
            ));
        }
        if let (Some(start), Some(end)) = (request.start_time, request.end_time) {
            if end <= start {
                return Err(Error::validation(
                    "reservation.end_time",
                    "end time must be after start time",
                ));
            }
        }
        self.require_writes("reservation.create")?;
        let transport = require_transport(&self.transport)?;

        let body = reservation_create_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/reservations", self.profile.slurm_prefix), body);
        transport.execute(api_request).await?;
        Ok(())
    }

    /// Update a reservation (v0.0.43+).
    pub async fn update(&self, name: &str, request: &ReservationUpdateRequest) -> Result<()> {
        validate_name(name, "reservation.name")?;
        self.require_writes("reservation.update")?;
        let transport = require_transport(&self.transport)?;

        let body = reservation_update_to_wire(name, request);
        let api_request =
            ApiRequest::post(format!("{}/reservations", self.profile.slurm_prefix), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "reservation", name))?;
        Ok(())
    }

    /// Delete a reservation (v0.0.43+).
    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name, "reservation.name")?;
        self.require_writes("reservation.delete")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::delete(format!("{}/reservation/{}", self.profile.slurm_prefix, name));
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "reservation", name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;

    #[tokio::test]
    async fn writes_are_not_implemented_before_v0_0_43() {
        let adapter = ReservationAdapter::detached(profile_for(ApiVersion::V0_0_40).unwrap());
        let request = ReservationCreateRequest {
            name: "maint".into(),
            users: vec!["root".into()],
            ..ReservationCreateRequest::default()
        };

        match adapter.create(&request).await.unwrap_err() {
            Error::NotImplemented { operation, version } => {
                assert_eq!(operation, "reservation.create");
                assert_eq!(version, ApiVersion::V0_0_40);
            }
            other => panic!("expected NotImplemented, got {other:?}"),
        }

        assert!(matches!(
            adapter.delete("maint").await,
            Err(Error::NotImplemented { .. })
        ));
    }

    #[tokio::test]
    async fn reservation_needs_users_or_accounts() {
        let adapter = ReservationAdapter::detached(profile_for(ApiVersion::V0_0_43).unwrap());
        let request = ReservationCreateRequest {
            name: "maint".into(),
            ..ReservationCreateRequest::default()
        };
        assert!(matches!(
            adapter.create(&request).await,
            Err(Error::Validation { .. })
        ));
    }
}
