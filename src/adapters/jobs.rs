//! Job operations.

use std::sync::Arc;

use crate::adapters::base::{paginate, validate_id_u32, validate_name};
use crate::adapters::profile::VersionProfile;
use crate::adapters::wire::{
    job_submit_to_wire, job_to_canonical, job_update_to_wire, opt_u32, WireJobSubmitResponse,
    WireJobsResponse,
};
use crate::adapters::{map_not_found, require_transport};
use crate::errors::{Error, Result};
use crate::models::{Job, JobList, JobSubmitRequest, JobSubmitResponse, JobUpdateRequest,
    ListJobsOptions};
use crate::transport::{ApiRequest, Transport};
use crate::version::ApiVersion;
use crate::watch::{spawn_watch, WatchHandle, WatchOptions};

/// Canonical job manager bound to one protocol version.
#[derive(Clone)]
pub struct JobAdapter {
    transport: Option<Arc<dyn Transport>>,
    profile: &'static VersionProfile,
}

impl JobAdapter {
    pub fn new(transport: Arc<dyn Transport>, profile: &'static VersionProfile) -> Self {
        JobAdapter {
            transport: Some(transport),
            profile,
        }
    }

    /// An adapter with no transport; every operation fails with
    /// [`Error::ClientNotInitialized`].
    pub fn detached(profile: &'static VersionProfile) -> Self {
        JobAdapter {
            transport: None,
            profile,
        }
    }

    pub fn version(&self) -> ApiVersion {
        self.profile.version
    }

    /// List jobs. Filters the wire protocol cannot express natively
    /// (user, account, partition, state) and pagination are applied
    /// client-side, filters first.
    pub async fn list(&self, options: &ListJobsOptions) -> Result<JobList> {
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/jobs", self.profile.slurm_prefix));
        let response = transport.execute(request).await?;
        let wire: WireJobsResponse = response.json()?;

        let mut jobs: Vec<Job> = wire
            .jobs
            .into_iter()
            .map(|w| job_to_canonical(w, self.profile))
            .collect();

        jobs.retain(|job| {
            options
                .user_name
                .as_deref()
                .is_none_or(|u| job.user_name == u)
                && options
                    .account
                    .as_deref()
                    .is_none_or(|a| job.account.as_deref() == Some(a))
                && options
                    .partition
                    .as_deref()
                    .is_none_or(|p| job.partition.as_deref() == Some(p))
                && (options.states.is_empty() || options.states.contains(&job.state))
        });

        let (jobs, total) = paginate(jobs, options.offset, options.limit);
        Ok(JobList { jobs, total })
    }

    pub async fn get(&self, job_id: u32) -> Result<Job> {
        validate_id_u32(Some(job_id), "job_id")?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::get(format!("{}/job/{}", self.profile.slurm_prefix, job_id));
        let response = transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "job", job_id.to_string()))?;

        let wire: WireJobsResponse = response.json()?;
        wire.jobs
            .into_iter()
            .next()
            .map(|w| job_to_canonical(w, self.profile))
            .ok_or(Error::NotFound {
                resource: "job",
                id: job_id.to_string(),
            })
    }

    pub async fn submit(&self, request: &JobSubmitRequest) -> Result<JobSubmitResponse> {
        validate_name(&request.name, "job.name")?;
        if request.script.is_empty() {
            return Err(Error::validation("job.script", "batch script is required"));
        }
        let transport = require_transport(&self.transport)?;

        let body = job_submit_to_wire(request, self.profile);
        let api_request =
            ApiRequest::post(format!("{}/job/submit", self.profile.slurm_prefix), body);
        let response = transport.execute(api_request).await?;

        let wire: WireJobSubmitResponse = response.json()?;
        let job_id = opt_u32(&wire.job_id).ok_or(Error::Conversion {
            resource: "job",
            id: request.name.clone(),
            reason: "submission response carried no job id".to_string(),
        })?;

        Ok(JobSubmitResponse {
            job_id,
            step_id: wire.step_id,
            message: wire.job_submit_user_msg,
        })
    }

    pub async fn update(&self, job_id: u32, request: &JobUpdateRequest) -> Result<()> {
        validate_id_u32(Some(job_id), "job_id")?;
        let transport = require_transport(&self.transport)?;

        let body = job_update_to_wire(request);
        let api_request =
            ApiRequest::post(format!("{}/job/{}", self.profile.slurm_prefix, job_id), body);
        transport
            .execute(api_request)
            .await
            .map_err(|e| map_not_found(e, "job", job_id.to_string()))?;
        Ok(())
    }

    pub async fn cancel(&self, job_id: u32) -> Result<()> {
        validate_id_u32(Some(job_id), "job_id")?;
        let transport = require_transport(&self.transport)?;

        let request =
            ApiRequest::delete(format!("{}/job/{}", self.profile.slurm_prefix, job_id));
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "job", job_id.to_string()))?;
        Ok(())
    }

    pub async fn hold(&self, job_id: u32) -> Result<()> {
        self.set_hold(job_id, true).await
    }

    pub async fn release(&self, job_id: u32) -> Result<()> {
        self.set_hold(job_id, false).await
    }

    async fn set_hold(&self, job_id: u32, hold: bool) -> Result<()> {
        validate_id_u32(Some(job_id), "job_id")?;
        let transport = require_transport(&self.transport)?;

        let request = ApiRequest::post(
            format!("{}/job/{}", self.profile.slurm_prefix, job_id),
            serde_json::json!({ "hold": hold }),
        );
        transport
            .execute(request)
            .await
            .map_err(|e| map_not_found(e, "job", job_id.to_string()))?;
        Ok(())
    }

    /// Watch jobs matching `filter` by polling the list endpoint.
    pub fn watch(
        &self,
        options: WatchOptions,
        filter: ListJobsOptions,
    ) -> Result<WatchHandle<Job>> {
        require_transport(&self.transport)?;

        let adapter = self.clone();
        Ok(spawn_watch(options, move || {
            let adapter = adapter.clone();
            let filter = filter.clone();
            async move { adapter.list(&filter).await.map(|list| list.jobs) }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;

    #[tokio::test]
    async fn detached_adapter_reports_not_initialized() {
        let adapter = JobAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
        assert!(matches!(
            adapter.get(1).await,
            Err(Error::ClientNotInitialized)
        ));
        assert!(matches!(
            adapter.list(&ListJobsOptions::default()).await,
            Err(Error::ClientNotInitialized)
        ));
    }

    #[tokio::test]
    async fn validation_runs_before_transport_check() {
        let adapter = JobAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
        // Invalid id fails validation even though no transport is bound.
        assert!(matches!(
            adapter.get(0).await,
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            adapter.submit(&JobSubmitRequest::default()).await,
            Err(Error::Validation { .. })
        ));
    }
}
