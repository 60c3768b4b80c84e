//! Watch emulation driven through a real adapter with a scripted
//! transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use slurm_client::adapters::jobs::JobAdapter;
use slurm_client::adapters::profile::profile_for;
use slurm_client::errors::{Error, Result};
use slurm_client::models::{JobState, ListJobsOptions};
use slurm_client::transport::{ApiRequest, ApiResponse, Transport};
use slurm_client::version::ApiVersion;
use slurm_client::watch::{WatchEvent, WatchOptions};

/// Returns the scripted bodies one by one; the last repeats forever.
struct ScriptedTransport {
    bodies: Mutex<VecDeque<serde_json::Value>>,
}

impl ScriptedTransport {
    fn new(bodies: Vec<serde_json::Value>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            bodies: Mutex::new(bodies.into()),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, _request: ApiRequest) -> Result<ApiResponse> {
        let mut bodies = self.bodies.lock().expect("script lock");
        let body = if bodies.len() > 1 {
            bodies.pop_front().expect("non-empty script")
        } else {
            bodies.front().cloned().ok_or(Error::Http {
                status: 500,
                body: "script exhausted".to_string(),
            })?
        };
        Ok(ApiResponse {
            status: 200,
            body: serde_json::to_vec(&body).expect("serializable script"),
        })
    }
}

fn jobs_body(jobs: &[(u32, &str)]) -> serde_json::Value {
    json!({
        "jobs": jobs
            .iter()
            .map(|(id, state)| json!({
                "job_id": id,
                "name": format!("job{id}"),
                "user_name": "alice",
                "job_state": [state],
            }))
            .collect::<Vec<_>>(),
    })
}

fn fast_watch() -> WatchOptions {
    let _ = env_logger::builder().is_test(true).try_init();
    WatchOptions {
        poll_interval: Duration::from_millis(10),
        buffer: 16,
    }
}

#[tokio::test]
async fn job_watch_diffs_snapshots_through_the_adapter() {
    let transport = ScriptedTransport::new(vec![
        jobs_body(&[(1, "PENDING")]),
        jobs_body(&[(1, "RUNNING"), (2, "PENDING")]),
    ]);
    let adapter = JobAdapter::new(transport, profile_for(ApiVersion::V0_0_42).unwrap());

    let mut handle = adapter
        .watch(fast_watch(), ListJobsOptions::default())
        .unwrap();

    // Tick order: the state change on id 1 precedes the add of id 2.
    match handle.next().await.unwrap() {
        WatchEvent::StateChanged { previous, current } => {
            assert_eq!(previous, "PENDING");
            assert_eq!(current.job_id, 1);
            assert_eq!(current.state, JobState::Running);
        }
        other => panic!("expected StateChanged, got {other:?}"),
    }
    match handle.next().await.unwrap() {
        WatchEvent::Added(job) => assert_eq!(job.job_id, 2),
        other => panic!("expected Added, got {other:?}"),
    }

    handle.cancel();
}

#[tokio::test]
async fn job_watch_applies_the_list_filter() {
    // Bob's job changes state; the watch is filtered to alice, whose
    // only event is her own job appearing.
    let transport = ScriptedTransport::new(vec![
        json!({"jobs": [
            {"job_id": 1, "name": "job1", "user_name": "alice", "job_state": ["RUNNING"]},
            {"job_id": 2, "name": "job2", "user_name": "bob", "job_state": ["PENDING"]},
        ]}),
        json!({"jobs": [
            {"job_id": 1, "name": "job1", "user_name": "alice", "job_state": ["RUNNING"]},
            {"job_id": 2, "name": "job2", "user_name": "bob", "job_state": ["RUNNING"]},
            {"job_id": 3, "name": "job3", "user_name": "alice", "job_state": ["PENDING"]},
        ]}),
    ]);
    let adapter = JobAdapter::new(transport, profile_for(ApiVersion::V0_0_42).unwrap());

    let mut handle = adapter
        .watch(
            fast_watch(),
            ListJobsOptions {
                user_name: Some("alice".to_string()),
                ..ListJobsOptions::default()
            },
        )
        .unwrap();

    match handle.next().await.unwrap() {
        WatchEvent::Added(job) => {
            assert_eq!(job.job_id, 3);
            assert_eq!(job.user_name, "alice");
        }
        other => panic!("expected Added for alice's job, got {other:?}"),
    }

    handle.cancel();
}

#[tokio::test]
async fn detached_adapter_cannot_watch() {
    let adapter = JobAdapter::detached(profile_for(ApiVersion::V0_0_42).unwrap());
    assert!(matches!(
        adapter.watch(fast_watch(), ListJobsOptions::default()),
        Err(Error::ClientNotInitialized)
    ));
}
