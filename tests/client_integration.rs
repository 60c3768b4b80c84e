//! End-to-end tests against a mock slurmrestd.

use httpmock::prelude::*;
use serde_json::json;

use slurm_client::client::ClientFactory;
use slurm_client::config::{AuthCredentials, ClientConfig};
use slurm_client::errors::Error;
use slurm_client::models::{JobState, ListJobsOptions};
use slurm_client::version::ApiVersion;

fn config_for(server: &MockServer) -> ClientConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    ClientConfig {
        max_retries: 0,
        ..ClientConfig::with_base_url(server.base_url())
    }
}

fn wire_job(id: u32, state: &str) -> serde_json::Value {
    json!({
        "job_id": {"set": true, "infinite": false, "number": id},
        "name": format!("job{id}"),
        "user_name": "alice",
        "partition": "batch",
        "job_state": [state],
    })
}

#[tokio::test]
async fn detection_failure_falls_back_to_default_version() {
    let server = MockServer::start_async().await;
    let introspection = server
        .mock_async(|when, then| {
            when.method(GET).path("/openapi/v3");
            then.status(404).body("not found");
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    // Construction must never fail on detection problems.
    let client = factory.client().await.expect("client construction");
    assert_eq!(client.version(), slurm_client::DEFAULT_VERSION);
    introspection.assert_async().await;
}

#[tokio::test]
async fn detection_reads_protocol_version_from_info_field() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openapi/v3");
            then.status(200)
                .json_body(json!({"info": {"version": "0.0.41"}, "servers": []}));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client().await.unwrap();
    assert_eq!(client.version(), ApiVersion::V0_0_41);
}

#[tokio::test]
async fn detection_routes_slurm_release_through_matrix() {
    let server = MockServer::start_async().await;
    let introspection = server
        .mock_async(|when, then| {
            when.method(GET).path("/openapi/v3");
            then.status(200)
                .json_body(json!({"info": {"version": "Slurm-25.05.3"}}));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client().await.unwrap();
    assert_eq!(client.version(), ApiVersion::V0_0_43);

    // The first result is cached: a second client does not re-probe.
    let again = factory.client().await.unwrap();
    assert_eq!(again.version(), ApiVersion::V0_0_43);
    introspection.assert_hits_async(1).await;
}

#[tokio::test]
async fn detection_scans_server_base_paths() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/openapi/v3");
            then.status(200).json_body(json!({
                "info": {"version": "unparseable"},
                "servers": [{"url": "/slurm/v0.0.40/"}],
            }));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client().await.unwrap();
    assert_eq!(client.version(), ApiVersion::V0_0_40);
}

#[tokio::test]
async fn list_jobs_applies_filters_then_pagination() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slurm/v0.0.42/jobs");
            then.status(200).json_body(json!({
                "jobs": (1..=10).map(|i| wire_job(i, "RUNNING")).collect::<Vec<_>>(),
            }));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    let page = client
        .jobs()
        .list(&ListJobsOptions {
            limit: 2,
            offset: 1,
            ..ListJobsOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 10);
    let ids: Vec<u32> = page.jobs.iter().map(|j| j.job_id).collect();
    assert_eq!(ids, vec![2, 3]);

    // Out-of-range offset: empty page, total unchanged.
    let empty = client
        .jobs()
        .list(&ListJobsOptions {
            offset: 15,
            ..ListJobsOptions::default()
        })
        .await
        .unwrap();
    assert!(empty.jobs.is_empty());
    assert_eq!(empty.total, 10);

    // A state filter nobody matches: empty with total zero.
    let none = client
        .jobs()
        .list(&ListJobsOptions {
            states: vec![JobState::Failed],
            ..ListJobsOptions::default()
        })
        .await
        .unwrap();
    assert!(none.jobs.is_empty());
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn structured_error_payload_surfaces_as_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slurm/v0.0.42/job/999");
            then.status(400).json_body(json!({
                "errors": [{
                    "error_number": 2017,
                    "error": "SLURM_INVALID_JOB_ID",
                    "source": "job_id",
                    "description": "Invalid job id specified",
                }],
            }));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    // The invalid-job-id payload classifies as not-found and is
    // re-tagged with the resource that was asked for.
    match client.jobs().get(999).await.unwrap_err() {
        Error::NotFound { resource, id } => {
            assert_eq!(resource, "job");
            assert_eq!(id, "999");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn plain_error_body_surfaces_as_http_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slurm/v0.0.42/jobs");
            then.status(400).body("bad request");
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    match client
        .jobs()
        .list(&ListJobsOptions::default())
        .await
        .unwrap_err()
    {
        Error::Http { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad request");
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_retries_server_errors_until_budget_exhausted() {
    let server = MockServer::start_async().await;
    let flaky = server
        .mock_async(|when, then| {
            when.method(GET).path("/slurm/v0.0.42/jobs");
            then.status(503).body("unavailable");
        })
        .await;

    let config = ClientConfig {
        max_retries: 2,
        ..ClientConfig::with_base_url(server.base_url())
    };
    let factory = ClientFactory::new(config);
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    let err = client
        .jobs()
        .list(&ListJobsOptions::default())
        .await
        .unwrap_err();
    match err {
        Error::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last.status(), Some(503));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    // Initial attempt plus two retries.
    flaky.assert_hits_async(3).await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let rejected = server
        .mock_async(|when, then| {
            when.method(GET).path("/slurm/v0.0.42/jobs");
            then.status(403).body("forbidden");
        })
        .await;

    let config = ClientConfig {
        max_retries: 5,
        ..ClientConfig::with_base_url(server.base_url())
    };
    let factory = ClientFactory::new(config);
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    let err = client
        .jobs()
        .list(&ListJobsOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));
    rejected.assert_hits_async(1).await;
}

#[tokio::test]
async fn auth_credentials_decorate_every_request() {
    let server = MockServer::start_async().await;
    let authed = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/slurm/v0.0.42/ping")
                .header("X-SLURM-USER-NAME", "alice")
                .header("X-SLURM-USER-TOKEN", "secret");
            then.status(200).json_body(json!({
                "pings": [{"hostname": "ctl0", "pinged": "UP", "mode": "primary"}],
            }));
        })
        .await;

    let config = ClientConfig {
        auth: Some(AuthCredentials {
            user_name: "alice".to_string(),
            token: "secret".to_string(),
        }),
        ..config_for(&server)
    };
    let factory = ClientFactory::new(config);
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    let pings = client.info().ping().await.unwrap();
    assert_eq!(pings.len(), 1);
    assert_eq!(pings[0].hostname, "ctl0");
    assert!(pings[0].primary);
    authed.assert_async().await;
}

#[tokio::test]
async fn explicit_unsupported_version_is_rejected() {
    let server = MockServer::start_async().await;
    let factory = ClientFactory::new(config_for(&server));

    assert!(matches!(
        factory.client_with_version(ApiVersion::new(0, 0, 39)),
        Err(Error::UnsupportedVersion(_))
    ));
}

#[tokio::test]
async fn slurm_release_resolution_failure_is_surfaced() {
    let server = MockServer::start_async().await;
    let factory = ClientFactory::new(config_for(&server));

    assert!(matches!(
        factory.client_for_slurm_version("20.11"),
        Err(Error::UnsupportedSlurmVersion(_))
    ));

    let client = factory.client_for_slurm_version("25.05.3").unwrap();
    assert_eq!(client.version(), ApiVersion::V0_0_43);
}

#[tokio::test]
async fn reservation_writes_are_gated_by_version() {
    let server = MockServer::start_async().await;
    let factory = ClientFactory::new(config_for(&server));

    let old = factory.client_with_version(ApiVersion::V0_0_41).unwrap();
    let request = slurm_client::models::ReservationCreateRequest {
        name: "maint".to_string(),
        users: vec!["root".to_string()],
        ..Default::default()
    };
    assert!(matches!(
        old.reservations().create(&request).await,
        Err(Error::NotImplemented { operation: "reservation.create", .. })
    ));
}

#[tokio::test]
async fn hierarchy_is_built_from_fresh_association_listing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slurmdb/v0.0.42/associations");
            then.status(200).json_body(json!({
                "associations": [
                    {"account": "root", "cluster": "main",
                     "shares_raw": {"set": true, "number": 1}},
                    {"account": "physics", "cluster": "main", "parent_account": "root",
                     "shares_raw": {"set": true, "number": 100}},
                    {"account": "physics", "user": "alice", "cluster": "main",
                     "parent_account": "root",
                     "shares_raw": {"set": true, "number": 40},
                     "max": {"jobs": {"active": {"set": true, "number": 10}}}},
                    {"account": "physics", "user": "bob", "cluster": "main",
                     "parent_account": "root",
                     "shares_raw": {"set": true, "number": 60},
                     "max": {"jobs": {"active": {"set": true, "number": 20}}}},
                ],
            }));
        })
        .await;

    let factory = ClientFactory::new(config_for(&server));
    let client = factory.client_with_version(ApiVersion::V0_0_42).unwrap();

    let hierarchy = client.account_hierarchy("root").await.unwrap();
    assert_eq!(hierarchy.total_sub_accounts, 1);
    assert_eq!(hierarchy.total_users, 2);
    assert_eq!(hierarchy.children[0].account, "physics");

    let fairshare = client.fairshare_tree("root").await.unwrap();
    // Shares sum across every association of the account.
    assert_eq!(fairshare.children[0].shares, 200);

    // physics is already under root; re-linking root below physics
    // must be rejected as a cycle.
    assert!(matches!(
        client.validate_hierarchy("root", "physics").await,
        Err(Error::CircularDependency(_))
    ));
}
