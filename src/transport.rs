//! HTTP transport shared by every resource adapter.
//!
//! [`Transport`] is the object-safe seam adapters and the version
//! detector call into; [`HttpTransport`] is the reqwest-backed
//! implementation carrying auth decoration, the retry policy, and a
//! circuit breaker. Non-success responses are classified into the
//! error taxonomy here so the retry layer can tell transient from
//! permanent outcomes.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::errors::{Error, Result};
use crate::retry::{execute_with_retry, RetryPolicy};
use crate::version::ApiVersion;

pub use reqwest::Method;

/// One canonical request before version-specific path encoding.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path, e.g. `/slurm/v0.0.42/jobs`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        ApiRequest {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        ApiRequest {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        ApiRequest {
            method: Method::DELETE,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A successful (2xx) response body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Conversion {
            resource: "response",
            id: String::new(),
            reason: e.to_string(),
        })
    }
}

/// Object-safe seam over the wire.
///
/// Implementations must return `Err` for any non-2xx outcome so the
/// retry policy can classify it; `Ok` always carries a success body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Circuit breaker state guarded by a lock.
///
/// Closed until `threshold` consecutive failures, then open (fail
/// fast) until `cooldown` has elapsed since the last failure; the
/// first request after the cooldown is the half-open trial. Any
/// success resets the failure counter.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        CircuitBreaker {
            threshold,
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Fails with [`Error::CircuitOpen`] while the breaker is open.
    pub fn check(&self) -> Result<()> {
        let state = self.state.lock().expect("breaker lock poisoned");
        if state.consecutive_failures < self.threshold {
            return Ok(());
        }
        match state.last_failure {
            Some(at) if at.elapsed() < self.cooldown => Err(Error::CircuitOpen),
            // Cooldown elapsed: let the half-open trial through.
            _ => Ok(()),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.consecutive_failures = 0;
        state.last_failure = None;
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        state.consecutive_failures += 1;
        state.last_failure = Some(Instant::now());
    }

    pub fn is_open(&self) -> bool {
        self.check().is_err()
    }
}

/// reqwest-backed transport bound to one base URL and one protocol
/// version (the version only annotates transport errors).
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    auth: Option<crate::config::AuthCredentials>,
    version: ApiVersion,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
    debug: bool,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, version: ApiVersion) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport { version, source: e })?;

        Ok(HttpTransport {
            http,
            base_url: config.base_url.clone(),
            auth: config.auth.clone(),
            version,
            retry: RetryPolicy::with_max_retries(config.max_retries),
            breaker: CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown),
            debug: config.debug,
        })
    }

    /// Override the retry policy (mainly for tests with short delays).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.breaker.check()?;

        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(auth) = &self.auth {
            builder = builder
                .header("X-SLURM-USER-NAME", &auth.user_name)
                .header("X-SLURM-USER-TOKEN", &auth.token);
        }

        if self.debug {
            debug!("{} {}", request.method, url);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                self.breaker.record_failure();
                return Err(Error::Transport {
                    version: self.version,
                    source: e,
                });
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(b) => b.to_vec(),
            Err(e) => {
                self.breaker.record_failure();
                return Err(Error::Transport {
                    version: self.version,
                    source: e,
                });
            }
        };

        trace!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        if (200..300).contains(&status) {
            self.breaker.record_success();
            return Ok(ApiResponse { status, body });
        }

        let err = Error::from_response(status, self.version, &body);
        // Server-side and throttling failures count against the
        // breaker; 4xx responses are the caller's problem.
        if err.is_retryable() {
            self.breaker.record_failure();
        } else {
            self.breaker.record_success();
        }
        Err(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        execute_with_retry(&self.retry, || self.send_once(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_opens_after_threshold_and_recovers() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(20));

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());

        // Cooldown elapses: the half-open trial is allowed.
        std::thread::sleep(Duration::from_millis(25));
        assert!(breaker.check().is_ok());

        // Trial failure reopens immediately.
        breaker.record_failure();
        assert!(breaker.is_open());

        // Trial success closes and resets the counter.
        std::thread::sleep(Duration::from_millis(25));
        breaker.record_success();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn request_builder_accumulates_query() {
        let req = ApiRequest::get("/slurm/v0.0.42/jobs")
            .with_query("update_time", "0")
            .with_query("flags", "SHOW_ALL");
        assert_eq!(req.query.len(), 2);
        assert_eq!(req.method, Method::GET);
    }
}
