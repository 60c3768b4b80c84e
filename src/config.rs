//! Client configuration.
//!
//! Loading from files or the environment is the caller's concern; this
//! crate only consumes the assembled [`ClientConfig`].

use std::time::Duration;

/// Credentials attached to every outgoing request.
///
/// slurmrestd authenticates via the `X-SLURM-USER-NAME` and
/// `X-SLURM-USER-TOKEN` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCredentials {
    pub user_name: String,
    pub token: String,
}

/// Configuration for a [`crate::client::ClientFactory`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the slurmrestd endpoint, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for retryable failures.
    pub max_retries: u32,
    /// Consecutive failures before the circuit breaker opens.
    pub breaker_threshold: u32,
    /// How long the breaker stays open after the last failure.
    pub breaker_cooldown: Duration,
    /// Credentials; `None` sends anonymous requests.
    pub auth: Option<AuthCredentials>,
    /// Log request/response summaries at debug level.
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:6820".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
            auth: None,
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given base URL, defaults elsewhere.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut url = base_url.into();
        while url.ends_with('/') {
            url.pop();
        }
        ClientConfig {
            base_url: url,
            ..ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_strips_trailing_slashes() {
        let config = ClientConfig::with_base_url("http://ctl:6820//");
        assert_eq!(config.base_url, "http://ctl:6820");
    }
}
