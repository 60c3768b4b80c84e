//! Error taxonomy shared by every adapter and engine in the crate.
//!
//! Every failure is representable as one [`Error`] variant and is
//! inspectable programmatically (kind, resource, identifier, HTTP
//! status) rather than by message text only.

use thiserror::Error;

use crate::version::ApiVersion;

/// One structured error entry from a Slurm REST error payload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub error_number: Option<i32>,
    #[serde(default, rename = "error")]
    pub error_code: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error_code.as_deref().unwrap_or("UNKNOWN"),
            self.description.as_deref().unwrap_or("no description")
        )
    }
}

/// Errors produced by the Slurm client.
#[derive(Debug, Error)]
pub enum Error {
    /// A version string did not parse as `v<major>.<minor>.<patch>`.
    #[error("invalid API version {value:?}: {reason}")]
    InvalidVersion { value: String, reason: String },

    /// A parseable version with no registered adapter set.
    #[error("unsupported API version {0}")]
    UnsupportedVersion(ApiVersion),

    /// No supported API version covers the given Slurm release.
    #[error("no compatible API version for Slurm release {0:?}")]
    UnsupportedSlurmVersion(String),

    /// Version auto-detection failed. Never surfaced through plain
    /// client construction, which falls back to the default version.
    #[error("version detection failed: {0}")]
    DetectionFailed(String),

    /// Local request validation failed; the transport was never reached.
    #[error("validation failed for {field}: {reason}")]
    Validation {
        field: String,
        value: Option<String>,
        reason: String,
    },

    /// An operation was invoked on a client without a bound transport.
    #[error("client not initialized")]
    ClientNotInitialized,

    /// The HTTP round trip itself failed (connect, timeout, DNS, body).
    #[error("transport error (API {version}): {source}")]
    Transport {
        version: ApiVersion,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success response carrying a structured Slurm error list.
    #[error("Slurm API error (status {status}, API {version}): {}", format_details(.errors))]
    Api {
        status: u16,
        version: ApiVersion,
        errors: Vec<ApiErrorDetail>,
    },

    /// Non-success response with no parseable error payload.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The requested entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The operation cannot be expressed in the bound protocol version.
    #[error("operation {operation} is not implemented for API {version}")]
    NotImplemented {
        operation: &'static str,
        version: ApiVersion,
    },

    /// A wire entity could not be converted to its canonical form.
    #[error("failed to convert {resource} {id}: {reason}")]
    Conversion {
        resource: &'static str,
        id: String,
        reason: String,
    },

    /// Linking two accounts would create a cycle.
    #[error("circular dependency: {0}")]
    CircularDependency(String),

    /// An account hierarchy constraint was violated (self-parenting etc).
    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    /// A retryable operation failed on every attempt.
    #[error("request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    /// The circuit breaker is open; the request was not sent.
    #[error("circuit breaker open, request not attempted")]
    CircuitOpen,

    /// One or more items of a batch operation failed, keyed by index.
    #[error("{} of {total} batch items failed", .failures.len())]
    Batch {
        total: usize,
        failures: Vec<(usize, Error)>,
    },
}

fn format_details(errors: &[ApiErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Convenience constructor for validation failures.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            value: None,
            reason: reason.into(),
        }
    }

    /// Validation failure that records the offending value.
    pub fn validation_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Error::Validation {
            field: field.into(),
            value: Some(value.to_string()),
            reason: reason.into(),
        }
    }

    /// Whether the retry policy may re-attempt the operation.
    ///
    /// Retryable: network-level transport failures, 5xx, and 429.
    /// Never retryable: validation, not-initialized, 4xx other than 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Error::Api { status, .. } | Error::Http { status, .. } => {
                *status >= 500 || *status == 429
            }
            _ => false,
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::Http { status, .. } => Some(*status),
            Error::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Error::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Whether this error means the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status, errors, .. } => {
                *status == 404
                    || errors.iter().any(|e| {
                        matches!(
                            e.error_code.as_deref(),
                            Some("SLURM_INVALID_JOB_ID") | Some("SLURM_NO_CHANGE_IN_DATA")
                        )
                    })
            }
            Error::Http { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether this error was produced before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::ClientNotInitialized
                | Error::InvalidVersion { .. }
                | Error::UnsupportedVersion(_)
                | Error::NotImplemented { .. }
        )
    }

    /// Build an error from a non-success HTTP response body.
    ///
    /// Slurm error payloads look like
    /// `{"errors": [{"error_number": .., "error": .., "source": .., "description": ..}]}`.
    /// A body without that shape falls back to [`Error::Http`].
    pub fn from_response(status: u16, version: ApiVersion, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorEnvelope {
            #[serde(default)]
            errors: Vec<ApiErrorDetail>,
        }

        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) {
            if !envelope.errors.is_empty() {
                return Error::Api {
                    status,
                    version,
                    errors: envelope.errors,
                };
            }
        }

        Error::Http {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::ApiVersion;

    #[test]
    fn structured_payload_parses_into_api_error() {
        let body = br#"{
            "errors": [
                {"error_number": 2017, "error": "SLURM_INVALID_JOB_ID",
                 "source": "job_id", "description": "Invalid job id specified"}
            ]
        }"#;
        let err = Error::from_response(400, ApiVersion::V0_0_42, body);
        match &err {
            Error::Api { status, errors, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].error_code.as_deref(), Some("SLURM_INVALID_JOB_ID"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(err.is_not_found());
    }

    #[test]
    fn non_json_body_falls_back_to_http_error() {
        let err = Error::from_response(502, ApiVersion::V0_0_42, b"bad gateway");
        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bad gateway");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn retryability_follows_status_class() {
        assert!(Error::Http { status: 503, body: String::new() }.is_retryable());
        assert!(Error::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!Error::Http { status: 404, body: String::new() }.is_retryable());
        assert!(!Error::validation("name", "required").is_retryable());
        assert!(!Error::ClientNotInitialized.is_retryable());
    }

    #[test]
    fn status_is_visible_through_retry_wrapper() {
        let inner = Error::Http { status: 503, body: String::new() };
        let wrapped = Error::RetriesExhausted { attempts: 3, last: Box::new(inner) };
        assert_eq!(wrapped.status(), Some(503));
    }
}
