//! Protocol version auto-detection.
//!
//! slurmrestd publishes an OpenAPI description at `/openapi/v3` whose
//! `info.version` field and server base paths both leak the protocol
//! version. Detection tries, in order:
//!
//! 1. `info.version` as a bare protocol version (`0.0.42`);
//! 2. `info.version` as a product-prefixed release (`Slurm-25.05.3`),
//!    routed through the [`CompatibilityMatrix`];
//! 3. a `v<x>.<y>.<z>` token in any declared server base path.

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::transport::{ApiRequest, Transport};
use crate::version::{ApiVersion, CompatibilityMatrix};

/// Path of the introspection endpoint, relative to the base URL.
pub const OPENAPI_PATH: &str = "/openapi/v3";

#[derive(Debug, Deserialize)]
struct OpenApiDescription {
    #[serde(default)]
    info: OpenApiInfo,
    #[serde(default)]
    servers: Vec<OpenApiServer>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenApiInfo {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenApiServer {
    #[serde(default)]
    url: String,
}

/// Detect the protocol version spoken by the server behind `transport`.
///
/// The caller (the factory) caches the first successful result; this
/// function performs a fresh probe every time it is invoked.
pub async fn detect_version(
    transport: &dyn Transport,
    matrix: &CompatibilityMatrix,
) -> Result<ApiVersion> {
    let response = transport
        .execute(ApiRequest::get(OPENAPI_PATH))
        .await
        .map_err(|e| Error::DetectionFailed(format!("introspection request failed: {e}")))?;

    let description: OpenApiDescription = serde_json::from_slice(&response.body)
        .map_err(|e| Error::DetectionFailed(format!("unparseable OpenAPI description: {e}")))?;

    if let Some(reported) = description.info.version.as_deref() {
        if let Some(version) = version_from_info(reported, matrix) {
            debug!("detected API version {version} from info.version {reported:?}");
            return Ok(version);
        }
    }

    for server in &description.servers {
        if let Some(version) = version_from_base_path(&server.url) {
            debug!("detected API version {version} from server path {:?}", server.url);
            return Ok(version);
        }
    }

    Err(Error::DetectionFailed(
        "no protocol version in info.version or server base paths".to_string(),
    ))
}

/// Strategies 1 and 2: the structured version field.
fn version_from_info(reported: &str, matrix: &CompatibilityMatrix) -> Option<ApiVersion> {
    if let Some(release) = reported.strip_prefix("Slurm-") {
        return matrix.resolve(release).ok();
    }

    reported
        .parse::<ApiVersion>()
        .ok()
        .filter(ApiVersion::is_supported)
}

/// Strategy 3: scan base path segments for a version-shaped token.
fn version_from_base_path(url: &str) -> Option<ApiVersion> {
    let pattern = Regex::new(r"^v\d+\.\d+\.\d+$").expect("static regex");
    url.split('/')
        .filter(|segment| pattern.is_match(segment))
        .filter_map(|segment| segment.parse::<ApiVersion>().ok())
        .find(ApiVersion::is_supported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_version_parses_bare_form() {
        let matrix = CompatibilityMatrix::default();
        assert_eq!(
            version_from_info("0.0.42", &matrix),
            Some(ApiVersion::V0_0_42)
        );
        assert_eq!(
            version_from_info("v0.0.40", &matrix),
            Some(ApiVersion::V0_0_40)
        );
        // Parseable but unsupported versions are rejected.
        assert_eq!(version_from_info("9.9.9", &matrix), None);
    }

    #[test]
    fn info_version_routes_slurm_releases_through_matrix() {
        let matrix = CompatibilityMatrix::default();
        assert_eq!(
            version_from_info("Slurm-25.05.3", &matrix),
            Some(ApiVersion::V0_0_43)
        );
        assert_eq!(version_from_info("Slurm-20.11.0", &matrix), None);
    }

    #[test]
    fn base_path_scan_finds_version_segment() {
        assert_eq!(
            version_from_base_path("/slurm/v0.0.41/"),
            Some(ApiVersion::V0_0_41)
        );
        assert_eq!(
            version_from_base_path("/slurmdb/v0.0.43"),
            Some(ApiVersion::V0_0_43)
        );
        assert_eq!(version_from_base_path("/slurm/latest/"), None);
        assert_eq!(version_from_base_path(""), None);
    }
}
