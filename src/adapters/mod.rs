//! Resource adapters: the canonical interface, one family for every
//! protocol version.
//!
//! Each adapter owns a shared [`Transport`] and a `&'static`
//! [`profile::VersionProfile`]; wire divergence between versions is
//! data in the profile, not duplicated adapter code. Every operation
//! follows the same shape: validate locally, require a bound
//! transport, encode for the bound version, execute, convert
//! defensively.

pub mod accounts;
pub mod associations;
pub mod base;
pub mod clusters;
pub mod info;
pub mod jobs;
pub mod nodes;
pub mod partitions;
pub mod profile;
pub mod qos;
pub mod reservations;
pub mod users;
pub mod wire;

use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::transport::Transport;

/// The transport, or `ClientNotInitialized` for a detached adapter.
pub(crate) fn require_transport(
    transport: &Option<Arc<dyn Transport>>,
) -> Result<&Arc<dyn Transport>> {
    transport.as_ref().ok_or(Error::ClientNotInitialized)
}

/// Re-map generic not-found outcomes onto the entity that was asked
/// for, so callers can match on resource and id.
pub(crate) fn map_not_found(err: Error, resource: &'static str, id: impl Into<String>) -> Error {
    if err.is_not_found() {
        Error::NotFound {
            resource,
            id: id.into(),
        }
    } else {
        err
    }
}
