//! Version-agnostic client for the Slurm REST API.
//!
//! slurmrestd speaks several incompatible wire-schema revisions
//! (v0.0.40 through v0.0.43 here). This crate hides that divergence
//! behind one canonical interface: a [`client::ClientFactory`]
//! resolves a protocol version (explicit, auto-detected from the
//! OpenAPI description, or derived from a Slurm release string) and
//! hands out a [`client::SlurmClient`] whose per-resource adapters
//! translate canonical requests and entities to and from that
//! version's wire shapes.
//!
//! Beyond plain CRUD the crate carries:
//!
//! - a polling [`watch`] emulation for the push channel the wire
//!   protocol lacks;
//! - a [`hierarchy`] engine deriving account trees, quotas, and
//!   fairshare from flat association listings;
//! - an [`analytics`] engine bucketing job samples into time series
//!   with trend regression and anomaly screening.
//!
//! ```no_run
//! use slurm_client::client::ClientFactory;
//! use slurm_client::config::ClientConfig;
//! use slurm_client::models::ListJobsOptions;
//!
//! # async fn run() -> slurm_client::errors::Result<()> {
//! let factory = ClientFactory::new(ClientConfig::with_base_url("http://ctl:6820"));
//! let client = factory.client().await?;
//! let jobs = client.jobs().list(&ListJobsOptions::default()).await?;
//! println!("{} jobs ({} total)", jobs.jobs.len(), jobs.total);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod analytics;
pub mod client;
pub mod config;
pub mod detect;
pub mod errors;
pub mod hierarchy;
pub mod models;
pub mod retry;
pub mod transport;
pub mod version;
pub mod watch;

pub use client::{ClientFactory, SlurmClient};
pub use config::{AuthCredentials, ClientConfig};
pub use errors::{Error, Result};
pub use version::{ApiVersion, CompatibilityMatrix, DEFAULT_VERSION, SUPPORTED_VERSIONS};
