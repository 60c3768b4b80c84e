//! Canonical, protocol-version-agnostic entity models.
//!
//! Every adapter converts its version's wire shapes into these types.
//! Optional fields stay `Option` through the conversion layer; an
//! absent wire field is mapped to the canonical zero value in exactly
//! one place (the wire module), never ad hoc at call sites.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Scheduling state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Suspended,
    Completed,
    Cancelled,
    Failed,
    Timeout,
    NodeFail,
    Preempted,
    OutOfMemory,
    Unknown,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Suspended => "SUSPENDED",
            JobState::Completed => "COMPLETED",
            JobState::Cancelled => "CANCELLED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::NodeFail => "NODE_FAIL",
            JobState::Preempted => "PREEMPTED",
            JobState::OutOfMemory => "OUT_OF_MEMORY",
            JobState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

impl FromStr for JobState {
    type Err = ();

    /// Wire states map leniently; anything unrecognized is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "PENDING" | "CONFIGURING" => JobState::Pending,
            "RUNNING" | "COMPLETING" => JobState::Running,
            "SUSPENDED" => JobState::Suspended,
            "COMPLETED" => JobState::Completed,
            "CANCELLED" => JobState::Cancelled,
            "FAILED" => JobState::Failed,
            "TIMEOUT" => JobState::Timeout,
            "NODE_FAIL" => JobState::NodeFail,
            "PREEMPTED" => JobState::Preempted,
            "OUT_OF_MEMORY" => JobState::OutOfMemory,
            _ => JobState::Unknown,
        })
    }
}

/// A job as seen through the canonical interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Job {
    pub job_id: u32,
    pub name: String,
    pub user_name: String,
    pub account: Option<String>,
    pub partition: Option<String>,
    pub qos: Option<String>,
    pub state: JobState,
    pub state_reason: Option<String>,
    /// Compact node list expression, e.g. `node[01-04]`.
    pub nodes: Option<String>,
    pub node_count: Option<u32>,
    pub cpus: Option<u32>,
    /// Requested memory per node, in bytes.
    pub memory_per_node: Option<u64>,
    /// Wall clock limit in minutes.
    pub time_limit: Option<u32>,
    pub priority: Option<u64>,
    pub exit_code: Option<i32>,
    pub submit_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub working_directory: Option<String>,
    pub comment: Option<String>,
    /// Whether the job requested exclusive node access. Not reported by
    /// every protocol version.
    pub exclusive: Option<bool>,
    pub required_switches: Option<u32>,
}

/// Request body for submitting a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobSubmitRequest {
    pub name: String,
    pub script: String,
    pub account: Option<String>,
    pub partition: Option<String>,
    pub qos: Option<String>,
    pub cpus: Option<u32>,
    pub node_count: Option<u32>,
    /// Memory per node in bytes.
    pub memory_per_node: Option<u64>,
    /// Wall clock limit in minutes.
    pub time_limit: Option<u32>,
    pub working_directory: Option<String>,
    pub environment: HashMap<String, String>,
    pub comment: Option<String>,
    pub required_switches: Option<u32>,
    /// Hold the job at submission; it will not start until released.
    pub hold: bool,
}

/// Response from a job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmitResponse {
    pub job_id: u32,
    pub step_id: Option<String>,
    pub message: Option<String>,
}

/// Mutable job fields for update operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobUpdateRequest {
    pub qos: Option<String>,
    pub partition: Option<String>,
    /// New wall clock limit in minutes.
    pub time_limit: Option<u32>,
    pub priority: Option<u64>,
    pub comment: Option<String>,
}

/// Filters and pagination for job listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListJobsOptions {
    pub user_name: Option<String>,
    pub account: Option<String>,
    pub partition: Option<String>,
    pub states: Vec<JobState>,
    /// Maximum entries to return; `0` means unlimited.
    pub limit: usize,
    /// Entries to skip before returning results.
    pub offset: usize,
}

/// A page of jobs plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobList {
    pub jobs: Vec<Job>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Operational state of a compute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Idle,
    Allocated,
    Mixed,
    Down,
    Drained,
    Draining,
    Maintenance,
    #[default]
    Unknown,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Idle => "IDLE",
            NodeState::Allocated => "ALLOCATED",
            NodeState::Mixed => "MIXED",
            NodeState::Down => "DOWN",
            NodeState::Drained => "DRAINED",
            NodeState::Draining => "DRAINING",
            NodeState::Maintenance => "MAINTENANCE",
            NodeState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "IDLE" => NodeState::Idle,
            "ALLOCATED" | "ALLOC" => NodeState::Allocated,
            "MIXED" => NodeState::Mixed,
            "DOWN" => NodeState::Down,
            "DRAINED" => NodeState::Drained,
            "DRAINING" | "DRAIN" => NodeState::Draining,
            "MAINT" | "MAINTENANCE" => NodeState::Maintenance,
            _ => NodeState::Unknown,
        })
    }
}

/// A compute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Node {
    pub name: String,
    pub state: NodeState,
    pub address: Option<String>,
    pub hostname: Option<String>,
    pub cpus: Option<u32>,
    pub alloc_cpus: Option<u32>,
    /// Physical memory in bytes.
    pub real_memory: Option<u64>,
    /// Allocated memory in bytes.
    pub alloc_memory: Option<u64>,
    pub partitions: Vec<String>,
    pub features: Vec<String>,
    pub reason: Option<String>,
    pub boot_time: Option<DateTime<Utc>>,
}

/// Mutable node fields (administrative state changes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeUpdateRequest {
    pub state: Option<NodeState>,
    pub reason: Option<String>,
    pub features: Option<Vec<String>>,
}

/// Filters and pagination for node listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListNodesOptions {
    pub states: Vec<NodeState>,
    pub partition: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A page of nodes plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeList {
    pub nodes: Vec<Node>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Scheduling state of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionState {
    Up,
    Down,
    Drain,
    Inactive,
    #[default]
    Unknown,
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PartitionState::Up => "UP",
            PartitionState::Down => "DOWN",
            PartitionState::Drain => "DRAIN",
            PartitionState::Inactive => "INACTIVE",
            PartitionState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

impl FromStr for PartitionState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "UP" => PartitionState::Up,
            "DOWN" => PartitionState::Down,
            "DRAIN" => PartitionState::Drain,
            "INACTIVE" => PartitionState::Inactive,
            _ => PartitionState::Unknown,
        })
    }
}

/// A partition (scheduling queue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Partition {
    pub name: String,
    pub state: PartitionState,
    /// Compact node list expression.
    pub nodes: Option<String>,
    pub total_nodes: Option<u32>,
    pub total_cpus: Option<u32>,
    /// Maximum wall clock in minutes.
    pub max_time: Option<u32>,
    /// Default wall clock in minutes.
    pub default_time: Option<u32>,
    pub is_default: bool,
    pub qos: Option<String>,
}

/// Filters and pagination for partition listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListPartitionsOptions {
    pub states: Vec<PartitionState>,
    pub limit: usize,
    pub offset: usize,
}

/// A page of partitions plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PartitionList {
    pub partitions: Vec<Partition>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Account / User
// ---------------------------------------------------------------------------

/// An accounting database account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Account {
    pub name: String,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub parent_account: Option<String>,
    pub coordinators: Vec<String>,
    pub flags: Vec<String>,
}

/// Request body for creating an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub parent_account: Option<String>,
    pub coordinators: Vec<String>,
}

/// Mutable account fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountUpdateRequest {
    pub description: Option<String>,
    pub organization: Option<String>,
    pub coordinators: Option<Vec<String>>,
}

/// Filters and pagination for account listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListAccountsOptions {
    pub names: Vec<String>,
    pub with_deleted: bool,
    pub limit: usize,
    pub offset: usize,
}

/// A page of accounts plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountList {
    pub accounts: Vec<Account>,
    pub total: usize,
}

/// Administrative privilege level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AdminLevel {
    #[default]
    None,
    Operator,
    Administrator,
}

impl fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdminLevel::None => "none",
            AdminLevel::Operator => "operator",
            AdminLevel::Administrator => "administrator",
        };
        f.write_str(s)
    }
}

/// An accounting database user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct User {
    pub name: String,
    pub default_account: Option<String>,
    pub admin_level: AdminLevel,
    /// Accounts this user coordinates.
    pub coordinator_of: Vec<String>,
}

/// Request body for creating a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserCreateRequest {
    pub name: String,
    pub default_account: Option<String>,
    pub admin_level: AdminLevel,
}

/// Mutable user fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserUpdateRequest {
    pub default_account: Option<String>,
    pub admin_level: Option<AdminLevel>,
}

/// Filters and pagination for user listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListUsersOptions {
    pub names: Vec<String>,
    pub with_deleted: bool,
    pub limit: usize,
    pub offset: usize,
}

/// A page of users plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct UserList {
    pub users: Vec<User>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// QoS
// ---------------------------------------------------------------------------

/// Preemption behavior of a QoS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreemptMode {
    #[default]
    Off,
    Cancel,
    Requeue,
    Suspend,
}

impl fmt::Display for PreemptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreemptMode::Off => "off",
            PreemptMode::Cancel => "cancel",
            PreemptMode::Requeue => "requeue",
            PreemptMode::Suspend => "suspend",
        };
        f.write_str(s)
    }
}

/// A quality-of-service policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Qos {
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<u32>,
    pub preempt_mode: PreemptMode,
    /// QoS names this policy may preempt.
    pub preempts: Vec<String>,
    pub usage_factor: Option<f64>,
    pub max_jobs_per_user: Option<u32>,
    pub max_submit_jobs_per_user: Option<u32>,
    /// Maximum wall clock per job in minutes.
    pub max_wall_per_job: Option<u32>,
    pub grp_jobs: Option<u32>,
    pub flags: Vec<String>,
}

/// Request body for creating a QoS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QosCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub priority: Option<u32>,
    pub preempt_mode: PreemptMode,
    pub preempts: Vec<String>,
    pub usage_factor: Option<f64>,
    pub max_jobs_per_user: Option<u32>,
    pub max_wall_per_job: Option<u32>,
}

/// Mutable QoS fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QosUpdateRequest {
    pub description: Option<String>,
    pub priority: Option<u32>,
    pub preempt_mode: Option<PreemptMode>,
    pub usage_factor: Option<f64>,
    pub max_jobs_per_user: Option<u32>,
    pub max_wall_per_job: Option<u32>,
}

/// Filters and pagination for QoS listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQosOptions {
    pub names: Vec<String>,
    pub with_deleted: bool,
    pub limit: usize,
    pub offset: usize,
}

/// A page of QoS entries plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QosList {
    pub qos: Vec<Qos>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// A node/time reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reservation {
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Compact node list expression.
    pub nodes: Option<String>,
    pub node_count: Option<u32>,
    pub users: Vec<String>,
    pub accounts: Vec<String>,
    pub partition: Option<String>,
    pub flags: Vec<String>,
}

/// Request body for creating a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReservationCreateRequest {
    pub name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub node_count: Option<u32>,
    pub users: Vec<String>,
    pub accounts: Vec<String>,
    pub partition: Option<String>,
    pub flags: Vec<String>,
}

/// Mutable reservation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReservationUpdateRequest {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub node_count: Option<u32>,
    pub users: Option<Vec<String>>,
    pub accounts: Option<Vec<String>>,
}

/// Filters and pagination for reservation listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListReservationsOptions {
    pub names: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A page of reservations plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReservationList {
    pub reservations: Vec<Reservation>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

/// A record binding a user (or an account as a whole, when `user` is
/// empty) to an account/cluster/partition with shares and limits.
///
/// Associations are the sole input to hierarchy and fairshare
/// derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Association {
    pub id: Option<u32>,
    pub account: String,
    /// Empty string means this is the account-level association.
    pub user: String,
    pub cluster: String,
    pub partition: Option<String>,
    pub parent_account: Option<String>,
    pub is_default: bool,
    pub shares_raw: u32,
    pub priority: u32,
    pub qos: Vec<String>,
    pub default_qos: Option<String>,
    pub max_jobs: Option<u32>,
    pub max_submit_jobs: Option<u32>,
    /// Maximum wall clock per job in minutes.
    pub max_wall_per_job: Option<u32>,
    pub max_cpus: Option<u32>,
    pub max_nodes: Option<u32>,
    /// Memory limit in bytes.
    pub max_memory: Option<u64>,
    /// Historical allocated CPU-seconds, when reported.
    pub usage_seconds: Option<u64>,
}

impl Association {
    /// Whether this association binds the account as a whole rather
    /// than a specific user.
    pub fn is_account_level(&self) -> bool {
        self.user.is_empty()
    }
}

/// Request body for creating an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssociationCreateRequest {
    pub account: String,
    pub user: String,
    pub cluster: String,
    pub partition: Option<String>,
    pub parent_account: Option<String>,
    pub shares_raw: Option<u32>,
    pub priority: Option<u32>,
    pub qos: Vec<String>,
    pub default_qos: Option<String>,
    pub max_jobs: Option<u32>,
    pub max_submit_jobs: Option<u32>,
    pub max_wall_per_job: Option<u32>,
}

/// Mutable association fields, addressed by association id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssociationUpdateRequest {
    pub shares_raw: Option<u32>,
    pub priority: Option<u32>,
    pub qos: Option<Vec<String>>,
    pub default_qos: Option<String>,
    pub max_jobs: Option<u32>,
    pub max_submit_jobs: Option<u32>,
    pub max_wall_per_job: Option<u32>,
}

/// Filters and pagination for association listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListAssociationsOptions {
    pub accounts: Vec<String>,
    pub users: Vec<String>,
    pub clusters: Vec<String>,
    pub partitions: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A page of associations plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AssociationList {
    pub associations: Vec<Association>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Cluster / Info
// ---------------------------------------------------------------------------

/// A cluster registered in the accounting database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Cluster {
    pub name: String,
    pub controller_host: Option<String>,
    pub controller_port: Option<u16>,
    pub rpc_version: Option<u32>,
    pub nodes: Option<String>,
    pub flags: Vec<String>,
}

/// Filters and pagination for cluster listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListClustersOptions {
    pub names: Vec<String>,
    pub limit: usize,
    pub offset: usize,
}

/// A page of clusters plus the pre-pagination total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ClusterList {
    pub clusters: Vec<Cluster>,
    pub total: usize,
}

/// One controller's answer to a ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Ping {
    pub hostname: String,
    /// `UP`, `DOWN`, or whatever the controller reported.
    pub status: String,
    pub latency_us: Option<u64>,
    pub primary: bool,
}

/// Version information reported by the bound endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ApiInfo {
    /// Slurm release of the server, e.g. `25.05.3`.
    pub release: Option<String>,
    /// Protocol version the client is bound to, as a string.
    pub protocol_version: String,
}
