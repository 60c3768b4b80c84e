//! Wire-level shapes and wire-to-canonical conversions.
//!
//! Slurm REST payloads wrap most numerics in a `{set, infinite,
//! number}` triple and report enum-ish fields as either a string or an
//! array of strings, depending on version. Both quirks are absorbed
//! here, once: [`WireNumber::value`] is the single
//! unwrap-with-default point for optional numerics, and every
//! converter maps an absent or null wire field to the canonical zero
//! value rather than failing.
//!
//! Unit conversions crossing the canonical boundary are also
//! centralized here: memory is MiB on the wire and bytes canonically;
//! wall time is minutes on both sides.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapters::profile::VersionProfile;
use crate::models::*;

// ---------------------------------------------------------------------------
// Primitive wire shapes
// ---------------------------------------------------------------------------

/// A possibly-unset numeric value on the wire.
///
/// Newer protocol versions encode `{"set": bool, "infinite": bool,
/// "number": i64}`; older ones sometimes send the bare number. An
/// unset or infinite value decodes to `None`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WireNumber {
    Plain(i64),
    NoVal {
        #[serde(default)]
        set: Option<bool>,
        #[serde(default)]
        infinite: Option<bool>,
        #[serde(default)]
        number: Option<i64>,
    },
}

impl WireNumber {
    /// The one place an optional wire numeric becomes an option.
    pub fn value(&self) -> Option<i64> {
        match self {
            WireNumber::Plain(n) => Some(*n),
            WireNumber::NoVal { set, infinite, number } => {
                if *infinite == Some(true) || *set == Some(false) {
                    return None;
                }
                *number
            }
        }
    }

    /// Encode a set value in the `{set, number}` form.
    pub fn set(value: i64) -> Self {
        WireNumber::NoVal {
            set: Some(true),
            infinite: Some(false),
            number: Some(value),
        }
    }
}

/// Read an `Option<WireNumber>` field as `u32`, dropping negatives.
pub fn opt_u32(field: &Option<WireNumber>) -> Option<u32> {
    field
        .as_ref()
        .and_then(WireNumber::value)
        .and_then(|n| u32::try_from(n).ok())
}

/// Read an `Option<WireNumber>` field as `u64`, dropping negatives.
pub fn opt_u64(field: &Option<WireNumber>) -> Option<u64> {
    field
        .as_ref()
        .and_then(WireNumber::value)
        .and_then(|n| u64::try_from(n).ok())
}

/// Read an `Option<WireNumber>` epoch-seconds field as a timestamp.
/// Zero and negative epochs mean "not set" on the Slurm wire.
pub fn opt_timestamp(field: &Option<WireNumber>) -> Option<DateTime<Utc>> {
    field
        .as_ref()
        .and_then(WireNumber::value)
        .filter(|secs| *secs > 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// A state field that is a bare string in old versions and an array
/// of flags in newer ones. The first entry is the primary state.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WireStates {
    One(String),
    Many(Vec<String>),
}

impl WireStates {
    pub fn primary(&self) -> Option<&str> {
        match self {
            WireStates::One(s) => Some(s.as_str()),
            WireStates::Many(v) => v.first().map(String::as_str),
        }
    }
}

/// Memory crosses the canonical boundary exactly once, here.
pub fn mib_to_bytes(mib: u64) -> u64 {
    mib * 1024 * 1024
}

pub fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / (1024 * 1024)
}

fn parse_state<T: std::str::FromStr + Default>(states: &Option<WireStates>) -> T {
    states
        .as_ref()
        .and_then(WireStates::primary)
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or_default()
}

fn csv_list(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireJob {
    pub job_id: Option<WireNumber>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub qos: Option<String>,
    #[serde(default)]
    pub job_state: Option<WireStates>,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub nodes: Option<String>,
    pub node_count: Option<WireNumber>,
    pub cpus: Option<WireNumber>,
    /// MiB on the wire.
    pub memory_per_node: Option<WireNumber>,
    /// Minutes on the wire.
    pub time_limit: Option<WireNumber>,
    pub priority: Option<WireNumber>,
    pub exit_code: Option<WireNumber>,
    pub submit_time: Option<WireNumber>,
    pub start_time: Option<WireNumber>,
    pub end_time: Option<WireNumber>,
    #[serde(default)]
    pub current_working_directory: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub exclusive: Option<bool>,
    #[serde(default, alias = "minimum_switches")]
    pub required_switches: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireJobsResponse {
    #[serde(default)]
    pub jobs: Vec<WireJob>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireJobSubmitResponse {
    pub job_id: Option<WireNumber>,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub job_submit_user_msg: Option<String>,
}

pub fn job_to_canonical(wire: WireJob, profile: &VersionProfile) -> Job {
    Job {
        job_id: opt_u32(&wire.job_id).unwrap_or(0),
        name: wire.name.unwrap_or_default(),
        user_name: wire.user_name.unwrap_or_default(),
        account: wire.account.filter(|s| !s.is_empty()),
        partition: wire.partition.filter(|s| !s.is_empty()),
        qos: wire.qos.filter(|s| !s.is_empty()),
        state: parse_state::<JobState>(&wire.job_state),
        state_reason: wire.state_reason.filter(|s| !s.is_empty() && s != "None"),
        nodes: wire.nodes.filter(|s| !s.is_empty()),
        node_count: opt_u32(&wire.node_count),
        cpus: opt_u32(&wire.cpus),
        memory_per_node: opt_u64(&wire.memory_per_node).map(mib_to_bytes),
        time_limit: opt_u32(&wire.time_limit),
        priority: opt_u64(&wire.priority),
        exit_code: wire
            .exit_code
            .as_ref()
            .and_then(WireNumber::value)
            .and_then(|n| i32::try_from(n).ok()),
        submit_time: opt_timestamp(&wire.submit_time),
        start_time: opt_timestamp(&wire.start_time),
        end_time: opt_timestamp(&wire.end_time),
        working_directory: wire.current_working_directory.filter(|s| !s.is_empty()),
        comment: wire.comment.filter(|s| !s.is_empty()),
        exclusive: if profile.caps.job_exclusive_in_output {
            wire.exclusive
        } else {
            None
        },
        required_switches: opt_u32(&wire.required_switches),
    }
}

/// Encode a submission request into this version's wire shape.
pub fn job_submit_to_wire(req: &JobSubmitRequest, profile: &VersionProfile) -> serde_json::Value {
    let mut job = serde_json::Map::new();
    job.insert("name".into(), json!(req.name));

    if let Some(account) = &req.account {
        job.insert("account".into(), json!(account));
    }
    if let Some(partition) = &req.partition {
        job.insert("partition".into(), json!(partition));
    }
    if let Some(qos) = &req.qos {
        job.insert("qos".into(), json!(qos));
    }
    if let Some(cpus) = req.cpus {
        job.insert("cpus".into(), json!(WireNumber::set(cpus as i64)));
    }
    if let Some(nodes) = req.node_count {
        job.insert("nodes".into(), json!(WireNumber::set(nodes as i64)));
    }
    if let Some(bytes) = req.memory_per_node {
        job.insert(
            "memory_per_node".into(),
            json!(WireNumber::set(bytes_to_mib(bytes) as i64)),
        );
    }
    if let Some(minutes) = req.time_limit {
        job.insert("time_limit".into(), json!(WireNumber::set(minutes as i64)));
    }
    if let Some(dir) = &req.working_directory {
        job.insert("current_working_directory".into(), json!(dir));
    }
    if let Some(comment) = &req.comment {
        job.insert("comment".into(), json!(comment));
    }
    if let Some(switches) = req.required_switches {
        let field = if profile.caps.legacy_switches_field {
            "minimum_switches"
        } else {
            "required_switches"
        };
        job.insert(field.into(), json!(WireNumber::set(switches as i64)));
    }
    if req.hold {
        job.insert("hold".into(), json!(true));
    }
    if !req.environment.is_empty() {
        let env: Vec<String> = req
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        job.insert("environment".into(), json!(env));
    }

    json!({ "script": req.script, "job": job })
}

pub fn job_update_to_wire(req: &JobUpdateRequest) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(qos) = &req.qos {
        body.insert("qos".into(), json!(qos));
    }
    if let Some(partition) = &req.partition {
        body.insert("partition".into(), json!(partition));
    }
    if let Some(minutes) = req.time_limit {
        body.insert("time_limit".into(), json!(WireNumber::set(minutes as i64)));
    }
    if let Some(priority) = req.priority {
        body.insert("priority".into(), json!(WireNumber::set(priority as i64)));
    }
    if let Some(comment) = &req.comment {
        body.insert("comment".into(), json!(comment));
    }
    serde_json::Value::Object(body)
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<WireStates>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    pub cpus: Option<WireNumber>,
    pub alloc_cpus: Option<WireNumber>,
    /// MiB on the wire.
    pub real_memory: Option<WireNumber>,
    /// MiB on the wire.
    pub alloc_memory: Option<WireNumber>,
    #[serde(default)]
    pub partitions: Option<Vec<String>>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub boot_time: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireNodesResponse {
    #[serde(default)]
    pub nodes: Vec<WireNode>,
}

pub fn node_to_canonical(wire: WireNode) -> Node {
    Node {
        name: wire.name.unwrap_or_default(),
        state: parse_state::<NodeState>(&wire.state),
        address: wire.address.filter(|s| !s.is_empty()),
        hostname: wire.hostname.filter(|s| !s.is_empty()),
        cpus: opt_u32(&wire.cpus),
        alloc_cpus: opt_u32(&wire.alloc_cpus),
        real_memory: opt_u64(&wire.real_memory).map(mib_to_bytes),
        alloc_memory: opt_u64(&wire.alloc_memory).map(mib_to_bytes),
        partitions: wire.partitions.unwrap_or_default(),
        features: csv_list(&wire.features),
        reason: wire.reason.filter(|s| !s.is_empty()),
        boot_time: opt_timestamp(&wire.boot_time),
    }
}

pub fn node_update_to_wire(req: &NodeUpdateRequest) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(state) = req.state {
        body.insert("state".into(), json!([state.to_string()]));
    }
    if let Some(reason) = &req.reason {
        body.insert("reason".into(), json!(reason));
    }
    if let Some(features) = &req.features {
        body.insert("features".into(), json!(features.join(",")));
    }
    serde_json::Value::Object(body)
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WirePartition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<WireStates>,
    #[serde(default)]
    pub nodes: Option<WirePartitionNodes>,
    pub total_nodes: Option<WireNumber>,
    pub total_cpus: Option<WireNumber>,
    /// Minutes on the wire.
    pub max_time: Option<WireNumber>,
    /// Minutes on the wire.
    pub default_time: Option<WireNumber>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub qos: Option<String>,
}

/// Newer versions nest the node expression under `nodes.configured`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WirePartitionNodes {
    Expression(String),
    Nested {
        #[serde(default)]
        configured: Option<String>,
    },
}

impl WirePartitionNodes {
    fn expression(&self) -> Option<&str> {
        match self {
            WirePartitionNodes::Expression(s) => Some(s.as_str()),
            WirePartitionNodes::Nested { configured } => configured.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WirePartitionsResponse {
    #[serde(default)]
    pub partitions: Vec<WirePartition>,
}

pub fn partition_to_canonical(wire: WirePartition) -> Partition {
    let is_default = wire
        .flags
        .as_deref()
        .is_some_and(|flags| flags.iter().any(|f| f.eq_ignore_ascii_case("DEFAULT")));
    Partition {
        name: wire.name.unwrap_or_default(),
        state: parse_state::<PartitionState>(&wire.state),
        nodes: wire
            .nodes
            .as_ref()
            .and_then(WirePartitionNodes::expression)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        total_nodes: opt_u32(&wire.total_nodes),
        total_cpus: opt_u32(&wire.total_cpus),
        max_time: opt_u32(&wire.max_time),
        default_time: opt_u32(&wire.default_time),
        is_default,
        qos: wire.qos.filter(|s| !s.is_empty()),
    }
}

// ---------------------------------------------------------------------------
// Account / User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireCoordinator {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAccount {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub parent_account: Option<String>,
    #[serde(default)]
    pub coordinators: Option<Vec<WireCoordinator>>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<WireAccount>,
}

pub fn account_to_canonical(wire: WireAccount) -> Account {
    Account {
        name: wire.name.unwrap_or_default(),
        description: wire.description.filter(|s| !s.is_empty()),
        organization: wire.organization.filter(|s| !s.is_empty()),
        parent_account: wire.parent_account.filter(|s| !s.is_empty()),
        coordinators: wire
            .coordinators
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.name)
            .collect(),
        flags: wire.flags.unwrap_or_default(),
    }
}

pub fn account_create_to_wire(req: &AccountCreateRequest) -> serde_json::Value {
    let mut account = serde_json::Map::new();
    account.insert("name".into(), json!(req.name));
    if let Some(description) = &req.description {
        account.insert("description".into(), json!(description));
    }
    if let Some(organization) = &req.organization {
        account.insert("organization".into(), json!(organization));
    }
    if let Some(parent) = &req.parent_account {
        account.insert("parent_account".into(), json!(parent));
    }
    if !req.coordinators.is_empty() {
        let coords: Vec<serde_json::Value> =
            req.coordinators.iter().map(|c| json!({ "name": c })).collect();
        account.insert("coordinators".into(), json!(coords));
    }
    json!({ "accounts": [serde_json::Value::Object(account)] })
}

pub fn account_update_to_wire(name: &str, req: &AccountUpdateRequest) -> serde_json::Value {
    let mut account = serde_json::Map::new();
    account.insert("name".into(), json!(name));
    if let Some(description) = &req.description {
        account.insert("description".into(), json!(description));
    }
    if let Some(organization) = &req.organization {
        account.insert("organization".into(), json!(organization));
    }
    if let Some(coordinators) = &req.coordinators {
        let coords: Vec<serde_json::Value> =
            coordinators.iter().map(|c| json!({ "name": c })).collect();
        account.insert("coordinators".into(), json!(coords));
    }
    json!({ "accounts": [serde_json::Value::Object(account)] })
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireUserDefault {
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default: Option<WireUserDefault>,
    #[serde(default)]
    pub administrator_level: Option<WireStates>,
    #[serde(default)]
    pub coordinators: Option<Vec<WireCoordinator>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireUsersResponse {
    #[serde(default)]
    pub users: Vec<WireUser>,
}

pub fn user_to_canonical(wire: WireUser) -> User {
    let admin_level = wire
        .administrator_level
        .as_ref()
        .and_then(WireStates::primary)
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "operator" => AdminLevel::Operator,
            "administrator" => AdminLevel::Administrator,
            _ => AdminLevel::None,
        })
        .unwrap_or_default();

    User {
        name: wire.name.unwrap_or_default(),
        default_account: wire.default.and_then(|d| d.account).filter(|s| !s.is_empty()),
        admin_level,
        coordinator_of: wire
            .coordinators
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.name)
            .collect(),
    }
}

pub fn user_create_to_wire(req: &UserCreateRequest) -> serde_json::Value {
    let mut user = serde_json::Map::new();
    user.insert("name".into(), json!(req.name));
    if let Some(account) = &req.default_account {
        user.insert("default".into(), json!({ "account": account }));
    }
    if req.admin_level != AdminLevel::None {
        user.insert(
            "administrator_level".into(),
            json!([req.admin_level.to_string()]),
        );
    }
    json!({ "users": [serde_json::Value::Object(user)] })
}

pub fn user_update_to_wire(name: &str, req: &UserUpdateRequest) -> serde_json::Value {
    let mut user = serde_json::Map::new();
    user.insert("name".into(), json!(name));
    if let Some(account) = &req.default_account {
        user.insert("default".into(), json!({ "account": account }));
    }
    if let Some(level) = req.admin_level {
        user.insert("administrator_level".into(), json!([level.to_string()]));
    }
    json!({ "users": [serde_json::Value::Object(user)] })
}

// ---------------------------------------------------------------------------
// QoS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireQosLimits {
    pub max_jobs_per_user: Option<WireNumber>,
    pub max_submit_jobs_per_user: Option<WireNumber>,
    /// Minutes on the wire.
    pub max_wall_per_job: Option<WireNumber>,
    pub grp_jobs: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireQos {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Option<WireNumber>,
    #[serde(default)]
    pub preempt_mode: Option<WireStates>,
    #[serde(default)]
    pub preempt_list: Option<Vec<String>>,
    pub usage_factor: Option<WireNumber>,
    #[serde(default)]
    pub limits: Option<WireQosLimits>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireQosResponse {
    #[serde(default)]
    pub qos: Vec<WireQos>,
}

pub fn qos_to_canonical(wire: WireQos) -> Qos {
    let preempt_mode = wire
        .preempt_mode
        .as_ref()
        .and_then(WireStates::primary)
        .map(|s| match s.to_ascii_lowercase().as_str() {
            "cancel" => PreemptMode::Cancel,
            "requeue" => PreemptMode::Requeue,
            "suspend" => PreemptMode::Suspend,
            _ => PreemptMode::Off,
        })
        .unwrap_or_default();

    let limits = wire.limits.unwrap_or_default();
    Qos {
        name: wire.name.unwrap_or_default(),
        description: wire.description.filter(|s| !s.is_empty()),
        priority: opt_u32(&wire.priority),
        preempt_mode,
        preempts: wire.preempt_list.unwrap_or_default(),
        usage_factor: wire
            .usage_factor
            .as_ref()
            .and_then(WireNumber::value)
            .map(|n| n as f64),
        max_jobs_per_user: opt_u32(&limits.max_jobs_per_user),
        max_submit_jobs_per_user: opt_u32(&limits.max_submit_jobs_per_user),
        max_wall_per_job: opt_u32(&limits.max_wall_per_job),
        grp_jobs: opt_u32(&limits.grp_jobs),
        flags: wire.flags.unwrap_or_default(),
    }
}

pub fn qos_create_to_wire(req: &QosCreateRequest) -> serde_json::Value {
    let mut qos = serde_json::Map::new();
    qos.insert("name".into(), json!(req.name));
    if let Some(description) = &req.description {
        qos.insert("description".into(), json!(description));
    }
    if let Some(priority) = req.priority {
        qos.insert("priority".into(), json!(WireNumber::set(priority as i64)));
    }
    if req.preempt_mode != PreemptMode::Off {
        qos.insert("preempt_mode".into(), json!([req.preempt_mode.to_string()]));
    }
    if !req.preempts.is_empty() {
        qos.insert("preempt_list".into(), json!(req.preempts));
    }
    if let Some(factor) = req.usage_factor {
        qos.insert("usage_factor".into(), json!(WireNumber::set(factor as i64)));
    }
    let mut limits = serde_json::Map::new();
    if let Some(jobs) = req.max_jobs_per_user {
        limits.insert("max_jobs_per_user".into(), json!(WireNumber::set(jobs as i64)));
    }
    if let Some(wall) = req.max_wall_per_job {
        limits.insert("max_wall_per_job".into(), json!(WireNumber::set(wall as i64)));
    }
    if !limits.is_empty() {
        qos.insert("limits".into(), serde_json::Value::Object(limits));
    }
    json!({ "qos": [serde_json::Value::Object(qos)] })
}

pub fn qos_update_to_wire(name: &str, req: &QosUpdateRequest) -> serde_json::Value {
    let mut qos = serde_json::Map::new();
    qos.insert("name".into(), json!(name));
    if let Some(description) = &req.description {
        qos.insert("description".into(), json!(description));
    }
    if let Some(priority) = req.priority {
        qos.insert("priority".into(), json!(WireNumber::set(priority as i64)));
    }
    if let Some(mode) = req.preempt_mode {
        qos.insert("preempt_mode".into(), json!([mode.to_string()]));
    }
    if let Some(factor) = req.usage_factor {
        qos.insert("usage_factor".into(), json!(WireNumber::set(factor as i64)));
    }
    let mut limits = serde_json::Map::new();
    if let Some(jobs) = req.max_jobs_per_user {
        limits.insert("max_jobs_per_user".into(), json!(WireNumber::set(jobs as i64)));
    }
    if let Some(wall) = req.max_wall_per_job {
        limits.insert("max_wall_per_job".into(), json!(WireNumber::set(wall as i64)));
    }
    if !limits.is_empty() {
        qos.insert("limits".into(), serde_json::Value::Object(limits));
    }
    json!({ "qos": [serde_json::Value::Object(qos)] })
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireReservation {
    #[serde(default)]
    pub name: Option<String>,
    pub start_time: Option<WireNumber>,
    pub end_time: Option<WireNumber>,
    #[serde(default)]
    pub node_list: Option<String>,
    pub node_count: Option<WireNumber>,
    #[serde(default)]
    pub users: Option<String>,
    #[serde(default)]
    pub accounts: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireReservationsResponse {
    #[serde(default)]
    pub reservations: Vec<WireReservation>,
}

pub fn reservation_to_canonical(wire: WireReservation) -> Reservation {
    Reservation {
        name: wire.name.unwrap_or_default(),
        start_time: opt_timestamp(&wire.start_time),
        end_time: opt_timestamp(&wire.end_time),
        nodes: wire.node_list.filter(|s| !s.is_empty()),
        node_count: opt_u32(&wire.node_count),
        users: csv_list(&wire.users),
        accounts: csv_list(&wire.accounts),
        partition: wire.partition.filter(|s| !s.is_empty()),
        flags: wire.flags.unwrap_or_default(),
    }
}

pub fn reservation_create_to_wire(req: &ReservationCreateRequest) -> serde_json::Value {
    let mut reservation = serde_json::Map::new();
    reservation.insert("name".into(), json!(req.name));
    if let Some(start) = req.start_time {
        reservation.insert("start_time".into(), json!(WireNumber::set(start.timestamp())));
    }
    if let Some(end) = req.end_time {
        reservation.insert("end_time".into(), json!(WireNumber::set(end.timestamp())));
    }
    if let Some(count) = req.node_count {
        reservation.insert("node_count".into(), json!(WireNumber::set(count as i64)));
    }
    if !req.users.is_empty() {
        reservation.insert("users".into(), json!(req.users.join(",")));
    }
    if !req.accounts.is_empty() {
        reservation.insert("accounts".into(), json!(req.accounts.join(",")));
    }
    if let Some(partition) = &req.partition {
        reservation.insert("partition".into(), json!(partition));
    }
    if !req.flags.is_empty() {
        reservation.insert("flags".into(), json!(req.flags));
    }
    json!({ "reservations": [serde_json::Value::Object(reservation)] })
}

pub fn reservation_update_to_wire(name: &str, req: &ReservationUpdateRequest) -> serde_json::Value {
    let mut reservation = serde_json::Map::new();
    reservation.insert("name".into(), json!(name));
    if let Some(start) = req.start_time {
        reservation.insert("start_time".into(), json!(WireNumber::set(start.timestamp())));
    }
    if let Some(end) = req.end_time {
        reservation.insert("end_time".into(), json!(WireNumber::set(end.timestamp())));
    }
    if let Some(count) = req.node_count {
        reservation.insert("node_count".into(), json!(WireNumber::set(count as i64)));
    }
    if let Some(users) = &req.users {
        reservation.insert("users".into(), json!(users.join(",")));
    }
    if let Some(accounts) = &req.accounts {
        reservation.insert("accounts".into(), json!(accounts.join(",")));
    }
    json!({ "reservations": [serde_json::Value::Object(reservation)] })
}

// ---------------------------------------------------------------------------
// Association
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationDefault {
    #[serde(default)]
    pub qos: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationMaxJobs {
    pub active: Option<WireNumber>,
    pub total: Option<WireNumber>,
    #[serde(default)]
    pub per: Option<WireAssociationPerJob>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationPerJob {
    /// Minutes on the wire.
    pub wall_clock: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationMaxTres {
    pub cpus: Option<WireNumber>,
    pub nodes: Option<WireNumber>,
    /// MiB on the wire.
    pub memory: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationMax {
    #[serde(default)]
    pub jobs: Option<WireAssociationMaxJobs>,
    #[serde(default)]
    pub tres: Option<WireAssociationMaxTres>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationUsage {
    pub allocated_seconds: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociation {
    pub id: Option<WireNumber>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub parent_account: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    pub shares_raw: Option<WireNumber>,
    pub priority: Option<WireNumber>,
    #[serde(default)]
    pub qos: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<WireAssociationDefault>,
    #[serde(default)]
    pub max: Option<WireAssociationMax>,
    #[serde(default)]
    pub usage: Option<WireAssociationUsage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireAssociationsResponse {
    #[serde(default)]
    pub associations: Vec<WireAssociation>,
}

pub fn association_to_canonical(wire: WireAssociation) -> Association {
    let max = wire.max.unwrap_or_default();
    let max_jobs = max.jobs.unwrap_or_default();
    let max_tres = max.tres.unwrap_or_default();
    let per_job = max_jobs.per.unwrap_or_default();

    Association {
        id: opt_u32(&wire.id),
        account: wire.account.unwrap_or_default(),
        user: wire.user.unwrap_or_default(),
        cluster: wire.cluster.unwrap_or_default(),
        partition: wire.partition.filter(|s| !s.is_empty()),
        parent_account: wire.parent_account.filter(|s| !s.is_empty()),
        is_default: wire.is_default.unwrap_or(false),
        shares_raw: opt_u32(&wire.shares_raw).unwrap_or(0),
        priority: opt_u32(&wire.priority).unwrap_or(0),
        qos: wire.qos.unwrap_or_default(),
        default_qos: wire.default.and_then(|d| d.qos).filter(|s| !s.is_empty()),
        max_jobs: opt_u32(&max_jobs.active),
        max_submit_jobs: opt_u32(&max_jobs.total),
        max_wall_per_job: opt_u32(&per_job.wall_clock),
        max_cpus: opt_u32(&max_tres.cpus),
        max_nodes: opt_u32(&max_tres.nodes),
        max_memory: opt_u64(&max_tres.memory).map(mib_to_bytes),
        usage_seconds: wire.usage.as_ref().and_then(|u| opt_u64(&u.allocated_seconds)),
    }
}

pub fn association_create_to_wire(req: &AssociationCreateRequest) -> serde_json::Value {
    let mut assoc = serde_json::Map::new();
    assoc.insert("account".into(), json!(req.account));
    assoc.insert("cluster".into(), json!(req.cluster));
    if !req.user.is_empty() {
        assoc.insert("user".into(), json!(req.user));
    }
    if let Some(partition) = &req.partition {
        assoc.insert("partition".into(), json!(partition));
    }
    if let Some(parent) = &req.parent_account {
        assoc.insert("parent_account".into(), json!(parent));
    }
    if let Some(shares) = req.shares_raw {
        assoc.insert("shares_raw".into(), json!(WireNumber::set(shares as i64)));
    }
    if let Some(priority) = req.priority {
        assoc.insert("priority".into(), json!(WireNumber::set(priority as i64)));
    }
    if !req.qos.is_empty() {
        assoc.insert("qos".into(), json!(req.qos));
    }
    if let Some(default_qos) = &req.default_qos {
        assoc.insert("default".into(), json!({ "qos": default_qos }));
    }
    assoc.extend(association_limits_to_wire(
        req.max_jobs,
        req.max_submit_jobs,
        req.max_wall_per_job,
    ));
    json!({ "associations": [serde_json::Value::Object(assoc)] })
}

pub fn association_update_to_wire(id: u32, req: &AssociationUpdateRequest) -> serde_json::Value {
    let mut assoc = serde_json::Map::new();
    assoc.insert("id".into(), json!(WireNumber::set(id as i64)));
    if let Some(shares) = req.shares_raw {
        assoc.insert("shares_raw".into(), json!(WireNumber::set(shares as i64)));
    }
    if let Some(priority) = req.priority {
        assoc.insert("priority".into(), json!(WireNumber::set(priority as i64)));
    }
    if let Some(qos) = &req.qos {
        assoc.insert("qos".into(), json!(qos));
    }
    if let Some(default_qos) = &req.default_qos {
        assoc.insert("default".into(), json!({ "qos": default_qos }));
    }
    assoc.extend(association_limits_to_wire(
        req.max_jobs,
        req.max_submit_jobs,
        req.max_wall_per_job,
    ));
    json!({ "associations": [serde_json::Value::Object(assoc)] })
}

fn association_limits_to_wire(
    max_jobs: Option<u32>,
    max_submit_jobs: Option<u32>,
    max_wall_per_job: Option<u32>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut out = serde_json::Map::new();
    let mut jobs = serde_json::Map::new();
    if let Some(active) = max_jobs {
        jobs.insert("active".into(), json!(WireNumber::set(active as i64)));
    }
    if let Some(total) = max_submit_jobs {
        jobs.insert("total".into(), json!(WireNumber::set(total as i64)));
    }
    if let Some(wall) = max_wall_per_job {
        jobs.insert(
            "per".into(),
            json!({ "wall_clock": WireNumber::set(wall as i64) }),
        );
    }
    if !jobs.is_empty() {
        out.insert("max".into(), json!({ "jobs": serde_json::Value::Object(jobs) }));
    }
    out
}

// ---------------------------------------------------------------------------
// Cluster / Ping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireClusterController {
    #[serde(default)]
    pub host: Option<String>,
    pub port: Option<WireNumber>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireCluster {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub controller: Option<WireClusterController>,
    pub rpc_version: Option<WireNumber>,
    #[serde(default)]
    pub nodes: Option<String>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WireClustersResponse {
    #[serde(default)]
    pub clusters: Vec<WireCluster>,
}

pub fn cluster_to_canonical(wire: WireCluster) -> Cluster {
    let controller = wire.controller.unwrap_or_default();
    Cluster {
        name: wire.name.unwrap_or_default(),
        controller_host: controller.host.filter(|s| !s.is_empty()),
        controller_port: opt_u32(&controller.port).and_then(|p| u16::try_from(p).ok()),
        rpc_version: opt_u32(&wire.rpc_version),
        nodes: wire.nodes.filter(|s| !s.is_empty()),
        flags: wire.flags.unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WirePing {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub pinged: Option<String>,
    pub latency: Option<WireNumber>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WirePingsResponse {
    #[serde(default)]
    pub pings: Vec<WirePing>,
}

pub fn ping_to_canonical(wire: WirePing) -> Ping {
    Ping {
        hostname: wire.hostname.unwrap_or_default(),
        status: wire.pinged.unwrap_or_else(|| "UNKNOWN".to_string()),
        latency_us: opt_u64(&wire.latency),
        primary: wire
            .mode
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("primary")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::profile::profile_for;
    use crate::version::ApiVersion;

    #[test]
    fn wire_number_handles_every_form() {
        let plain: WireNumber = serde_json::from_str("42").unwrap();
        assert_eq!(plain.value(), Some(42));

        let set: WireNumber =
            serde_json::from_str(r#"{"set": true, "infinite": false, "number": 7}"#).unwrap();
        assert_eq!(set.value(), Some(7));

        let unset: WireNumber =
            serde_json::from_str(r#"{"set": false, "infinite": false, "number": 0}"#).unwrap();
        assert_eq!(unset.value(), None);

        let infinite: WireNumber =
            serde_json::from_str(r#"{"set": true, "infinite": true, "number": 0}"#).unwrap();
        assert_eq!(infinite.value(), None);
    }

    #[test]
    fn absent_wire_fields_become_zero_values_not_crashes() {
        let profile = profile_for(ApiVersion::V0_0_42).unwrap();
        let job = job_to_canonical(WireJob::default(), profile);
        assert_eq!(job.job_id, 0);
        assert_eq!(job.name, "");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.memory_per_node, None);
        assert_eq!(job.submit_time, None);
    }

    #[test]
    fn memory_is_converted_from_mib_exactly_once() {
        let wire = WireJob {
            memory_per_node: Some(WireNumber::set(2048)),
            ..WireJob::default()
        };
        let profile = profile_for(ApiVersion::V0_0_42).unwrap();
        let job = job_to_canonical(wire, profile);
        assert_eq!(job.memory_per_node, Some(2048 * 1024 * 1024));
    }

    #[test]
    fn exclusive_flag_only_survives_on_old_profiles() {
        let wire = WireJob {
            exclusive: Some(true),
            ..WireJob::default()
        };
        let v41 = profile_for(ApiVersion::V0_0_41).unwrap();
        assert_eq!(job_to_canonical(wire.clone(), v41).exclusive, Some(true));

        let v42 = profile_for(ApiVersion::V0_0_42).unwrap();
        assert_eq!(job_to_canonical(wire, v42).exclusive, None);
    }

    #[test]
    fn switches_field_name_follows_profile() {
        let req = JobSubmitRequest {
            name: "test".into(),
            script: "#!/bin/bash\ntrue".into(),
            required_switches: Some(2),
            ..JobSubmitRequest::default()
        };

        let v40 = profile_for(ApiVersion::V0_0_40).unwrap();
        let body = job_submit_to_wire(&req, v40);
        assert!(body["job"].get("minimum_switches").is_some());
        assert!(body["job"].get("required_switches").is_none());

        let v42 = profile_for(ApiVersion::V0_0_42).unwrap();
        let body = job_submit_to_wire(&req, v42);
        assert!(body["job"].get("required_switches").is_some());
        assert!(body["job"].get("minimum_switches").is_none());
    }

    #[test]
    fn job_state_array_and_string_both_decode() {
        let many: WireStates = serde_json::from_str(r#"["RUNNING", "COMPLETING"]"#).unwrap();
        assert_eq!(many.primary(), Some("RUNNING"));
        let one: WireStates = serde_json::from_str(r#""PENDING""#).unwrap();
        assert_eq!(one.primary(), Some("PENDING"));
    }

    #[test]
    fn association_nested_limits_flatten() {
        let body = r#"{
            "id": {"set": true, "number": 12},
            "account": "physics",
            "user": "alice",
            "cluster": "main",
            "shares_raw": {"set": true, "number": 100},
            "max": {
                "jobs": {"active": {"set": true, "number": 10},
                         "per": {"wall_clock": {"set": true, "number": 120}}},
                "tres": {"memory": {"set": true, "number": 4096}}
            }
        }"#;
        let wire: WireAssociation = serde_json::from_str(body).unwrap();
        let assoc = association_to_canonical(wire);
        assert_eq!(assoc.id, Some(12));
        assert_eq!(assoc.shares_raw, 100);
        assert_eq!(assoc.max_jobs, Some(10));
        assert_eq!(assoc.max_wall_per_job, Some(120));
        assert_eq!(assoc.max_memory, Some(4096 * 1024 * 1024));
    }
}
