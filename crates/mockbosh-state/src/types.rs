//! Domain types for the mockbosh entity store.
//!
//! These mirror the JSON bodies the Director API returns for deployments,
//! VMs, instances, tasks and the static catalog. Field names follow the
//! Director's wire names via serde renames; everything else is plain Rust.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Task identifier. Allocated by the store, strictly increasing.
pub type TaskId = u64;

// ── Deployment ─────────────────────────────────────────────────────

/// A named aggregate of VMs, instances and variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub name: String,
    /// Cloud-config label the deployment was built against.
    pub cloud_config: String,
    pub releases: Vec<NameVersion>,
    pub stemcells: Vec<NameVersion>,
}

/// A `(name, version)` reference to a release or stemcell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameVersion {
    pub name: String,
    pub version: String,
}

impl NameVersion {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

// ── VM / Instance ──────────────────────────────────────────────────

/// Lifecycle state of a VM as the Director reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Started,
    Stopped,
}

/// State of a process, or of an instance aggregated over its processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Stopped,
}

/// Infrastructure-level view of a running unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vm {
    pub vm_cid: String,
    pub active: bool,
    pub agent_id: String,
    pub az: String,
    pub bootstrap: bool,
    pub deployment: String,
    pub ips: Vec<String>,
    pub job: String,
    pub index: u32,
    pub id: String,
    pub process_state: ProcessState,
    pub state: VmState,
    pub vm_type: String,
    pub ignore: bool,
}

/// Workload-level view of a running unit, with process detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub agent_id: String,
    pub az: String,
    pub bootstrap: bool,
    pub deployment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub disk_cid: String,
    pub expects_vm: bool,
    pub id: String,
    pub ips: Vec<String>,
    pub job: String,
    pub index: u32,
    pub state: ProcessState,
    pub vm_type: String,
    pub vm_cid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<Process>,
}

/// A process running on an instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub name: String,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<Uptime>,
    #[serde(rename = "mem", default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuUsage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Uptime {
    pub secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MemoryUsage {
    pub percent: f64,
    pub kb: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CpuUsage {
    pub total: f64,
}

/// A credential/variable reference owned by a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variable {
    pub id: String,
    pub name: String,
}

// ── Job state requests ────────────────────────────────────────────

/// Desired job state for `change_job_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Started,
    Stopped,
    Restart,
}

impl JobState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(JobState::Started),
            "stopped" => Some(JobState::Stopped),
            "restart" => Some(JobState::Restart),
            _ => None,
        }
    }

    /// VM lifecycle state after the change.
    pub fn vm_state(self) -> VmState {
        match self {
            JobState::Stopped => VmState::Stopped,
            JobState::Started | JobState::Restart => VmState::Started,
        }
    }

    /// Process/instance state after the change.
    pub fn process_state(self) -> ProcessState {
        match self {
            JobState::Stopped => ProcessState::Stopped,
            JobState::Started | JobState::Restart => ProcessState::Running,
        }
    }
}

// ── Task ──────────────────────────────────────────────────────────

/// Task lifecycle: `queued → processing → done | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Processing,
    Done,
    Error,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Done => "done",
            TaskState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(TaskState::Queued),
            "processing" => Some(TaskState::Processing),
            "done" => Some(TaskState::Done),
            "error" => Some(TaskState::Error),
            _ => None,
        }
    }

    /// `done` and `error` are final; nothing leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub state: TaskState,
    pub description: String,
    /// Unix timestamp (seconds) of creation.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

// ── Catalog ───────────────────────────────────────────────────────

/// An uploaded stemcell and the deployments using it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stemcell {
    pub name: String,
    pub operating_system: String,
    pub version: String,
    pub cid: String,
    pub deployments: Vec<String>,
}

/// An uploaded release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub name: String,
    pub version: String,
    pub commit_hash: String,
    pub uncommitted_changes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudConfig {
    pub properties: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    pub name: String,
    pub properties: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpiConfig {
    pub properties: String,
    pub created_at: String,
}

// ── Locks ─────────────────────────────────────────────────────────

/// Advisory record that a resource is involved in an in-flight task.
///
/// Nothing consults these before mutating; they exist to be listed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lock {
    #[serde(rename = "type")]
    pub lock_type: String,
    pub resource: String,
    /// Human-readable timeout (e.g. `30m0s`). Stored only, never enforced.
    pub timeout: String,
    pub task_id: String,
}

/// Render a duration the way the Director prints lock timeouts
/// (`30m0s`, `1h0m0s`, `45s`, `500ms`).
pub fn format_timeout(d: Duration) -> String {
    let total = d.as_secs();
    if total == 0 && d.subsec_millis() > 0 {
        return format!("{}ms", d.subsec_millis());
    }
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}
