//! Operations the simulator knows how to run.
//!
//! Each operation is a short linear script: a list of `(delay, mutation)`
//! steps performed after the task enters `processing`. Restart is the only
//! script with more than one step.

use std::time::Duration;

use mockbosh_state::{EntityStore, JobState, StateResult};

/// The five operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Delete,
    Recreate,
    Start,
    Stop,
    Restart,
}

/// An accepted operation against one deployment.
///
/// Empty job/index strings are normalised to `None` by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Delete {
        deployment: String,
        force: bool,
    },
    Recreate {
        deployment: String,
        job: Option<String>,
        index: Option<String>,
    },
    Start {
        deployment: String,
        job: Option<String>,
    },
    Stop {
        deployment: String,
        job: Option<String>,
    },
    Restart {
        deployment: String,
        job: Option<String>,
    },
}

/// A single store mutation performed by a script step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    DeleteDeployment,
    RecreateVms {
        job: Option<String>,
        index: Option<String>,
    },
    ChangeJobState {
        job: Option<String>,
        state: JobState,
    },
}

impl Mutation {
    /// Apply this mutation to `deployment` through the store.
    pub fn apply(&self, store: &EntityStore, deployment: &str) -> StateResult<()> {
        match self {
            Mutation::DeleteDeployment => store.delete_deployment(deployment),
            Mutation::RecreateVms { job, index } => {
                store.recreate_vms(deployment, job.as_deref(), index.as_deref())
            }
            Mutation::ChangeJobState { job, state } => {
                store.change_job_state(deployment, job.as_deref(), *state)
            }
        }
    }
}

/// One scripted step: wait `delay` (nominal, before speed scaling), then
/// apply `mutation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub delay: Duration,
    pub mutation: Mutation,
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

impl Operation {
    pub fn delete(deployment: &str, force: bool) -> Self {
        Operation::Delete {
            deployment: deployment.to_string(),
            force,
        }
    }

    pub fn recreate(deployment: &str, job: Option<&str>, index: Option<&str>) -> Self {
        Operation::Recreate {
            deployment: deployment.to_string(),
            job: non_empty(job),
            index: non_empty(index),
        }
    }

    pub fn start(deployment: &str, job: Option<&str>) -> Self {
        Operation::Start {
            deployment: deployment.to_string(),
            job: non_empty(job),
        }
    }

    pub fn stop(deployment: &str, job: Option<&str>) -> Self {
        Operation::Stop {
            deployment: deployment.to_string(),
            job: non_empty(job),
        }
    }

    pub fn restart(deployment: &str, job: Option<&str>) -> Self {
        Operation::Restart {
            deployment: deployment.to_string(),
            job: non_empty(job),
        }
    }

    /// The operation that moves jobs to the requested state.
    pub fn for_job_state(deployment: &str, job: Option<&str>, state: JobState) -> Self {
        match state {
            JobState::Started => Operation::start(deployment, job),
            JobState::Stopped => Operation::stop(deployment, job),
            JobState::Restart => Operation::restart(deployment, job),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Recreate { .. } => OperationKind::Recreate,
            Operation::Start { .. } => OperationKind::Start,
            Operation::Stop { .. } => OperationKind::Stop,
            Operation::Restart { .. } => OperationKind::Restart,
        }
    }

    /// The deployment this operation targets (and locks).
    pub fn deployment(&self) -> &str {
        match self {
            Operation::Delete { deployment, .. }
            | Operation::Recreate { deployment, .. }
            | Operation::Start { deployment, .. }
            | Operation::Stop { deployment, .. }
            | Operation::Restart { deployment, .. } => deployment,
        }
    }

    fn job(&self) -> Option<&str> {
        match self {
            Operation::Delete { .. } => None,
            Operation::Recreate { job, .. }
            | Operation::Start { job, .. }
            | Operation::Stop { job, .. }
            | Operation::Restart { job, .. } => job.as_deref(),
        }
    }

    /// Task description recorded when the operation is accepted.
    pub fn description(&self) -> String {
        let d = self.deployment();
        match self {
            Operation::Delete { .. } => format!("delete deployment {d}"),
            Operation::Recreate { job, index, .. } => match (job, index) {
                (Some(job), Some(index)) => format!("recreate VM {d}/{job}/{index}"),
                (Some(job), None) => format!("recreate VMs for {d}/{job}"),
                (None, _) => format!("recreate VMs for deployment {d}"),
            },
            Operation::Start { .. } | Operation::Stop { .. } | Operation::Restart { .. } => {
                let verb = match self.kind() {
                    OperationKind::Start => "start",
                    OperationKind::Stop => "stop",
                    _ => "restart",
                };
                match self.job() {
                    Some(job) => format!("{verb} job {job} in deployment {d}"),
                    None => format!("{verb} jobs in deployment {d}"),
                }
            }
        }
    }

    /// Result text recorded when the operation succeeds.
    pub fn success_message(&self) -> String {
        let d = self.deployment();
        match self {
            Operation::Delete { .. } => format!("Deleted deployment {d}"),
            Operation::Recreate { job, index, .. } => {
                let mut target = d.to_string();
                if let Some(job) = job {
                    target.push('/');
                    target.push_str(job);
                    if let Some(index) = index {
                        target.push('/');
                        target.push_str(index);
                    }
                }
                format!("Recreated VM(s) for {target}")
            }
            Operation::Start { .. } | Operation::Stop { .. } | Operation::Restart { .. } => {
                let verb = match self.kind() {
                    OperationKind::Start => "Started",
                    OperationKind::Stop => "Stopped",
                    _ => "Restarted",
                };
                match self.job() {
                    Some(job) => format!("{verb} job(s) in {d}, job {job}"),
                    None => format!("{verb} job(s) in {d}"),
                }
            }
        }
    }

    /// The work performed after the task enters `processing`.
    pub fn steps(&self) -> Vec<Step> {
        let job = self.job().map(str::to_string);
        let job_step = |secs: u64, state: JobState| Step {
            delay: Duration::from_secs(secs),
            mutation: Mutation::ChangeJobState {
                job: job.clone(),
                state,
            },
        };

        match self {
            Operation::Delete { .. } => vec![Step {
                delay: Duration::from_secs(2),
                mutation: Mutation::DeleteDeployment,
            }],
            Operation::Recreate { job, index, .. } => vec![Step {
                delay: Duration::from_secs(3),
                mutation: Mutation::RecreateVms {
                    job: job.clone(),
                    index: index.clone(),
                },
            }],
            Operation::Start { .. } => vec![job_step(1, JobState::Started)],
            Operation::Stop { .. } => vec![job_step(1, JobState::Stopped)],
            Operation::Restart { .. } => vec![
                job_step(1, JobState::Stopped),
                job_step(1, JobState::Started),
            ],
        }
    }
}
