//! Task simulator — drives accepted operations through the task lifecycle.
//!
//! Every accepted operation gets its own spawned tokio task that walks
//! `queued → processing → done | error`, holding an advisory lock on the
//! target deployment while processing. All delays are divided by the
//! configured speed factor.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mockbosh_state::{EntityStore, StateError, StateResult, Task, TaskId, TaskState};

use crate::operation::Operation;

/// Nominal wait between acceptance and `processing`.
pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Timeout recorded on deployment locks. Never enforced.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const LOCK_TYPE: &str = "deployment";

/// Runs operations asynchronously against a shared [`EntityStore`].
#[derive(Clone)]
pub struct TaskSimulator {
    store: EntityStore,
    speed: f64,
}

impl TaskSimulator {
    /// Create a simulator. A non-positive (or NaN) speed falls back to 1.0.
    pub fn new(store: EntityStore, speed: f64) -> Self {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        Self { store, speed }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    fn scaled(&self, d: Duration) -> Duration {
        Duration::try_from_secs_f64(d.as_secs_f64() / self.speed).unwrap_or(Duration::MAX)
    }

    /// Accept `op` on behalf of `user`: record a queued task and start it.
    ///
    /// Fails with `DeploymentNotFound` (and records nothing) when the
    /// target deployment does not exist.
    pub fn submit(&self, op: Operation, user: &str) -> StateResult<Task> {
        let deployment = op.deployment();
        if !self.store.has_deployment(deployment) {
            return Err(StateError::DeploymentNotFound(deployment.to_string()));
        }
        let task = self
            .store
            .create_task(&op.description(), Some(deployment), user);
        info!(task_id = task.id, kind = ?op.kind(), %deployment, %user, "task accepted");
        self.execute(task.id, op);
        Ok(task)
    }

    /// Drive an already-created task to completion in the background.
    ///
    /// Must be called from within a tokio runtime. The returned handle may
    /// be dropped; the task keeps running.
    pub fn execute(&self, task_id: TaskId, op: Operation) -> JoinHandle<()> {
        let sim = self.clone();
        tokio::spawn(async move { sim.run(task_id, op).await })
    }

    async fn run(self, task_id: TaskId, op: Operation) {
        tokio::time::sleep(self.scaled(INITIAL_DELAY)).await;

        if let Err(e) = self
            .store
            .update_task_state(task_id, TaskState::Processing, "")
        {
            warn!(task_id, error = %e, "task could not start processing; abandoning");
            return;
        }
        debug!(task_id, "task processing");

        let deployment = op.deployment().to_string();
        self.store
            .add_lock(LOCK_TYPE, &deployment, task_id, LOCK_TIMEOUT);

        let outcome = self.perform(&op).await;
        self.store.remove_lock(&deployment);

        let (state, result) = match outcome {
            Ok(()) => (TaskState::Done, op.success_message()),
            Err(e) => (TaskState::Error, e.to_string()),
        };
        match self.store.update_task_state(task_id, state, &result) {
            Ok(()) if state == TaskState::Done => info!(task_id, %result, "task done"),
            Ok(()) => warn!(task_id, %result, "task failed"),
            Err(e) => warn!(task_id, error = %e, "task finished elsewhere; outcome dropped"),
        }
    }

    async fn perform(&self, op: &Operation) -> StateResult<()> {
        for step in op.steps() {
            tokio::time::sleep(self.scaled(step.delay)).await;
            step.mutation.apply(&self.store, op.deployment())?;
        }
        Ok(())
    }
}
