//! Task output views served by the polling endpoint.

use mockbosh_state::Task;

/// Which view of a task to render. Unknown names fall back to `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Result,
    Debug,
    Cpi,
    Event,
}

impl OutputKind {
    pub fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("debug") => OutputKind::Debug,
            Some("cpi") => OutputKind::Cpi,
            Some("event") => OutputKind::Event,
            _ => OutputKind::Result,
        }
    }
}

/// Render a task for the output endpoint.
pub fn task_output(task: &Task, kind: OutputKind) -> String {
    match kind {
        OutputKind::Result if task.result.is_empty() => {
            format!("Task {}: {}", task.id, task.description)
        }
        OutputKind::Result => task.result.clone(),
        OutputKind::Debug => format!(
            "DEBUG: Task {} started at {}\nDEBUG: State: {}\nDEBUG: Deployment: {}",
            task.id,
            task.timestamp,
            task.state,
            task.deployment.as_deref().unwrap_or_default()
        ),
        OutputKind::Cpi => format!("CPI: No CPI operations for task {}", task.id),
        OutputKind::Event => format!(
            "EVENT: Task {} {} at {}",
            task.id, task.state, task.timestamp
        ),
    }
}
