//! mockbosh-tasks — drives tasks through their lifecycle.
//!
//! Every accepted operation becomes one spawned tokio task that sleeps,
//! moves the task record to `processing`, takes an advisory lock, performs
//! the real store mutation(s) and finishes the task as `done` or `error`.
//! Callers never wait on it; progress is observed by polling the store.
//!
//! # Components
//!
//! - **`operation`** — the five operation kinds and their scripted steps
//! - **`simulator`** — spawns and runs the scripts with a speed multiplier
//! - **`output`** — read-side views of a task for the output endpoint

pub mod operation;
pub mod output;
pub mod simulator;

pub use operation::{Mutation, Operation, OperationKind, Step};
pub use output::{OutputKind, task_output};
pub use simulator::{INITIAL_DELAY, LOCK_TIMEOUT, TaskSimulator};
