//! mockbosh-state — the entity store behind the mock Director.
//!
//! Holds deployments, VMs, instances, variables, tasks, the static catalog
//! (stemcells, releases, configs) and the advisory lock list.
//!
//! # Architecture
//!
//! All entities live in one `StoreData` value guarded by a single
//! `RwLock`. Reads take the shared side and copy out; writes take the
//! exclusive side for the whole multi-entity mutation, so a cascading
//! delete is never observed half-applied.
//!
//! The `EntityStore` is `Clone` + `Send` + `Sync` (backed by `Arc`) and can
//! be shared across async tasks and threads.

pub mod error;
pub mod fixtures;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use fixtures::default_fixtures;
pub use store::{EntityStore, SeedData, TaskFilter, recreated_vm_cid};
pub use types::*;
