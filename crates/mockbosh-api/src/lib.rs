//! mockbosh-api — the Director REST surface.
//!
//! Provides axum route handlers over the entity store and task simulator.
//! Every route except `/info` requires HTTP basic auth.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/info` | Director info (no auth) |
//! | GET | `/deployments` | List deployments |
//! | GET | `/deployments/{name}` | Get one deployment |
//! | DELETE | `/deployments/{name}` | Delete (task, `?force=true`) |
//! | PUT | `/deployments/{name}?state=recreate` | Recreate all VMs (task) |
//! | GET | `/deployments/{name}/vms` | List VMs |
//! | GET | `/deployments/{name}/instances` | List instances (`?format=full` keeps processes) |
//! | GET | `/deployments/{name}/variables` | List variables |
//! | PUT | `/deployments/{name}/jobs/{job}[/{index}]?state=` | Start/stop/restart/recreate (task) |
//! | GET | `/tasks` | List tasks (`?state=&deployment=&limit=`) |
//! | GET | `/tasks/{id}` | Get one task |
//! | GET | `/tasks/{id}/output?type=` | Task output as text |
//! | GET | `/stemcells`, `/releases`, `/locks` | Catalog and lock listings |
//! | GET | `/configs?type=cloud\|runtime\|cpi` | Config listings |

pub mod auth;
pub mod error;
pub mod handlers;

use axum::Router;
use axum::middleware;
use axum::routing::{get, put};
use tower_http::trace::TraceLayer;

use mockbosh_state::EntityStore;
use mockbosh_tasks::TaskSimulator;

pub use auth::{AuthUser, Credentials};
pub use error::{ApiError, ApiResult};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: EntityStore,
    pub simulator: TaskSimulator,
    pub credentials: Credentials,
}

impl ApiState {
    /// State whose simulator runs against `store`.
    pub fn new(store: EntityStore, speed: f64, credentials: Credentials) -> Self {
        let simulator = TaskSimulator::new(store.clone(), speed);
        Self {
            store,
            simulator,
            credentials,
        }
    }
}

/// Build the complete Director router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/info", get(handlers::info))
        .route("/deployments", get(handlers::list_deployments))
        .route(
            "/deployments/{name}",
            get(handlers::get_deployment)
                .delete(handlers::delete_deployment)
                .put(handlers::change_deployment_state),
        )
        .route("/deployments/{name}/vms", get(handlers::list_vms))
        .route("/deployments/{name}/instances", get(handlers::list_instances))
        .route("/deployments/{name}/variables", get(handlers::list_variables))
        .route(
            "/deployments/{name}/jobs/{job}",
            put(handlers::change_job_state),
        )
        .route(
            "/deployments/{name}/jobs/{job}/{index}",
            put(handlers::change_instance_state),
        )
        .route("/tasks", get(handlers::list_tasks))
        .route("/tasks/{id}", get(handlers::get_task))
        .route("/tasks/{id}/output", get(handlers::task_output_text))
        .route("/stemcells", get(handlers::list_stemcells))
        .route("/releases", get(handlers::list_releases))
        .route("/locks", get(handlers::list_locks))
        .route("/configs", get(handlers::list_configs))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
