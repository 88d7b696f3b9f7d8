//! Director API handlers.
//!
//! Reads go straight to the `EntityStore`. Operations are handed to the
//! `TaskSimulator` and answered with `302 Found` pointing at the task.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mockbosh_state::{JobState, Task, TaskFilter, TaskId};
use mockbosh_tasks::{Operation, OutputKind, task_output};

use crate::ApiState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};

const DIRECTOR_VERSION: &str = "281.0.0 (00000000)";

/// Job path segment that addresses every job of a deployment.
const ALL_JOBS: &str = "*";

fn task_redirect(task: &Task) -> Response {
    (StatusCode::FOUND, [(LOCATION, format!("/tasks/{}", task.id))]).into_response()
}

fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("invalid task ID"))
}

/// Non-empty query value, or `None`.
fn param(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ── Info ───────────────────────────────────────────────────────

/// GET /info
pub async fn info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Mock BOSH Director",
        "uuid": "mock-bosh-director-uuid",
        "version": DIRECTOR_VERSION,
        "user": state.credentials.username,
        "cpi": "google_cpi",
        "stemcell_os": "ubuntu-jammy",
        "user_authentication": { "type": "basic" },
    }))
}

// ── Deployments ────────────────────────────────────────────────

/// GET /deployments
pub async fn list_deployments(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.list_deployments())
}

/// GET /deployments/{name}
pub async fn get_deployment(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.get_deployment(&name)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub force: Option<String>,
}

/// DELETE /deployments/{name}
pub async fn delete_deployment(
    State(state): State<ApiState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Response> {
    let force = param(&query.force) == Some("true");
    let task = state
        .simulator
        .submit(Operation::delete(&name, force), &user)?;
    Ok(task_redirect(&task))
}

#[derive(Debug, Default, Deserialize)]
pub struct StateQuery {
    pub state: Option<String>,
}

/// PUT /deployments/{name}?state=recreate
pub async fn change_deployment_state(
    State(state): State<ApiState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(name): Path<String>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Response> {
    if param(&query.state) != Some("recreate") {
        return Err(ApiError::bad_request("unknown operation"));
    }
    let task = state
        .simulator
        .submit(Operation::recreate(&name, None, None), &user)?;
    Ok(task_redirect(&task))
}

/// GET /deployments/{name}/vms
pub async fn list_vms(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_vms(&name)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct InstancesQuery {
    pub format: Option<String>,
}

/// GET /deployments/{name}/instances
///
/// Process detail is only included with `format=full`.
pub async fn list_instances(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<InstancesQuery>,
) -> ApiResult<impl IntoResponse> {
    let mut instances = state.store.list_instances(&name)?;
    if param(&query.format) != Some("full") {
        for instance in &mut instances {
            instance.processes.clear();
        }
    }
    Ok(Json(instances))
}

/// GET /deployments/{name}/variables
pub async fn list_variables(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.store.list_variables(&name)?))
}

// ── Jobs ───────────────────────────────────────────────────────

/// PUT /deployments/{name}/jobs/{job}
pub async fn change_job_state(
    State(state): State<ApiState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((name, job)): Path<(String, String)>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Response> {
    submit_job_change(&state, &user, &name, &job, None, &query)
}

/// PUT /deployments/{name}/jobs/{job}/{index}
pub async fn change_instance_state(
    State(state): State<ApiState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((name, job, index)): Path<(String, String, String)>,
    Query(query): Query<StateQuery>,
) -> ApiResult<Response> {
    submit_job_change(&state, &user, &name, &job, Some(&index), &query)
}

fn submit_job_change(
    state: &ApiState,
    user: &str,
    deployment: &str,
    job: &str,
    index: Option<&str>,
    query: &StateQuery,
) -> ApiResult<Response> {
    if !state.store.has_deployment(deployment) {
        return Err(ApiError::not_found(format!(
            "deployment '{deployment}' not found"
        )));
    }

    let requested = param(&query.state).ok_or_else(|| {
        ApiError::bad_request("state parameter is required")
    })?;
    let job = Some(job).filter(|j| *j != ALL_JOBS);

    // Start/stop/restart act on whole jobs; only recreate narrows by index.
    let op = match requested {
        "recreate" => Operation::recreate(deployment, job, index),
        other => match JobState::parse(other) {
            Some(js) => Operation::for_job_state(deployment, job, js),
            None => return Err(ApiError::bad_request(format!("unknown state: {other}"))),
        },
    };

    let task = state.simulator.submit(op, user)?;
    Ok(task_redirect(&task))
}

// ── Tasks ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TasksQuery {
    pub state: Option<String>,
    pub deployment: Option<String>,
    pub limit: Option<String>,
}

impl TasksQuery {
    fn to_filter(&self) -> ApiResult<TaskFilter> {
        let mut filter = TaskFilter::new();
        // Clients ask for several states at once (`processing,queued`).
        if let Some(list) = param(&self.state) {
            filter = filter.state_list(list);
        }
        if let Some(deployment) = param(&self.deployment) {
            filter = filter.deployment(deployment);
        }
        if let Some(raw) = param(&self.limit) {
            let limit: i64 = raw
                .parse()
                .map_err(|_| ApiError::bad_request("invalid limit parameter"))?;
            filter = filter.limit(limit);
        }
        Ok(filter)
    }
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<ApiState>,
    Query(query): Query<TasksQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = query.to_filter()?;
    Ok(Json(state.store.list_tasks(&filter)))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_task_id(&id)?;
    Ok(Json(state.store.get_task(id)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /tasks/{id}/output
pub async fn task_output_text(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<OutputQuery>,
) -> ApiResult<String> {
    let id = parse_task_id(&id)?;
    let task = state.store.get_task(id)?;
    Ok(task_output(&task, OutputKind::parse(query.kind.as_deref())))
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /stemcells
pub async fn list_stemcells(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.list_stemcells())
}

/// GET /releases
pub async fn list_releases(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.list_releases())
}

/// GET /locks
pub async fn list_locks(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.store.list_locks())
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /configs?type=cloud|runtime|cpi
///
/// Always a list; singleton configs come back as zero or one element.
pub async fn list_configs(
    State(state): State<ApiState>,
    Query(query): Query<ConfigsQuery>,
) -> ApiResult<Response> {
    let response = match param(&query.kind).unwrap_or_default() {
        "cloud" => Json(Vec::from_iter(state.store.cloud_config())).into_response(),
        "runtime" => Json(state.store.runtime_configs()).into_response(),
        "cpi" => Json(Vec::from_iter(state.store.cpi_config())).into_response(),
        other => {
            return Err(ApiError::bad_request(format!(
                "unknown config type: {other}"
            )));
        }
    };
    Ok(response)
}

// ── Fallbacks ──────────────────────────────────────────────────

pub async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use mockbosh_state::TaskState;

    use super::*;

    fn query(state: Option<&str>, deployment: Option<&str>, limit: Option<&str>) -> TasksQuery {
        TasksQuery {
            state: state.map(str::to_string),
            deployment: deployment.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn tasks_query_builds_filter() {
        let filter = query(Some("done"), Some("cf"), Some("3")).to_filter().unwrap();
        assert_eq!(filter.states, Some(HashSet::from([TaskState::Done])));
        assert_eq!(filter.deployment.as_deref(), Some("cf"));
        assert_eq!(filter.limit, Some(3));

        let unbounded = query(None, Some(""), Some("-1")).to_filter().unwrap();
        assert_eq!(unbounded, TaskFilter::new());
    }

    #[test]
    fn tasks_query_rejects_bad_values() {
        let err = query(None, None, Some("ten")).to_filter().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.description, "invalid limit parameter");

    }

    #[test]
    fn tasks_query_accepts_state_lists() {
        let filter = query(Some("processing,cancelling,queued"), None, None)
            .to_filter()
            .unwrap();
        assert_eq!(
            filter.states,
            Some(HashSet::from([TaskState::Processing, TaskState::Queued]))
        );

        let unknown = query(Some("paused"), None, None).to_filter().unwrap();
        assert_eq!(unknown.states, Some(HashSet::new()));
    }

    #[test]
    fn task_ids_must_be_numeric() {
        assert_eq!(parse_task_id("42"), Ok(42));
        assert_eq!(parse_task_id("abc").unwrap_err().status, StatusCode::BAD_REQUEST);
        assert!(parse_task_id("-1").is_err());
    }
}
