//! EntityStore — the single source of truth for the mock Director.
//!
//! Every operation takes one reader/writer lock for its whole duration.
//! Reads share the lock and return owned copies; writes hold it exclusively,
//! so multi-entity mutations (cascading delete, job state changes across
//! VMs and instances) are never visible half-applied.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::*;

/// Initial contents of a store.
///
/// VMs, instances and variables are keyed by deployment name; every entry's
/// `deployment` field must match its key.
#[derive(Debug, Clone, Default)]
pub struct SeedData {
    pub deployments: Vec<Deployment>,
    pub vms: HashMap<String, Vec<Vm>>,
    pub instances: HashMap<String, Vec<Instance>>,
    pub variables: HashMap<String, Vec<Variable>>,
    pub tasks: Vec<Task>,
    pub stemcells: Vec<Stemcell>,
    pub releases: Vec<Release>,
    pub cloud_config: Option<CloudConfig>,
    pub runtime_configs: Vec<RuntimeConfig>,
    pub cpi_config: Option<CpiConfig>,
    /// New task ids start above this value (and above every seeded task).
    pub task_id_floor: TaskId,
}

/// Filter for `list_tasks`. All set criteria must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// Accepted states. `Some` of an empty set matches nothing.
    pub states: Option<HashSet<TaskState>>,
    pub deployment: Option<String>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also accept tasks in `state`.
    pub fn state(mut self, state: TaskState) -> Self {
        self.states.get_or_insert_with(HashSet::new).insert(state);
        self
    }

    /// Accept any state named in a comma-separated list. Unknown names are
    /// dropped, so a list of only unknown names matches nothing.
    pub fn state_list(mut self, list: &str) -> Self {
        let states = self.states.get_or_insert_with(HashSet::new);
        states.extend(list.split(',').filter_map(|s| TaskState::parse(s.trim())));
        self
    }

    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    /// Keep only the newest `limit` tasks. Values `<= 0` mean unbounded.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = usize::try_from(limit).ok().filter(|n| *n > 0);
        self
    }

    fn matches(&self, task: &Task) -> bool {
        if let Some(states) = &self.states {
            if !states.contains(&task.state) {
                return false;
            }
        }
        if let Some(deployment) = &self.deployment {
            if task.deployment.as_deref() != Some(deployment.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Everything behind the lock.
#[derive(Debug)]
struct StoreData {
    deployments: BTreeMap<String, Deployment>,
    vms: HashMap<String, Vec<Vm>>,
    instances: HashMap<String, Vec<Instance>>,
    variables: HashMap<String, Vec<Variable>>,
    tasks: BTreeMap<TaskId, Task>,
    stemcells: Vec<Stemcell>,
    releases: Vec<Release>,
    cloud_config: Option<CloudConfig>,
    runtime_configs: Vec<RuntimeConfig>,
    cpi_config: Option<CpiConfig>,
    locks: Vec<Lock>,
    last_task_id: TaskId,
}

impl StoreData {
    fn require_deployment(&self, name: &str) -> StateResult<()> {
        if self.deployments.contains_key(name) {
            Ok(())
        } else {
            Err(StateError::DeploymentNotFound(name.to_string()))
        }
    }
}

impl TryFrom<SeedData> for StoreData {
    type Error = StateError;

    fn try_from(seed: SeedData) -> StateResult<Self> {
        let mut deployments = BTreeMap::new();
        for deployment in seed.deployments {
            let name = deployment.name.clone();
            if deployments.insert(name.clone(), deployment).is_some() {
                return Err(StateError::InvalidSeed(format!(
                    "deployment '{name}' defined twice"
                )));
            }
        }

        for (key, vms) in &seed.vms {
            check_owned(&deployments, "VM", key, vms.iter().map(|v| v.deployment.as_str()))?;
        }
        for (key, instances) in &seed.instances {
            check_owned(
                &deployments,
                "instance",
                key,
                instances.iter().map(|i| i.deployment.as_str()),
            )?;
        }
        for key in seed.variables.keys() {
            check_owned(&deployments, "variable", key, std::iter::empty())?;
        }

        let mut tasks = BTreeMap::new();
        for task in seed.tasks {
            let id = task.id;
            if tasks.insert(id, task).is_some() {
                return Err(StateError::InvalidSeed(format!("task {id} defined twice")));
            }
        }
        let last_task_id = tasks
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            .max(seed.task_id_floor);

        Ok(Self {
            deployments,
            vms: seed.vms,
            instances: seed.instances,
            variables: seed.variables,
            tasks,
            stemcells: seed.stemcells,
            releases: seed.releases,
            cloud_config: seed.cloud_config,
            runtime_configs: seed.runtime_configs,
            cpi_config: seed.cpi_config,
            locks: Vec::new(),
            last_task_id,
        })
    }
}

/// Reject seed lists keyed by an unknown deployment, or whose entries name a
/// different deployment than their key.
fn check_owned<'a>(
    deployments: &BTreeMap<String, Deployment>,
    kind: &str,
    key: &str,
    owners: impl Iterator<Item = &'a str>,
) -> StateResult<()> {
    if !deployments.contains_key(key) {
        return Err(StateError::InvalidSeed(format!(
            "{kind} list keyed by unknown deployment '{key}'"
        )));
    }
    for owner in owners {
        if owner != key {
            return Err(StateError::InvalidSeed(format!(
                "{kind} of deployment '{owner}' stored under '{key}'"
            )));
        }
    }
    Ok(())
}

/// An empty or blank job filter matches every job.
fn job_matches(filter: Option<&str>, job: &str) -> bool {
    match filter {
        Some(f) if !f.is_empty() => f == job,
        _ => true,
    }
}

/// Index filters compare against the decimal text of the index.
fn index_matches(filter: Option<&str>, index: u32) -> bool {
    match filter {
        Some(f) if !f.is_empty() => index.to_string() == f,
        _ => true,
    }
}

/// Identifier a VM gets after a simulated recreate.
pub fn recreated_vm_cid(deployment: &str, job: &str, index: u32) -> String {
    format!("vm-{deployment}-{job}-{index}-recreated")
}

/// Thread-safe in-memory entity store.
#[derive(Clone)]
pub struct EntityStore {
    inner: Arc<RwLock<StoreData>>,
}

impl EntityStore {
    /// Build a store from seed data, validating ownership invariants.
    pub fn new(seed: SeedData) -> StateResult<Self> {
        let data = StoreData::try_from(seed)?;
        debug!(
            deployments = data.deployments.len(),
            tasks = data.tasks.len(),
            "entity store seeded"
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
        })
    }

    /// Build a store holding the sample cf/redis/mysql director.
    pub fn with_fixtures() -> StateResult<Self> {
        Self::new(crate::fixtures::default_fixtures())
    }

    // Every mutation completes before the guard drops, so a poisoned lock
    // still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Deployments ────────────────────────────────────────────────

    /// List all deployments.
    pub fn list_deployments(&self) -> Vec<Deployment> {
        self.read().deployments.values().cloned().collect()
    }

    /// Get a deployment by name.
    pub fn get_deployment(&self, name: &str) -> StateResult<Deployment> {
        self.read()
            .deployments
            .get(name)
            .cloned()
            .ok_or_else(|| StateError::DeploymentNotFound(name.to_string()))
    }

    pub fn has_deployment(&self, name: &str) -> bool {
        self.read().deployments.contains_key(name)
    }

    /// Delete a deployment together with its VMs, instances, variables and
    /// every stemcell reference to it.
    pub fn delete_deployment(&self, name: &str) -> StateResult<()> {
        let mut data = self.write();
        if data.deployments.remove(name).is_none() {
            return Err(StateError::DeploymentNotFound(name.to_string()));
        }
        data.vms.remove(name);
        data.instances.remove(name);
        data.variables.remove(name);
        for stemcell in &mut data.stemcells {
            stemcell.deployments.retain(|d| d != name);
        }
        debug!(deployment = %name, "deployment deleted");
        Ok(())
    }

    /// VMs of a deployment. An existing deployment with no VMs yields an
    /// empty list, an unknown one `DeploymentNotFound`.
    pub fn list_vms(&self, deployment: &str) -> StateResult<Vec<Vm>> {
        let data = self.read();
        data.require_deployment(deployment)?;
        Ok(data.vms.get(deployment).cloned().unwrap_or_default())
    }

    pub fn list_instances(&self, deployment: &str) -> StateResult<Vec<Instance>> {
        let data = self.read();
        data.require_deployment(deployment)?;
        Ok(data.instances.get(deployment).cloned().unwrap_or_default())
    }

    pub fn list_variables(&self, deployment: &str) -> StateResult<Vec<Variable>> {
        let data = self.read();
        data.require_deployment(deployment)?;
        Ok(data.variables.get(deployment).cloned().unwrap_or_default())
    }

    /// Set job state on matching VMs and instances (`job` empty or `None`
    /// matches all). Instance and process states move together.
    pub fn change_job_state(
        &self,
        deployment: &str,
        job: Option<&str>,
        state: JobState,
    ) -> StateResult<()> {
        let mut data = self.write();
        data.require_deployment(deployment)?;

        let vm_state = state.vm_state();
        let process_state = state.process_state();

        let mut touched = 0usize;
        if let Some(vms) = data.vms.get_mut(deployment) {
            for vm in vms.iter_mut().filter(|vm| job_matches(job, &vm.job)) {
                vm.state = vm_state;
                vm.process_state = process_state;
                touched += 1;
            }
        }
        if let Some(instances) = data.instances.get_mut(deployment) {
            for instance in instances.iter_mut().filter(|i| job_matches(job, &i.job)) {
                instance.state = process_state;
                for process in &mut instance.processes {
                    process.state = process_state;
                }
            }
        }

        debug!(%deployment, ?job, ?state, vms = touched, "job state changed");
        Ok(())
    }

    /// Give matching VMs a fresh "recreated" cid. States are left alone.
    pub fn recreate_vms(
        &self,
        deployment: &str,
        job: Option<&str>,
        index: Option<&str>,
    ) -> StateResult<()> {
        let mut data = self.write();
        data.require_deployment(deployment)?;

        let selected = |j: &str, i: u32| job_matches(job, j) && index_matches(index, i);

        let mut touched = 0usize;
        if let Some(vms) = data.vms.get_mut(deployment) {
            for vm in vms.iter_mut().filter(|vm| selected(&vm.job, vm.index)) {
                vm.vm_cid = recreated_vm_cid(deployment, &vm.job, vm.index);
                touched += 1;
            }
        }
        // Keep the instance view pointing at the same VM.
        if let Some(instances) = data.instances.get_mut(deployment) {
            for instance in instances.iter_mut().filter(|i| selected(&i.job, i.index)) {
                instance.vm_cid = recreated_vm_cid(deployment, &instance.job, instance.index);
            }
        }

        debug!(%deployment, ?job, ?index, vms = touched, "VMs recreated");
        Ok(())
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Tasks matching `filter`, newest (highest id) first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let data = self.read();
        let matching = data.tasks.values().rev().filter(|t| filter.matches(t));
        match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        }
    }

    pub fn get_task(&self, id: TaskId) -> StateResult<Task> {
        self.read()
            .tasks
            .get(&id)
            .cloned()
            .ok_or(StateError::TaskNotFound(id))
    }

    /// Allocate the next task id and record a `queued` task.
    pub fn create_task(&self, description: &str, deployment: Option<&str>, user: &str) -> Task {
        let mut data = self.write();
        data.last_task_id += 1;
        let task = Task {
            id: data.last_task_id,
            state: TaskState::Queued,
            description: description.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            result: String::new(),
            user: user.to_string(),
            deployment: deployment.map(str::to_string),
            context_id: None,
        };
        data.tasks.insert(task.id, task.clone());
        debug!(task_id = task.id, %description, "task created");
        task
    }

    /// Move a task to `state`. An empty `result` keeps the previous text.
    ///
    /// Tasks already in `done` or `error` refuse further transitions.
    pub fn update_task_state(&self, id: TaskId, state: TaskState, result: &str) -> StateResult<()> {
        let mut data = self.write();
        let task = data.tasks.get_mut(&id).ok_or(StateError::TaskNotFound(id))?;
        if task.state.is_terminal() {
            return Err(StateError::TaskFinished {
                id,
                state: task.state,
            });
        }
        task.state = state;
        if !result.is_empty() {
            task.result = result.to_string();
        }
        debug!(task_id = id, %state, "task state updated");
        Ok(())
    }

    // ── Locks ──────────────────────────────────────────────────────

    /// Record an advisory lock. Nothing blocks on it and nothing expires it.
    pub fn add_lock(&self, lock_type: &str, resource: &str, task_id: TaskId, timeout: Duration) {
        let mut data = self.write();
        data.locks.push(Lock {
            lock_type: lock_type.to_string(),
            resource: resource.to_string(),
            timeout: format_timeout(timeout),
            task_id: task_id.to_string(),
        });
        debug!(%resource, task_id, "lock added");
    }

    /// Drop every lock on `resource`.
    pub fn remove_lock(&self, resource: &str) {
        let mut data = self.write();
        data.locks.retain(|l| l.resource != resource);
        debug!(%resource, "lock removed");
    }

    pub fn list_locks(&self) -> Vec<Lock> {
        self.read().locks.clone()
    }

    // ── Catalog ────────────────────────────────────────────────────

    pub fn list_stemcells(&self) -> Vec<Stemcell> {
        self.read().stemcells.clone()
    }

    pub fn list_releases(&self) -> Vec<Release> {
        self.read().releases.clone()
    }

    pub fn cloud_config(&self) -> Option<CloudConfig> {
        self.read().cloud_config.clone()
    }

    pub fn runtime_configs(&self) -> Vec<RuntimeConfig> {
        self.read().runtime_configs.clone()
    }

    pub fn cpi_config(&self) -> Option<CpiConfig> {
        self.read().cpi_config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vm(deployment: &str, job: &str, index: u32) -> Vm {
        Vm {
            vm_cid: format!("vm-{deployment}-{job}-{index}"),
            active: true,
            agent_id: format!("agent-{job}-{index}"),
            az: "z1".to_string(),
            bootstrap: index == 0,
            deployment: deployment.to_string(),
            ips: vec![format!("10.0.0.{}", index + 10)],
            job: job.to_string(),
            index,
            id: format!("{job}-{index}-id"),
            process_state: ProcessState::Running,
            state: VmState::Started,
            vm_type: "small".to_string(),
            ignore: false,
        }
    }

    fn test_instance(deployment: &str, job: &str, index: u32) -> Instance {
        Instance {
            agent_id: format!("agent-{job}-{index}"),
            az: "z1".to_string(),
            bootstrap: index == 0,
            deployment: deployment.to_string(),
            disk_cid: String::new(),
            expects_vm: true,
            id: format!("{job}-{index}-id"),
            ips: vec![],
            job: job.to_string(),
            index,
            state: ProcessState::Running,
            vm_type: "small".to_string(),
            vm_cid: format!("vm-{deployment}-{job}-{index}"),
            processes: vec![Process {
                name: format!("{job}-server"),
                state: ProcessState::Running,
                uptime: None,
                memory: None,
                cpu: None,
            }],
        }
    }

    fn test_deployment(name: &str) -> Deployment {
        Deployment {
            name: name.to_string(),
            cloud_config: "latest".to_string(),
            releases: vec![NameVersion::new(name, "1.0.0")],
            stemcells: vec![NameVersion::new("ubuntu-jammy", "1.200")],
        }
    }

    /// `app` has web/0, web/1 and worker/0; `redis` has redis/0 and redis/1.
    fn test_seed() -> SeedData {
        let mut seed = SeedData {
            deployments: vec![test_deployment("app"), test_deployment("redis")],
            stemcells: vec![Stemcell {
                name: "ubuntu-jammy".to_string(),
                operating_system: "ubuntu-jammy".to_string(),
                version: "1.200".to_string(),
                cid: "sc-1".to_string(),
                deployments: vec!["app".to_string(), "redis".to_string()],
            }],
            ..Default::default()
        };
        seed.vms.insert(
            "app".to_string(),
            vec![test_vm("app", "web", 0), test_vm("app", "web", 1), test_vm("app", "worker", 0)],
        );
        seed.instances.insert(
            "app".to_string(),
            vec![
                test_instance("app", "web", 0),
                test_instance("app", "web", 1),
                test_instance("app", "worker", 0),
            ],
        );
        seed.vms.insert(
            "redis".to_string(),
            vec![test_vm("redis", "redis", 0), test_vm("redis", "redis", 1)],
        );
        seed.instances.insert(
            "redis".to_string(),
            vec![test_instance("redis", "redis", 0), test_instance("redis", "redis", 1)],
        );
        seed.variables.insert(
            "redis".to_string(),
            vec![Variable {
                id: "var-1".to_string(),
                name: "redis_password".to_string(),
            }],
        );
        seed
    }

    fn test_store() -> EntityStore {
        EntityStore::new(test_seed()).unwrap()
    }

    // ── Seeding ────────────────────────────────────────────────────

    #[test]
    fn seed_rejects_vm_under_wrong_key() {
        let mut seed = test_seed();
        seed.vms
            .get_mut("app")
            .unwrap()
            .push(test_vm("redis", "redis", 5));
        let err = EntityStore::new(seed).err().unwrap();
        assert!(matches!(err, StateError::InvalidSeed(_)));
    }

    #[test]
    fn seed_rejects_unknown_deployment_key() {
        let mut seed = test_seed();
        seed.variables.insert("ghost".to_string(), vec![]);
        assert!(matches!(
            EntityStore::new(seed).err(),
            Some(StateError::InvalidSeed(_))
        ));
    }

    #[test]
    fn seed_rejects_duplicate_deployment() {
        let mut seed = test_seed();
        seed.deployments.push(test_deployment("app"));
        assert!(EntityStore::new(seed).is_err());
    }

    #[test]
    fn task_ids_continue_above_seeded_tasks() {
        let mut seed = test_seed();
        seed.task_id_floor = 10;
        seed.tasks.push(Task {
            id: 42,
            state: TaskState::Done,
            description: "old".to_string(),
            timestamp: 0,
            result: String::new(),
            user: "admin".to_string(),
            deployment: None,
            context_id: None,
        });
        let store = EntityStore::new(seed).unwrap();
        assert_eq!(store.create_task("next", None, "admin").id, 43);
    }

    #[test]
    fn fixtures_seed_cleanly() {
        let store = EntityStore::with_fixtures().unwrap();
        let names: HashSet<String> = store.list_deployments().into_iter().map(|d| d.name).collect();
        assert!(names.contains("cf"));
        assert!(names.contains("redis"));
        assert!(names.contains("mysql"));
        assert!(store.cloud_config().is_some());
        assert!(store.cpi_config().is_some());
        assert!(!store.runtime_configs().is_empty());
        assert!(store.create_task("t", None, "admin").id > 100);
    }

    // ── Deployments ────────────────────────────────────────────────

    #[test]
    fn get_deployment_found_and_missing() {
        let store = test_store();
        assert_eq!(store.get_deployment("app").unwrap().name, "app");
        assert_eq!(
            store.get_deployment("nope"),
            Err(StateError::DeploymentNotFound("nope".to_string()))
        );
    }

    #[test]
    fn delete_cascades() {
        let store = test_store();
        store.delete_deployment("redis").unwrap();

        assert!(store.get_deployment("redis").is_err());
        assert!(!store.has_deployment("redis"));
        assert!(store.list_vms("redis").is_err());
        assert!(store.list_instances("redis").is_err());
        assert!(store.list_variables("redis").is_err());
        for stemcell in store.list_stemcells() {
            assert!(!stemcell.deployments.iter().any(|d| d == "redis"));
        }
        // Other deployment untouched.
        assert_eq!(store.list_vms("app").unwrap().len(), 3);
        assert_eq!(store.list_stemcells()[0].deployments, vec!["app".to_string()]);
    }

    #[test]
    fn delete_missing_leaves_store_unchanged() {
        let store = test_store();
        let before = store.list_deployments();
        assert_eq!(
            store.delete_deployment("ghost"),
            Err(StateError::DeploymentNotFound("ghost".to_string()))
        );
        assert_eq!(store.list_deployments(), before);
        assert_eq!(store.list_stemcells()[0].deployments.len(), 2);
    }

    #[test]
    fn empty_deployment_is_not_missing() {
        let mut seed = test_seed();
        seed.deployments.push(test_deployment("bare"));
        let store = EntityStore::new(seed).unwrap();

        assert!(store.list_vms("bare").unwrap().is_empty());
        assert!(store.list_instances("bare").unwrap().is_empty());
        assert!(store.list_variables("bare").unwrap().is_empty());
        assert!(store.list_vms("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn returned_values_are_copies() {
        let store = test_store();
        let mut vms = store.list_vms("app").unwrap();
        vms[0].vm_cid = "mutated".to_string();
        vms.clear();

        let mut deployment = store.get_deployment("app").unwrap();
        deployment.releases.clear();

        assert_eq!(store.list_vms("app").unwrap()[0].vm_cid, "vm-app-web-0");
        assert_eq!(store.get_deployment("app").unwrap().releases.len(), 1);
    }

    // ── Job state ──────────────────────────────────────────────────

    #[test]
    fn stop_then_start_restores_targeted_job() {
        let store = test_store();
        let before_vms = store.list_vms("app").unwrap();
        let before_instances = store.list_instances("app").unwrap();

        store.change_job_state("app", Some("web"), JobState::Stopped).unwrap();
        for vm in store.list_vms("app").unwrap() {
            if vm.job == "web" {
                assert_eq!(vm.state, VmState::Stopped);
                assert_eq!(vm.process_state, ProcessState::Stopped);
            } else {
                assert_eq!(vm.state, VmState::Started);
            }
        }
        for instance in store.list_instances("app").unwrap() {
            let expected = if instance.job == "web" {
                ProcessState::Stopped
            } else {
                ProcessState::Running
            };
            assert_eq!(instance.state, expected);
            assert!(instance.processes.iter().all(|p| p.state == expected));
        }

        store.change_job_state("app", Some("web"), JobState::Started).unwrap();
        assert_eq!(store.list_vms("app").unwrap(), before_vms);
        assert_eq!(store.list_instances("app").unwrap(), before_instances);
    }

    #[test]
    fn empty_job_matches_everything() {
        let store = test_store();
        store.change_job_state("app", Some(""), JobState::Stopped).unwrap();
        assert!(
            store
                .list_vms("app")
                .unwrap()
                .iter()
                .all(|vm| vm.state == VmState::Stopped)
        );

        store.change_job_state("app", None, JobState::Restart).unwrap();
        assert!(
            store
                .list_vms("app")
                .unwrap()
                .iter()
                .all(|vm| {
                    vm.state == VmState::Started && vm.process_state == ProcessState::Running
                })
        );
        // Other deployments are never touched.
        assert!(
            store
                .list_vms("redis")
                .unwrap()
                .iter()
                .all(|vm| vm.state == VmState::Started)
        );
    }

    #[test]
    fn change_job_state_missing_deployment() {
        let store = test_store();
        assert!(
            store
                .change_job_state("ghost", None, JobState::Stopped)
                .unwrap_err()
                .is_not_found()
        );
    }

    // ── Recreate ───────────────────────────────────────────────────

    #[test]
    fn recreate_single_index() {
        let store = test_store();
        store.recreate_vms("redis", Some("redis"), Some("0")).unwrap();

        let vms = store.list_vms("redis").unwrap();
        assert_eq!(vms[0].vm_cid, "vm-redis-redis-0-recreated");
        assert_eq!(vms[1].vm_cid, "vm-redis-redis-1");
        assert_eq!(vms[0].state, VmState::Started);
        assert_eq!(
            store.list_instances("redis").unwrap()[0].vm_cid,
            "vm-redis-redis-0-recreated"
        );
    }

    #[test]
    fn recreate_whole_job_and_whole_deployment() {
        let store = test_store();
        store.recreate_vms("app", Some("web"), None).unwrap();
        let vms = store.list_vms("app").unwrap();
        assert!(vms[0].vm_cid.ends_with("-recreated"));
        assert!(vms[1].vm_cid.ends_with("-recreated"));
        assert_eq!(vms[2].vm_cid, "vm-app-worker-0");

        store.recreate_vms("app", None, Some("")).unwrap();
        assert!(
            store
                .list_vms("app")
                .unwrap()
                .iter()
                .all(|vm| vm.vm_cid.ends_with("-recreated"))
        );
    }

    #[test]
    fn recreate_missing_deployment() {
        let store = test_store();
        assert_eq!(
            store.recreate_vms("ghost", None, None),
            Err(StateError::DeploymentNotFound("ghost".to_string()))
        );
    }

    // ── Tasks ──────────────────────────────────────────────────────

    #[test]
    fn task_ids_strictly_increase() {
        let store = test_store();
        let mut last = 0;
        for i in 0..20 {
            let task = store.create_task(&format!("task {i}"), Some("app"), "admin");
            assert!(task.id > last);
            assert_eq!(task.state, TaskState::Queued);
            assert_eq!(task.user, "admin");
            last = task.id;
        }
    }

    #[test]
    fn update_task_state_and_result() {
        let store = test_store();
        let task = store.create_task("work", Some("app"), "admin");

        store.update_task_state(task.id, TaskState::Processing, "").unwrap();
        assert_eq!(store.get_task(task.id).unwrap().state, TaskState::Processing);

        store
            .update_task_state(task.id, TaskState::Processing, "halfway")
            .unwrap();
        store.update_task_state(task.id, TaskState::Done, "").unwrap();
        let done = store.get_task(task.id).unwrap();
        assert_eq!(done.state, TaskState::Done);
        assert_eq!(done.result, "halfway");

        assert_eq!(
            store.update_task_state(99_999, TaskState::Done, ""),
            Err(StateError::TaskNotFound(99_999))
        );
    }

    #[test]
    fn terminal_tasks_refuse_transitions() {
        let store = test_store();
        let task = store.create_task("work", None, "admin");
        store.update_task_state(task.id, TaskState::Error, "forced").unwrap();

        let err = store
            .update_task_state(task.id, TaskState::Processing, "")
            .unwrap_err();
        assert_eq!(
            err,
            StateError::TaskFinished {
                id: task.id,
                state: TaskState::Error
            }
        );
        let after = store.get_task(task.id).unwrap();
        assert_eq!(after.state, TaskState::Error);
        assert_eq!(after.result, "forced");
    }

    #[test]
    fn list_tasks_filters_and_orders() {
        let store = test_store();
        let a = store.create_task("a", Some("app"), "admin");
        let b = store.create_task("b", Some("redis"), "admin");
        let c = store.create_task("c", Some("app"), "admin");
        let d = store.create_task("d", None, "admin");
        store.update_task_state(a.id, TaskState::Done, "ok").unwrap();
        store.update_task_state(b.id, TaskState::Done, "ok").unwrap();

        let all = store.list_tasks(&TaskFilter::new());
        let ids: Vec<TaskId> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![d.id, c.id, b.id, a.id]);

        let done = store.list_tasks(&TaskFilter::new().state(TaskState::Done));
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(|t| t.state == TaskState::Done));

        let done_app =
            store.list_tasks(&TaskFilter::new().state(TaskState::Done).deployment("app"));
        assert_eq!(done_app.len(), 1);
        assert_eq!(done_app[0].id, a.id);

        let newest_two = store.list_tasks(&TaskFilter::new().limit(2));
        assert_eq!(
            newest_two.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![d.id, c.id]
        );

        assert_eq!(store.list_tasks(&TaskFilter::new().limit(0)).len(), 4);
        assert_eq!(store.list_tasks(&TaskFilter::new().limit(-3)).len(), 4);
    }

    #[test]
    fn list_tasks_accepts_state_lists() {
        let store = test_store();
        let a = store.create_task("a", Some("app"), "admin");
        let b = store.create_task("b", Some("app"), "admin");
        let c = store.create_task("c", Some("app"), "admin");
        store.update_task_state(a.id, TaskState::Done, "ok").unwrap();
        store.update_task_state(b.id, TaskState::Processing, "").unwrap();

        let active =
            store.list_tasks(&TaskFilter::new().state_list("processing,cancelling,queued"));
        let ids: Vec<TaskId> = active.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c.id, b.id]);

        let spaced = store.list_tasks(&TaskFilter::new().state_list("done, queued"));
        assert_eq!(spaced.len(), 2);

        assert!(store.list_tasks(&TaskFilter::new().state_list("paused")).is_empty());
    }

    // ── Locks ──────────────────────────────────────────────────────

    #[test]
    fn locks_add_list_remove() {
        let store = test_store();
        store.add_lock("deployment", "app", 7, Duration::from_secs(30 * 60));
        store.add_lock("deployment", "redis", 8, Duration::from_secs(30 * 60));

        let locks = store.list_locks();
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0].timeout, "30m0s");
        assert_eq!(locks[0].task_id, "7");

        store.remove_lock("app");
        let locks = store.list_locks();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].resource, "redis");

        // Removing an absent lock is a no-op.
        store.remove_lock("app");
        assert_eq!(store.list_locks().len(), 1);
    }

    // ── Concurrency ────────────────────────────────────────────────

    #[test]
    fn concurrent_readers_and_writers_never_see_partial_state() {
        let store = test_store();
        let mut handles = Vec::new();

        for worker in 0..16 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..200 {
                    match (worker + i) % 4 {
                        0 => {
                            let state = if i % 2 == 0 {
                                JobState::Stopped
                            } else {
                                JobState::Started
                            };
                            store.change_job_state("app", None, state).unwrap();
                        }
                        1 => {
                            // VM state and process state always move together.
                            for vm in store.list_vms("app").unwrap() {
                                assert_eq!(vm.deployment, "app");
                                let stopped = vm.state == VmState::Stopped;
                                assert_eq!(stopped, vm.process_state == ProcessState::Stopped);
                            }
                            for instance in store.list_instances("app").unwrap() {
                                assert!(
                                    instance.processes.iter().all(|p| p.state == instance.state)
                                );
                            }
                        }
                        2 => ids.push(store.create_task("stress", Some("app"), "admin").id),
                        _ => {
                            // redis is either fully present or fully gone.
                            if let Ok(vms) = store.list_vms("redis") {
                                assert_eq!(vms.len(), 2);
                            }
                            let _ = store.list_tasks(&TaskFilter::new().limit(5));
                            if worker == 3 && i == 100 {
                                store.delete_deployment("redis").unwrap();
                            }
                        }
                    }
                }
                ids
            }));
        }

        let mut all_ids = Vec::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            all_ids.extend(ids);
        }
        let unique: HashSet<TaskId> = all_ids.iter().copied().collect();
        assert_eq!(unique.len(), all_ids.len());
        assert!(!store.has_deployment("redis"));
        assert!(
            store
                .list_stemcells()
                .iter()
                .all(|s| !s.deployments.iter().any(|d| d == "redis"))
        );
    }
}
