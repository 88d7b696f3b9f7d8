//! Sample director contents: `cf`, `redis` and `mysql` deployments with
//! their VMs, instances, variables, a short task history and the catalog.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::store::SeedData;
use crate::types::*;

const STEMCELL: &str = "bosh-google-kvm-ubuntu-jammy-go_agent";

/// `(job, index, az, ip, vm_type)` for every VM of a deployment.
type VmRow = (&'static str, u32, &'static str, &'static str, &'static str);

const CF_VMS: &[VmRow] = &[
    ("diego_cell", 0, "z1", "10.0.1.10", "large"),
    ("diego_cell", 1, "z2", "10.0.2.10", "large"),
    ("diego_cell", 2, "z3", "10.0.3.10", "large"),
    ("router", 0, "z1", "10.0.1.20", "medium"),
    ("router", 1, "z2", "10.0.2.20", "medium"),
    ("api", 0, "z1", "10.0.1.30", "medium"),
    ("uaa", 0, "z1", "10.0.1.40", "medium"),
    ("doppler", 0, "z1", "10.0.1.50", "small"),
];

const REDIS_VMS: &[VmRow] = &[
    ("redis", 0, "z1", "10.0.4.10", "medium"),
    ("redis", 1, "z2", "10.0.4.11", "medium"),
];

const MYSQL_VMS: &[VmRow] = &[
    ("mysql", 0, "z1", "10.0.5.10", "large"),
    ("mysql", 1, "z2", "10.0.5.11", "large"),
    ("mysql", 2, "z3", "10.0.5.12", "large"),
];

/// Processes each job runs, with `(mem percent, mem kb, cpu total)`.
fn job_processes(job: &str) -> &'static [(&'static str, f64, u64, f64)] {
    match job {
        "diego_cell" => &[
            ("rep", 45.2, 1_024_000, 12.5),
            ("garden", 30.1, 512_000, 8.2),
            ("route_emitter", 5.0, 102_400, 1.0),
        ],
        "router" => &[
            ("gorouter", 20.0, 256_000, 15.0),
            ("route_registrar", 2.0, 25_600, 0.5),
        ],
        "api" => &[
            ("cloud_controller_ng", 35.0, 450_000, 8.0),
            ("nginx", 5.0, 64_000, 2.0),
        ],
        "uaa" => &[("uaa", 25.0, 320_000, 3.0)],
        "doppler" => &[("doppler", 10.0, 128_000, 4.0)],
        "redis" => &[
            ("redis-server", 60.0, 768_000, 5.0),
            ("redis-sentinel", 2.0, 25_600, 0.2),
        ],
        "mysql" => &[
            ("pxc-mysql", 70.0, 2_048_000, 20.0),
            ("galera-agent", 3.0, 38_400, 0.5),
        ],
        _ => &[],
    }
}

/// The full sample director, with timestamps relative to now.
pub fn default_fixtures() -> SeedData {
    let now = Utc::now();

    let mut vms = HashMap::new();
    let mut instances = HashMap::new();
    for (deployment, rows, uptime) in [
        ("cf", CF_VMS, 86_400),
        ("redis", REDIS_VMS, 604_800),
        ("mysql", MYSQL_VMS, 1_209_600),
    ] {
        vms.insert(
            deployment.to_string(),
            rows.iter().map(|row| vm(deployment, row)).collect(),
        );
        instances.insert(
            deployment.to_string(),
            rows.iter()
                .map(|row| instance(deployment, row, uptime))
                .collect(),
        );
    }

    SeedData {
        deployments: deployments(),
        vms,
        instances,
        variables: variables(),
        tasks: tasks(now),
        stemcells: stemcells(),
        releases: releases(),
        cloud_config: Some(CloudConfig {
            properties: CLOUD_CONFIG.to_string(),
            created_at: rfc3339_ago(now, 1),
        }),
        runtime_configs: vec![
            RuntimeConfig {
                name: "default".to_string(),
                properties: RUNTIME_CONFIG_DEFAULT.to_string(),
                created_at: rfc3339_ago(now, 24),
            },
            RuntimeConfig {
                name: "dns".to_string(),
                properties: RUNTIME_CONFIG_DNS.to_string(),
                created_at: rfc3339_ago(now, 48),
            },
        ],
        cpi_config: Some(CpiConfig {
            properties: CPI_CONFIG.to_string(),
            created_at: rfc3339_ago(now, 72),
        }),
        task_id_floor: 100,
    }
}

fn rfc3339_ago(now: DateTime<Utc>, hours: i64) -> String {
    (now - Duration::hours(hours)).to_rfc3339()
}

fn deployments() -> Vec<Deployment> {
    let stemcell = || vec![NameVersion::new(STEMCELL, "1.200")];
    vec![
        Deployment {
            name: "cf".to_string(),
            cloud_config: "latest".to_string(),
            releases: vec![
                NameVersion::new("cf-deployment", "40.0.0"),
                NameVersion::new("cflinuxfs4", "1.50.0"),
                NameVersion::new("diego", "2.80.0"),
                NameVersion::new("garden-runc", "1.28.0"),
            ],
            stemcells: stemcell(),
        },
        Deployment {
            name: "redis".to_string(),
            cloud_config: "latest".to_string(),
            releases: vec![NameVersion::new("redis", "16.0.0")],
            stemcells: stemcell(),
        },
        Deployment {
            name: "mysql".to_string(),
            cloud_config: "latest".to_string(),
            releases: vec![NameVersion::new("pxc", "0.42.0")],
            stemcells: stemcell(),
        },
    ]
}

fn vm(deployment: &str, &(job, index, az, ip, vm_type): &VmRow) -> Vm {
    Vm {
        vm_cid: format!("vm-{deployment}-{}-{index}", job.replace('_', "-")),
        active: true,
        agent_id: format!("agent-{deployment}-{job}-{index}"),
        az: az.to_string(),
        bootstrap: index == 0,
        deployment: deployment.to_string(),
        ips: vec![ip.to_string()],
        job: job.to_string(),
        index,
        id: format!("{deployment}-{job}-{index}-id"),
        process_state: ProcessState::Running,
        state: VmState::Started,
        vm_type: vm_type.to_string(),
        ignore: false,
    }
}

fn instance(deployment: &str, row: &VmRow, uptime: u64) -> Instance {
    let vm = vm(deployment, row);
    let processes = job_processes(&vm.job)
        .iter()
        .map(|&(name, percent, kb, cpu)| Process {
            name: name.to_string(),
            state: ProcessState::Running,
            uptime: Some(Uptime { secs: uptime }),
            memory: Some(MemoryUsage { percent, kb }),
            cpu: Some(CpuUsage { total: cpu }),
        })
        .collect();

    Instance {
        agent_id: vm.agent_id,
        az: vm.az,
        bootstrap: vm.bootstrap,
        deployment: vm.deployment,
        disk_cid: format!("disk-{deployment}-{}-{}", vm.job, vm.index),
        expects_vm: true,
        id: vm.id,
        ips: vm.ips,
        job: vm.job,
        index: vm.index,
        state: ProcessState::Running,
        vm_type: vm.vm_type,
        vm_cid: vm.vm_cid,
        processes,
    }
}

fn variables() -> HashMap<String, Vec<Variable>> {
    let table: [(&str, &[(&str, &str)]); 3] = [
        (
            "cf",
            &[
                ("var-1", "cf_admin_password"),
                ("var-2", "uaa_admin_client_secret"),
                ("var-3", "router_ca"),
                ("var-4", "router_ssl"),
                ("var-5", "diego_instance_identity_ca"),
                ("var-6", "cc_db_encryption_key"),
            ],
        ),
        (
            "redis",
            &[("var-10", "redis_password"), ("var-11", "redis_tls_ca")],
        ),
        (
            "mysql",
            &[
                ("var-20", "mysql_admin_password"),
                ("var-21", "pxc_galera_ca"),
                ("var-22", "mysql_server_certificate"),
            ],
        ),
    ];
    table
        .iter()
        .map(|(deployment, vars)| {
            let vars: Vec<Variable> = vars
                .iter()
                .map(|(id, name)| Variable {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect();
            (deployment.to_string(), vars)
        })
        .collect()
}

fn tasks(now: DateTime<Utc>) -> Vec<Task> {
    let history: [(TaskId, TaskState, &str, i64, &str, Option<&str>); 8] = [
        (1, TaskState::Done, "create deployment cf", 24, "Created", Some("cf")),
        (2, TaskState::Done, "create deployment redis", 20, "Created", Some("redis")),
        (3, TaskState::Done, "create deployment mysql", 16, "Created", Some("mysql")),
        (
            4,
            TaskState::Done,
            "run errand smoke_tests",
            12,
            "Errand completed successfully",
            Some("cf"),
        ),
        (
            5,
            TaskState::Error,
            "run errand acceptance_tests",
            8,
            "Error: Test failure in router tests",
            Some("cf"),
        ),
        (6, TaskState::Done, "update deployment cf", 4, "Updated", Some("cf")),
        (7, TaskState::Done, "snapshot deployment mysql", 2, "Snapshot created", Some("mysql")),
        (8, TaskState::Done, "update cloud config", 1, "Updated", None),
    ];
    history
        .into_iter()
        .map(|(id, state, description, hours_ago, result, deployment)| Task {
            id,
            state,
            description: description.to_string(),
            timestamp: (now - Duration::hours(hours_ago)).timestamp(),
            result: result.to_string(),
            user: "admin".to_string(),
            deployment: deployment.map(str::to_string),
            context_id: None,
        })
        .collect()
}

fn stemcells() -> Vec<Stemcell> {
    vec![
        Stemcell {
            name: STEMCELL.to_string(),
            operating_system: "ubuntu-jammy".to_string(),
            version: "1.200".to_string(),
            cid: "stemcell-uuid-1200".to_string(),
            deployments: vec!["cf".to_string(), "redis".to_string(), "mysql".to_string()],
        },
        Stemcell {
            name: STEMCELL.to_string(),
            operating_system: "ubuntu-jammy".to_string(),
            version: "1.199".to_string(),
            cid: "stemcell-uuid-1199".to_string(),
            deployments: vec![],
        },
        Stemcell {
            name: "bosh-google-kvm-ubuntu-bionic-go_agent".to_string(),
            operating_system: "ubuntu-bionic".to_string(),
            version: "1.150".to_string(),
            cid: "stemcell-uuid-bionic-1150".to_string(),
            deployments: vec![],
        },
    ]
}

fn releases() -> Vec<Release> {
    [
        ("cf-deployment", "40.0.0", "abc123def"),
        ("cf-deployment", "39.0.0", "xyz789ghi"),
        ("cflinuxfs4", "1.50.0", "fs4abc123"),
        ("diego", "2.80.0", "diego80abc"),
        ("garden-runc", "1.28.0", "garden28xyz"),
        ("redis", "16.0.0", "redis16abc"),
        ("pxc", "0.42.0", "pxc42def"),
        ("bpm", "1.2.0", "bpm12ghi"),
        ("os-conf", "22.0.0", "osconf22jkl"),
    ]
    .into_iter()
    .map(|(name, version, commit)| Release {
        name: name.to_string(),
        version: version.to_string(),
        commit_hash: commit.to_string(),
        uncommitted_changes: false,
    })
    .collect()
}

const CLOUD_CONFIG: &str = "\
azs:
- name: z1
  cloud_properties:
    zone: us-central1-a
- name: z2
  cloud_properties:
    zone: us-central1-b
- name: z3
  cloud_properties:
    zone: us-central1-c

vm_types:
- name: small
  cloud_properties:
    machine_type: n1-standard-1
    root_disk_size_gb: 20
- name: medium
  cloud_properties:
    machine_type: n1-standard-2
    root_disk_size_gb: 50
- name: large
  cloud_properties:
    machine_type: n1-standard-4
    root_disk_size_gb: 100

networks:
- name: default
  type: manual
  subnets:
  - range: 10.0.0.0/16
    gateway: 10.0.0.1
    azs: [z1, z2, z3]
    dns: [8.8.8.8, 8.8.4.4]

compilation:
  workers: 5
  reuse_compilation_vms: true
  az: z1
  vm_type: medium
  network: default
";

const RUNTIME_CONFIG_DEFAULT: &str = "\
releases:
- name: os-conf
  version: 22.0.0

addons:
- name: os-configuration
  jobs:
  - name: sysctl
    release: os-conf
    properties:
      sysctl:
      - net.ipv4.tcp_keepalive_time=120
";

const RUNTIME_CONFIG_DNS: &str = "\
releases:
- name: bosh-dns
  version: 1.32.0

addons:
- name: bosh-dns
  jobs:
  - name: bosh-dns
    release: bosh-dns
";

const CPI_CONFIG: &str = "\
cpis:
- name: gcp-cpi
  type: google
  properties:
    project: my-gcp-project
    default_zone: us-central1-a
";
