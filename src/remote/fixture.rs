//! In-memory [`RemoteSource`] backed by a JSON fixture.
//!
//! Mutations (delete, restore, terminate, ...) are applied to the in-memory
//! state so subsequent reads observe them.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::*;
use super::{RemoteError, RemoteSource};
use crate::error::{DashboardError, Result};

const DEFAULT_INSTANCE_PAGE_SIZE: usize = 25;

/// One environment as the fixture stores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureEnvironment {
    pub summary: EnvironmentSummary,
    /// `None` means enhanced health is not enabled.
    pub health: Option<EnvironmentHealth>,
    pub instances: Vec<InstanceHealth>,
    pub resources: EnvironmentResources,
    pub load_balancer_states: Vec<LoadBalancerInstanceState>,
    /// EC2 state per instance id; unlisted instances are `running`.
    pub instance_states: BTreeMap<String, String>,
}

/// Complete fixture document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureData {
    pub environments: Vec<FixtureEnvironment>,
    /// Versions per application, newest first.
    pub app_versions: BTreeMap<String, Vec<AppVersion>>,
    pub terminated_environments: Vec<TerminatedEnvironment>,
    pub lifecycles: BTreeMap<String, VersionLifecycle>,
    pub instance_page_size: Option<usize>,
    /// Stamp health responses with the current clock, as a live service would.
    pub live_clock: bool,
}

pub struct FixtureRemote {
    data: Mutex<FixtureData>,
}

impl FixtureRemote {
    pub fn new(data: FixtureData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Loads a fixture document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| DashboardError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let data: FixtureData =
            serde_json::from_str(&text).map_err(|source| DashboardError::Json {
                context: path.display().to_string(),
                source,
            })?;
        info!(
            path = %path.display(),
            environments = data.environments.len(),
            "loaded fixture"
        );
        Ok(Self::new(data))
    }

    /// A generated application with one enhanced-health environment, one
    /// basic-health environment, a version history and terminated
    /// environments to browse.
    pub fn demo(app_name: &str, env_name: &str) -> Self {
        Self::new(demo_data(app_name, env_name, Utc::now()))
    }

    /// Copy of the current state.
    pub fn data(&self) -> FixtureData {
        self.data.lock().clone()
    }

    fn with_env<T>(
        &self,
        env_name: &str,
        f: impl FnOnce(&FixtureEnvironment) -> std::result::Result<T, RemoteError>,
    ) -> std::result::Result<T, RemoteError> {
        let data = self.data.lock();
        let env = data
            .environments
            .iter()
            .find(|e| e.summary.environment_name == env_name)
            .ok_or_else(|| no_such_environment(env_name))?;
        f(env)
    }
}

fn no_such_environment(env_name: &str) -> RemoteError {
    RemoteError::InvalidParameter(format!(
        "No Environment found for EnvironmentName = '{}'.",
        env_name
    ))
}

fn no_such_instance(instance_id: &str) -> RemoteError {
    RemoteError::NotFound(format!("The instance ID '{}' does not exist", instance_id))
}

fn env_has_instance(env: &FixtureEnvironment, instance_id: &str) -> bool {
    env.resources.instance_ids.iter().any(|id| id == instance_id)
        || env.instances.iter().any(|i| i.instance_id == instance_id)
}

impl RemoteSource for FixtureRemote {
    fn get_environment_health(&self, env_name: &str) -> std::result::Result<EnvironmentHealth, RemoteError> {
        let live_clock = self.data.lock().live_clock;
        self.with_env(env_name, |env| {
            let mut health = env.health.clone().ok_or(RemoteError::HealthUnsupported)?;
            if live_clock {
                let now = Utc::now();
                health.refreshed_at = now.duration_trunc(ChronoDuration::seconds(10)).ok();
                health.response_date = Some(now);
            }
            Ok(health)
        })
    }

    fn get_instance_health(
        &self,
        env_name: &str,
        next_token: Option<&str>,
    ) -> std::result::Result<InstanceHealthPage, RemoteError> {
        let page_size = self
            .data
            .lock()
            .instance_page_size
            .unwrap_or(DEFAULT_INSTANCE_PAGE_SIZE)
            .max(1);
        self.with_env(env_name, |env| {
            if env.health.is_none() {
                return Err(RemoteError::HealthUnsupported);
            }
            let start = match next_token {
                Some(token) => token
                    .parse::<usize>()
                    .map_err(|_| RemoteError::Validation(format!("Invalid NextToken '{}'", token)))?,
                None => 0,
            };
            let end = (start + page_size).min(env.instances.len());
            let list = env.instances.get(start..end).unwrap_or_default().to_vec();
            let next_token = (end < env.instances.len()).then(|| end.to_string());
            Ok(InstanceHealthPage {
                instance_health_list: list,
                next_token,
            })
        })
    }

    fn get_environment(
        &self,
        app_name: &str,
        env_name: &str,
    ) -> std::result::Result<EnvironmentSummary, RemoteError> {
        self.with_env(env_name, |env| {
            if env.summary.application_name != app_name {
                return Err(RemoteError::NotFound(format!(
                    "Environment \"{}\" not Found.",
                    env_name
                )));
            }
            Ok(env.summary.clone())
        })
    }

    fn get_environment_resources(
        &self,
        env_name: &str,
    ) -> std::result::Result<EnvironmentResources, RemoteError> {
        self.with_env(env_name, |env| Ok(env.resources.clone()))
    }

    fn get_load_balancer_health(
        &self,
        load_balancer: &str,
    ) -> std::result::Result<Vec<LoadBalancerInstanceState>, RemoteError> {
        let data = self.data.lock();
        data.environments
            .iter()
            .find(|e| e.resources.load_balancers.iter().any(|lb| lb == load_balancer))
            .map(|e| e.load_balancer_states.clone())
            .ok_or_else(|| {
                RemoteError::NotFound(format!("There is no ACTIVE Load Balancer named '{}'", load_balancer))
            })
    }

    fn get_instance_state(&self, instance_id: &str) -> std::result::Result<String, RemoteError> {
        let data = self.data.lock();
        data.environments
            .iter()
            .find(|e| env_has_instance(e, instance_id))
            .map(|e| {
                e.instance_states
                    .get(instance_id)
                    .cloned()
                    .unwrap_or_else(|| "running".to_string())
            })
            .ok_or_else(|| no_such_instance(instance_id))
    }

    fn get_application_versions(
        &self,
        app_name: &str,
    ) -> std::result::Result<Vec<AppVersion>, RemoteError> {
        Ok(self
            .data
            .lock()
            .app_versions
            .get(app_name)
            .cloned()
            .unwrap_or_default())
    }

    fn get_terminated_environments(
        &self,
        app_name: Option<&str>,
    ) -> std::result::Result<Vec<TerminatedEnvironment>, RemoteError> {
        Ok(self
            .data
            .lock()
            .terminated_environments
            .iter()
            .filter(|e| app_name.is_none_or(|app| e.application_name == app))
            .cloned()
            .collect())
    }

    fn restore(&self, env_id: &str) -> std::result::Result<(), RemoteError> {
        let mut data = self.data.lock();
        let index = data
            .terminated_environments
            .iter()
            .position(|e| e.environment_id == env_id)
            .ok_or_else(|| {
                RemoteError::NotFound(format!("No Environment found for EnvironmentId = '{}'.", env_id))
            })?;
        let env = data.terminated_environments.remove(index);
        info!(env_id, env_name = %env.environment_name, "restored environment");
        data.environments.push(FixtureEnvironment {
            summary: EnvironmentSummary {
                environment_name: env.environment_name,
                environment_id: env.environment_id,
                application_name: env.application_name,
                status: "Launching".to_string(),
                health: "Grey".to_string(),
                tier: "WebServer".to_string(),
                platform_arn: None,
                solution_stack_name: env.solution_stack_name,
                version_label: env.version_label,
            },
            ..Default::default()
        });
        Ok(())
    }

    fn delete_version(&self, app_name: &str, version_label: &str) -> std::result::Result<(), RemoteError> {
        let mut data = self.data.lock();
        let deployed_to: Vec<String> = data
            .environments
            .iter()
            .filter(|e| {
                e.summary.application_name == app_name
                    && e.summary.version_label.as_deref() == Some(version_label)
            })
            .map(|e| e.summary.environment_name.clone())
            .collect();
        if !deployed_to.is_empty() {
            return Err(RemoteError::Validation(format!(
                "Cannot delete Application version {} as it is deployed to Environments: {}",
                version_label,
                deployed_to.join(", ")
            )));
        }
        let not_found = || {
            RemoteError::NotFound(format!(
                "Application {} does not have Application Version {}.",
                app_name, version_label
            ))
        };
        let versions = data.app_versions.get_mut(app_name).ok_or_else(not_found)?;
        let index = versions
            .iter()
            .position(|v| v.version_label == version_label)
            .ok_or_else(not_found)?;
        versions.remove(index);
        info!(app_name, version_label, "deleted application version");
        Ok(())
    }

    fn reboot_instance(&self, instance_id: &str) -> std::result::Result<(), RemoteError> {
        let mut data = self.data.lock();
        let env = data
            .environments
            .iter_mut()
            .find(|e| env_has_instance(e, instance_id))
            .ok_or_else(|| no_such_instance(instance_id))?;
        if let Some(instance) = env.instances.iter_mut().find(|i| i.instance_id == instance_id) {
            instance.health_status = "Info".to_string();
            instance.color = "Green".to_string();
            instance.causes = vec!["Instance reboot in progress.".to_string()];
        }
        info!(instance_id, "rebooting instance");
        Ok(())
    }

    fn terminate_instance(&self, instance_id: &str) -> std::result::Result<(), RemoteError> {
        let mut data = self.data.lock();
        let env = data
            .environments
            .iter_mut()
            .find(|e| env_has_instance(e, instance_id))
            .ok_or_else(|| no_such_instance(instance_id))?;
        env.instances.retain(|i| i.instance_id != instance_id);
        env.resources.instance_ids.retain(|id| id != instance_id);
        env.load_balancer_states.retain(|s| s.instance_id != instance_id);
        env.instance_states
            .insert(instance_id.to_string(), "shutting-down".to_string());
        info!(instance_id, "terminating instance");
        Ok(())
    }

    fn get_version_lifecycle(&self, app_name: &str) -> std::result::Result<VersionLifecycle, RemoteError> {
        Ok(self
            .data
            .lock()
            .lifecycles
            .get(app_name)
            .cloned()
            .unwrap_or_default())
    }

    fn update_version_lifecycle(
        &self,
        app_name: &str,
        policy: &VersionLifecycle,
    ) -> std::result::Result<(), RemoteError> {
        if policy.max_count == Some(0) {
            return Err(RemoteError::Validation(
                "MaxCount must be at least 1.".to_string(),
            ));
        }
        if policy.max_age_in_days == Some(0) {
            return Err(RemoteError::Validation(
                "MaxAgeInDays must be at least 1.".to_string(),
            ));
        }
        debug!(app_name, ?policy, "updating version lifecycle");
        self.data
            .lock()
            .lifecycles
            .insert(app_name.to_string(), policy.clone());
        Ok(())
    }
}

const DEMO_STATES: [(&str, &str); 6] = [
    ("Ok", "Green"),
    ("Ok", "Green"),
    ("Warning", "Yellow"),
    ("Ok", "Green"),
    ("Severe", "Red"),
    ("Pending", "Grey"),
];

fn demo_instance(index: usize, now: DateTime<Utc>) -> InstanceHealth {
    let (status, color) = DEMO_STATES[index % DEMO_STATES.len()];
    let n = index as u64;
    let request_count = 40 + n * 17;
    let causes = match status {
        "Warning" => vec!["15.2 % of the requests are erroring with HTTP 4xx.".to_string()],
        "Severe" => vec![
            "100.0 % of the requests are failing with HTTP 5xx.".to_string(),
            "ELB health is failing or not available for all instances.".to_string(),
            "Process default has failed health checks.".to_string(),
        ],
        _ => Vec::new(),
    };
    let errors = if status == "Severe" { request_count } else { n };
    InstanceHealth {
        instance_id: format!("i-0{:015x}", 0x5d3c_a1e9_0000 + n * 0x1f3),
        health_status: status.to_string(),
        color: color.to_string(),
        causes,
        launched_at: Some(now - ChronoDuration::minutes(37 + 83 * index as i64)),
        application_metrics: ApplicationMetrics {
            duration: Some(10),
            request_count,
            status_codes: Some(StatusCodes {
                status2xx: request_count - errors,
                status3xx: 0,
                status4xx: if status == "Severe" { 0 } else { errors },
                status5xx: if status == "Severe" { errors } else { 0 },
            }),
            latency: Some(Latency {
                p999: Some(0.412 + index as f64 * 0.01),
                p99: Some(0.187 + index as f64 * 0.02),
                p95: Some(0.064),
                p90: Some(0.041),
                p85: Some(0.033),
                p75: Some(0.021),
                p50: Some(0.008 + index as f64 * 0.001),
                p10: Some(0.002),
            }),
        },
        system: SystemMetrics {
            cpu_utilization: Some(CpuUtilization {
                user: Some(3.1 + index as f64 * 7.4),
                nice: Some(0.0),
                system: Some(1.2),
                idle: Some(94.1 - index as f64 * 7.4),
                io_wait: Some(0.2),
                irq: Some(0.0),
                soft_irq: Some(0.1),
            }),
            load_average: vec![0.12 * (n + 1) as f64, 0.08 * (n + 1) as f64, 0.05],
        },
        deployment: Some(Deployment {
            version_label: Some("app-v1.23".to_string()),
            deployment_id: Some(23),
            status: Some("Deployed".to_string()),
            deployment_time: Some(now - ChronoDuration::hours(5)),
        }),
        availability_zone: Some(format!("us-east-1{}", ['a', 'b', 'c'][index % 3])),
        instance_type: Some(if index % 2 == 0 { "t3.small" } else { "m5.large" }.to_string()),
    }
}

fn demo_data(app_name: &str, env_name: &str, now: DateTime<Utc>) -> FixtureData {
    let instances: Vec<InstanceHealth> = (0..DEMO_STATES.len()).map(|i| demo_instance(i, now)).collect();
    let mut counts = InstanceCounts::default();
    for instance in &instances {
        match instance.health_status.as_str() {
            "Ok" => counts.ok += 1,
            "Warning" => counts.warning += 1,
            "Severe" => counts.severe += 1,
            "Pending" => counts.pending += 1,
            _ => counts.unknown += 1,
        }
    }
    let request_count: u64 = instances
        .iter()
        .map(|i| i.application_metrics.request_count)
        .sum();
    let health = EnvironmentHealth {
        environment_name: env_name.to_string(),
        health_status: "Degraded".to_string(),
        status: "Ready".to_string(),
        color: "Red".to_string(),
        causes: vec![
            "Impaired services on 1 out of 6 instances.".to_string(),
            "Warning on 1 out of 6 instances.".to_string(),
        ],
        application_metrics: ApplicationMetrics {
            duration: Some(10),
            request_count,
            status_codes: Some(StatusCodes {
                status2xx: request_count - 120,
                status3xx: 0,
                status4xx: 17,
                status5xx: 103,
            }),
            latency: Some(Latency {
                p999: Some(0.53),
                p99: Some(0.24),
                p95: Some(0.071),
                p90: Some(0.044),
                p85: Some(0.035),
                p75: Some(0.022),
                p50: Some(0.009),
                p10: Some(0.002),
            }),
        },
        instances_health: counts,
        refreshed_at: None,
        response_date: None,
    };
    let current_version = "app-v1.23".to_string();
    let summary = EnvironmentSummary {
        environment_name: env_name.to_string(),
        environment_id: "e-7yq2mhx3pk".to_string(),
        application_name: app_name.to_string(),
        status: "Ready".to_string(),
        health: "Red".to_string(),
        tier: "WebServer".to_string(),
        platform_arn: Some(
            "arn:aws:elasticbeanstalk:us-east-1::platform/Python 3.8 running on 64bit Amazon Linux 2/3.3.0"
                .to_string(),
        ),
        solution_stack_name: None,
        version_label: Some(current_version),
    };
    let resources = EnvironmentResources {
        instance_ids: instances.iter().map(|i| i.instance_id.clone()).collect(),
        load_balancers: vec![format!("awseb-{}-lb", env_name)],
    };

    let basic_name = format!("{}-basic", env_name);
    let basic_ids = vec!["i-0a1b2c3d4e5f60001".to_string(), "i-0a1b2c3d4e5f60002".to_string()];
    let basic = FixtureEnvironment {
        summary: EnvironmentSummary {
            environment_name: basic_name.clone(),
            environment_id: "e-3hd8s0vq2n".to_string(),
            application_name: app_name.to_string(),
            status: "Ready".to_string(),
            health: "Green".to_string(),
            tier: "WebServer".to_string(),
            platform_arn: None,
            solution_stack_name: Some("64bit Amazon Linux 2 v3.3.0 running Python 3.8".to_string()),
            version_label: Some("app-v1.21".to_string()),
        },
        health: None,
        instances: Vec::new(),
        resources: EnvironmentResources {
            instance_ids: basic_ids.clone(),
            load_balancers: vec![format!("awseb-{}-lb", basic_name)],
        },
        load_balancer_states: vec![LoadBalancerInstanceState {
            instance_id: basic_ids[0].clone(),
            state: "InService".to_string(),
            description: "N/A".to_string(),
        }],
        instance_states: BTreeMap::new(),
    };

    let versions: Vec<AppVersion> = (1..=23u32)
        .rev()
        .map(|n| AppVersion {
            version_label: format!("app-v1.{}", n),
            description: Some(if n % 4 == 0 {
                format!(
                    "Release 1.{}: dependency upgrades, request tracing for the checkout and billing services, and a reworked retry policy for queue consumers",
                    n
                )
            } else {
                format!("Release 1.{}", n)
            }),
            date_created: Some(now - ChronoDuration::hours(i64::from(24 - n) * 19)),
            status: Some("PROCESSED".to_string()),
        })
        .collect();

    let terminated = (1..=12u32)
        .map(|n| TerminatedEnvironment {
            environment_id: format!("e-old{:06}", n * 7919),
            environment_name: format!("{}-canary-{}", env_name, n),
            application_name: app_name.to_string(),
            description: Some(format!("Canary environment {}", n)),
            cname: Some(format!("{}-canary-{}.us-east-1.example.com", env_name, n)),
            version_label: Some(format!("app-v1.{}", 23 - n)),
            solution_stack_name: Some("64bit Amazon Linux 2 v3.3.0 running Python 3.8".to_string()),
            date_updated: Some(now - ChronoDuration::days(i64::from(n) * 2)),
        })
        .collect();

    let mut app_versions = BTreeMap::new();
    app_versions.insert(app_name.to_string(), versions);
    FixtureData {
        environments: vec![
            FixtureEnvironment {
                summary,
                health: Some(health),
                instances,
                resources,
                load_balancer_states: Vec::new(),
                instance_states: BTreeMap::new(),
            },
            basic,
        ],
        app_versions,
        terminated_environments: terminated,
        lifecycles: BTreeMap::new(),
        instance_page_size: Some(4),
        live_clock: true,
    }
}
