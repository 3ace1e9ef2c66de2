//! Health collectors run by the live poller.
//!
//! Each collector turns the nested remote health documents into a flat
//! [`Snapshot`]: one aggregate environment row plus one row per instance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::RemoteError;
use crate::remote::{
    ApplicationMetrics, EnvironmentHealth, InstanceHealth, Latency, RemoteSource, StatusCodes,
};
use crate::snapshot::{Collection, Row, Snapshot};
use crate::util::{format_float, format_time_since, local_time_string};

/// How long an environment may report zero instances before the poller
/// gives up.
pub const NO_INSTANCES_TIMEOUT: Duration = Duration::from_secs(15 * 60);

const HEALTH_ORDER: [&str; 9] = [
    "Severe", "Degraded", "Unknown", "Warning", "NoData", "No Data", "Info", "Pending", "Ok",
];

/// Produces one snapshot per poll cycle.
pub trait HealthSource: Send + 'static {
    /// Collects a snapshot. An empty snapshot means there is nothing left
    /// to monitor and polling should stop.
    fn collect(&mut self, now: Instant) -> Result<Snapshot, RemoteError>;
}

/// Sort rank of a health status; lower is worse. Unknown strings sort last.
pub fn health_sort_order(status: &str) -> i64 {
    HEALTH_ORDER
        .iter()
        .position(|s| *s == status)
        .unwrap_or(HEALTH_ORDER.len()) as i64
}

/// Adds the latency percentiles as 3-decimal strings with numeric `_sort`
/// shadows. `P99`/`P90` get a `*` when too few requests were sampled.
fn add_latency(row: &mut Row, latency: &Latency, request_count: u64) {
    for (key, value) in latency.entries() {
        let Some(value) = value else { continue };
        row.set(format!("{}_sort", key), value);
        let mut text = format_float(value, 3);
        match key {
            "P99" if request_count < 100 => text.push('*'),
            "P90" if request_count < 10 => text.push('*'),
            "P99" | "P90" => text.push(' '),
            _ => {}
        }
        row.set(key, text);
    }
}

/// Adds status code counts, as percentage strings when any requests were
/// made. `with_sort` also records the numeric percentage under `_sort`.
fn add_status_codes(row: &mut Row, codes: &StatusCodes, request_count: u64, with_sort: bool) {
    for (key, count) in codes.entries() {
        if request_count == 0 {
            row.set(key, count);
            continue;
        }
        let percent = format_float(count as f64 / request_count as f64 * 100.0, 1);
        if with_sort {
            row.set(format!("{}_sort", key), percent.parse::<f64>().unwrap_or(0.0));
        }
        row.set(key, percent);
    }
}

fn add_metrics(row: &mut Row, metrics: &ApplicationMetrics, with_sort: bool) {
    let request_count = metrics.request_count;
    if let Some(latency) = &metrics.latency {
        add_latency(row, latency, request_count);
    }
    if let Some(codes) = &metrics.status_codes {
        add_status_codes(row, codes, request_count, with_sort);
    }
    row.set("RequestCount", request_count);
    row.set_opt("Duration", metrics.duration);
}

fn first_cause(causes: &[String]) -> String {
    causes.first().cloned().unwrap_or_default()
}

/// Flattens the aggregate environment health into the banner/Overall row.
pub fn flatten_environment(health: &EnvironmentHealth) -> Row {
    let mut row = Row::new();
    let metrics = &health.application_metrics;
    add_metrics(&mut row, metrics, false);
    row.set("requests", metrics.request_count as f64 / 10.0);

    let counts = &health.instances_health;
    for (key, count) in counts.entries() {
        row.set(key, count);
    }
    row.set("Total", counts.total());

    row.set("EnvironmentName", health.environment_name.as_str());
    row.set("HealthStatus", health.health_status.as_str());
    row.set("Status", health.status.as_str());
    row.set("Color", health.color.as_str());
    row.set("Causes", health.causes.clone());
    row.set("Cause", first_cause(&health.causes));
    row.set_opt("RefreshedAt", health.refreshed_at);
    row.set("InstanceId", "  Overall");
    row
}

/// Flattens one instance's health into a table row.
pub fn flatten_instance(instance: &InstanceHealth, now: DateTime<Utc>) -> Row {
    let mut row = Row::new();
    let metrics = &instance.application_metrics;
    add_metrics(&mut row, metrics, true);

    if let Some(cpu) = &instance.system.cpu_utilization {
        for (key, value) in cpu.entries() {
            row.set_opt(key, value);
        }
    }
    let load = &instance.system.load_average;
    match load.first() {
        Some(v) => row.set("load1", *v),
        None => row.set("load1", "-"),
    }
    match load.get(1) {
        Some(v) => row.set("load5", *v),
        None => row.set("load5", "-"),
    }

    row.set("InstanceId", instance.instance_id.as_str());
    row.set("HealthStatus", instance.health_status.as_str());
    row.set("Color", instance.color.as_str());
    row.set("Causes", instance.causes.clone());
    row.set("Cause", first_cause(&instance.causes));
    row.set_opt("InstanceType", instance.instance_type.clone());
    if let Some(az) = &instance.availability_zone {
        let short = az.rsplit('-').next().unwrap_or(az);
        row.set("AvailabilityZone", short);
    }

    match instance.launched_at {
        Some(launched) => {
            row.set("LaunchedAt", launched);
            row.set("launched", local_time_string(launched));
            row.set("running", format_time_since(launched, now));
        }
        None => row.set("running", "-"),
    }

    if let Some(deployment) = &instance.deployment {
        row.set_opt("DeploymentId", deployment.deployment_id);
        row.set_opt("DeploymentStatus", deployment.status.clone());
        row.set_opt("DeploymentVersion", deployment.version_label.clone());
        if let Some(at) = deployment.deployment_time {
            row.set("TimeSinceDeployment", format_time_since(at, now));
        }
    }

    let duration = metrics.duration.filter(|d| *d > 0).unwrap_or(10);
    row.set("requests", metrics.request_count as f64 / duration as f64);
    row.set("status_sort", health_sort_order(&instance.health_status));
    row
}

/// Shifts `RefreshedAt` by the difference between the local clock and the
/// server's response date.
pub fn correct_clock_drift(health: &mut EnvironmentHealth, now: DateTime<Utc>) {
    if let (Some(refreshed), Some(response)) = (health.refreshed_at, health.response_date) {
        let drift = now - response;
        debug!(drift_ms = drift.num_milliseconds(), "clock offset");
        health.refreshed_at = Some(refreshed + drift);
    }
}

/// Collector for environments with enhanced health reporting.
pub struct EnhancedHealth {
    remote: Arc<dyn RemoteSource>,
    env_name: String,
    no_instances_since: Option<Instant>,
}

impl EnhancedHealth {
    pub fn new(remote: Arc<dyn RemoteSource>, env_name: impl Into<String>) -> Self {
        Self {
            remote,
            env_name: env_name.into(),
            no_instances_since: None,
        }
    }

    fn fetch_instances(&self) -> Result<Vec<InstanceHealth>, RemoteError> {
        let mut page = self.remote.get_instance_health(&self.env_name, None)?;
        let mut instances = std::mem::take(&mut page.instance_health_list);
        while let Some(token) = page.next_token.take() {
            page = self.remote.get_instance_health(&self.env_name, Some(&token))?;
            instances.append(&mut page.instance_health_list);
        }
        Ok(instances)
    }
}

impl HealthSource for EnhancedHealth {
    fn collect(&mut self, now: Instant) -> Result<Snapshot, RemoteError> {
        let mut health = self.remote.get_environment_health(&self.env_name)?;
        let instances = self.fetch_instances()?;
        let wall_now = Utc::now();
        correct_clock_drift(&mut health, wall_now);

        let environment = flatten_environment(&health);
        if health.instances_health.total() == 0 {
            let since = *self.no_instances_since.get_or_insert(now);
            if now.saturating_duration_since(since) > NO_INSTANCES_TIMEOUT {
                debug!(env = %self.env_name, "no instances for 15 minutes");
                return Ok(Snapshot::empty());
            }
        } else {
            self.no_instances_since = None;
        }

        let rows = instances
            .iter()
            .map(|i| flatten_instance(i, wall_now))
            .collect();
        Ok(Snapshot::new(Collection::Instances, environment, rows))
    }
}

/// Collector for environments without enhanced health, built from load
/// balancer and EC2 instance states.
pub struct BasicHealth {
    remote: Arc<dyn RemoteSource>,
    app_name: String,
    env_name: String,
}

impl BasicHealth {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        app_name: impl Into<String>,
        env_name: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            app_name: app_name.into(),
            env_name: env_name.into(),
        }
    }
}

fn basic_row(instance_id: &str, health: String, state: &str, description: &str) -> Row {
    let mut row = Row::new();
    row.set("InstanceId", instance_id);
    row.set("health", health);
    row.set("state", state);
    row.set("description", description);
    row
}

impl HealthSource for BasicHealth {
    fn collect(&mut self, _now: Instant) -> Result<Snapshot, RemoteError> {
        let refreshed_at = Utc::now();
        let env = self.remote.get_environment(&self.app_name, &self.env_name)?;
        let resources = self.remote.get_environment_resources(&self.env_name)?;
        let lb_states = match resources.load_balancers.first() {
            Some(lb) => self.remote.get_load_balancer_health(lb)?,
            None => Vec::new(),
        };

        let total = resources.instance_ids.len();
        let in_service = lb_states.iter().filter(|s| s.state == "InService").count();
        let mut environment = Row::new();
        environment.set("EnvironmentName", env.environment_name.as_str());
        environment.set("Color", env.health.as_str());
        environment.set("Status", env.status.as_str());
        environment.set("Total", total);
        environment.set("InService", in_service);
        environment.set("Other", total.saturating_sub(in_service));
        environment.set("RefreshedAt", refreshed_at);

        let mut rows = Vec::with_capacity(total);
        for state in &lb_states {
            let health = self.remote.get_instance_state(&state.instance_id)?;
            rows.push(basic_row(&state.instance_id, health, &state.state, &state.description));
        }
        for id in &resources.instance_ids {
            if lb_states.iter().any(|s| &s.instance_id == id) {
                continue;
            }
            let health = self.remote.get_instance_state(id)?;
            rows.push(basic_row(id, health, "n/a", "N/A (Not registered with Load Balancer)"));
        }
        Ok(Snapshot::new(Collection::Instances, environment, rows))
    }
}
