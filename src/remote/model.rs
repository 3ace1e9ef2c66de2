//! Wire models returned by the remote control-plane API.
//!
//! Field names follow the service's PascalCase JSON so fixtures can be
//! captured straight from real responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Row;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StatusCodes {
    pub status2xx: u64,
    pub status3xx: u64,
    pub status4xx: u64,
    pub status5xx: u64,
}

impl StatusCodes {
    pub fn entries(&self) -> [(&'static str, u64); 4] {
        [
            ("Status2xx", self.status2xx),
            ("Status3xx", self.status3xx),
            ("Status4xx", self.status4xx),
            ("Status5xx", self.status5xx),
        ]
    }
}

/// Latency percentiles in seconds. Absent when no requests were sampled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Latency {
    pub p999: Option<f64>,
    pub p99: Option<f64>,
    pub p95: Option<f64>,
    pub p90: Option<f64>,
    pub p85: Option<f64>,
    pub p75: Option<f64>,
    pub p50: Option<f64>,
    pub p10: Option<f64>,
}

impl Latency {
    pub fn entries(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("P999", self.p999),
            ("P99", self.p99),
            ("P95", self.p95),
            ("P90", self.p90),
            ("P85", self.p85),
            ("P75", self.p75),
            ("P50", self.p50),
            ("P10", self.p10),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApplicationMetrics {
    /// Sample window in seconds.
    pub duration: Option<u64>,
    pub request_count: u64,
    pub status_codes: Option<StatusCodes>,
    pub latency: Option<Latency>,
}

/// Instance counts per health status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceCounts {
    pub no_data: u64,
    pub unknown: u64,
    pub pending: u64,
    pub ok: u64,
    pub info: u64,
    pub warning: u64,
    pub degraded: u64,
    pub severe: u64,
}

impl InstanceCounts {
    pub fn entries(&self) -> [(&'static str, u64); 8] {
        [
            ("NoData", self.no_data),
            ("Unknown", self.unknown),
            ("Pending", self.pending),
            ("Ok", self.ok),
            ("Info", self.info),
            ("Warning", self.warning),
            ("Degraded", self.degraded),
            ("Severe", self.severe),
        ]
    }

    pub fn total(&self) -> u64 {
        self.entries().iter().map(|(_, v)| v).sum()
    }
}

/// Response of `get_environment_health`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentHealth {
    pub environment_name: String,
    pub health_status: String,
    pub status: String,
    pub color: String,
    pub causes: Vec<String>,
    pub application_metrics: ApplicationMetrics,
    pub instances_health: InstanceCounts,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Server clock at response time, used to correct for local drift.
    pub response_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CpuUtilization {
    pub user: Option<f64>,
    pub nice: Option<f64>,
    pub system: Option<f64>,
    pub idle: Option<f64>,
    #[serde(rename = "IOWait")]
    pub io_wait: Option<f64>,
    #[serde(rename = "IRQ")]
    pub irq: Option<f64>,
    #[serde(rename = "SoftIRQ")]
    pub soft_irq: Option<f64>,
}

impl CpuUtilization {
    pub fn entries(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("User", self.user),
            ("Nice", self.nice),
            ("System", self.system),
            ("Idle", self.idle),
            ("IOWait", self.io_wait),
            ("IRQ", self.irq),
            ("SoftIRQ", self.soft_irq),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemMetrics {
    #[serde(rename = "CPUUtilization")]
    pub cpu_utilization: Option<CpuUtilization>,
    pub load_average: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Deployment {
    pub version_label: Option<String>,
    pub deployment_id: Option<u64>,
    pub status: Option<String>,
    pub deployment_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceHealth {
    pub instance_id: String,
    pub health_status: String,
    pub color: String,
    pub causes: Vec<String>,
    pub launched_at: Option<DateTime<Utc>>,
    pub application_metrics: ApplicationMetrics,
    pub system: SystemMetrics,
    pub deployment: Option<Deployment>,
    pub availability_zone: Option<String>,
    pub instance_type: Option<String>,
}

/// One page of `get_instance_health`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceHealthPage {
    pub instance_health_list: Vec<InstanceHealth>,
    pub next_token: Option<String>,
}

/// Response of `get_environment`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentSummary {
    pub environment_name: String,
    pub environment_id: String,
    pub application_name: String,
    pub status: String,
    /// Traffic-light color: Green, Yellow, Red or Grey.
    pub health: String,
    pub tier: String,
    pub platform_arn: Option<String>,
    pub solution_stack_name: Option<String>,
    pub version_label: Option<String>,
}

impl EnvironmentSummary {
    /// Platform label shown in the banner: `name/version` from the platform
    /// ARN, else the solution stack name.
    pub fn platform_label(&self) -> String {
        if let Some(arn) = &self.platform_arn
            && let Some((_, tail)) = arn.split_once("platform/")
        {
            return match tail.rsplit_once('/') {
                Some((name, version)) => format!("{}/{}", name, version),
                None => tail.to_string(),
            };
        }
        self.solution_stack_name.clone().unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EnvironmentResources {
    pub instance_ids: Vec<String>,
    pub load_balancers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoadBalancerInstanceState {
    pub instance_id: String,
    pub state: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppVersion {
    pub version_label: String,
    pub description: Option<String>,
    pub date_created: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl From<&AppVersion> for Row {
    fn from(version: &AppVersion) -> Self {
        let mut row = Row::new();
        row.set("VersionLabel", version.version_label.as_str());
        row.set_opt("Description", version.description.clone());
        row.set_opt("DateCreated", version.date_created);
        row.set_opt("Status", version.status.clone());
        row
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TerminatedEnvironment {
    pub environment_id: String,
    pub environment_name: String,
    pub application_name: String,
    pub description: Option<String>,
    #[serde(rename = "CNAME")]
    pub cname: Option<String>,
    pub version_label: Option<String>,
    pub solution_stack_name: Option<String>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl From<&TerminatedEnvironment> for Row {
    fn from(env: &TerminatedEnvironment) -> Self {
        let mut row = Row::new();
        row.set("EnvironmentId", env.environment_id.as_str());
        row.set("EnvironmentName", env.environment_name.as_str());
        row.set("ApplicationName", env.application_name.as_str());
        row.set_opt("Description", env.description.clone());
        row.set_opt("CNAME", env.cname.clone());
        row.set_opt("VersionLabel", env.version_label.clone());
        row.set_opt("SolutionStackName", env.solution_stack_name.clone());
        row.set_opt("DateUpdated", env.date_updated);
        row
    }
}

/// Application version lifecycle policy. A rule set to `None` is disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VersionLifecycle {
    pub max_count: Option<u32>,
    pub max_age_in_days: Option<u32>,
    /// Source bundles are deleted along with the versions a rule removes.
    pub delete_source_from_s3: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_health_from_service_json() {
        let json = r#"{
            "InstanceId": "i-0abc",
            "HealthStatus": "Ok",
            "Color": "Green",
            "ApplicationMetrics": {
                "Duration": 10,
                "RequestCount": 45,
                "StatusCodes": {"Status2xx": 44, "Status3xx": 0, "Status4xx": 1, "Status5xx": 0},
                "Latency": {"P99": 0.004, "P90": 0.002}
            },
            "System": {
                "CPUUtilization": {"User": 1.5, "IOWait": 0.1},
                "LoadAverage": [0.0, 0.02, 0.05]
            }
        }"#;
        let health: InstanceHealth = serde_json::from_str(json).unwrap();
        assert_eq!(health.application_metrics.request_count, 45);
        let cpu = health.system.cpu_utilization.unwrap();
        assert_eq!(cpu.io_wait, Some(0.1));
        assert_eq!(health.system.load_average.len(), 3);
        assert_eq!(health.application_metrics.latency.unwrap().p999, None);
    }

    #[test]
    fn test_platform_label() {
        let mut summary = EnvironmentSummary {
            platform_arn: Some(
                "arn:aws:elasticbeanstalk:us-east-1::platform/Python 3.8 running on 64bit Amazon Linux 2/3.3.0"
                    .to_string(),
            ),
            ..Default::default()
        };
        assert_eq!(
            summary.platform_label(),
            "Python 3.8 running on 64bit Amazon Linux 2/3.3.0"
        );
        summary.platform_arn = None;
        summary.solution_stack_name = Some("64bit Amazon Linux running Go".to_string());
        assert_eq!(summary.platform_label(), "64bit Amazon Linux running Go");
    }

    #[test]
    fn test_instance_counts_total() {
        let counts = InstanceCounts {
            ok: 3,
            severe: 1,
            no_data: 2,
            ..Default::default()
        };
        assert_eq!(counts.total(), 6);
    }
}
