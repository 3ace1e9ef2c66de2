//! The three dashboards: health, application versions and terminated
//! environments.
//!
//! Each builder fetches what the dashboard needs up front, picks the
//! provider, lays out the tables and registers the action keys. The
//! returned [`Dashboard`] is either run interactively or printed once.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{ActionError, DashboardError, RemoteError, Result};
use crate::provider::{
    BasicHealth, EnhancedHealth, LiveProvider, PageKind, PagedProvider, SnapshotProvider,
    nth_newest,
};
use crate::remote::{AppVersion, RemoteSource, TerminatedEnvironment, VersionLifecycle};
use crate::snapshot::Row;
use crate::tui::{
    Action, ActionKind, App, Banner, Column, DashboardContext, ExitReason, Flavor, Justify,
    Screen, Table, TableKind, Width, parse_item_number,
};
use crate::util::local_time_string;

const RESTORE_HEADER: &str = "Select a terminated environment to restore";

/// Text for the operator once the terminal is restored.
type Notice = Rc<RefCell<Option<String>>>;

/// How a dashboard ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reason: ExitReason,
    /// Set by the action that closed the dashboard.
    pub notice: Option<String>,
}

/// A screen bound to its provider, ready to run.
pub struct Dashboard {
    pub screen: Screen,
    pub provider: Box<dyn SnapshotProvider>,
    notice: Notice,
}

impl Dashboard {
    /// Runs interactively in the real terminal.
    pub fn run(self) -> Result<Outcome> {
        let notice = self.notice;
        let reason = App::new(self.screen, self.provider).run()?;
        let notice = notice.borrow_mut().take();
        Ok(Outcome { reason, notice })
    }

    /// One monochrome frame as text. `None` when there is no data.
    pub fn print_once(self, width: usize, height: usize) -> Option<String> {
        App::new(self.screen, self.provider).print_once(width, height)
    }
}

/// Options of the health dashboard.
#[derive(Debug, Clone)]
pub struct HealthOptions {
    pub mono: bool,
    /// Table group to start on.
    pub view: Option<String>,
    /// `false` draws a single frame.
    pub refresh: bool,
    /// Use basic health even when enhanced health is available.
    pub force_basic: bool,
}

impl Default for HealthOptions {
    fn default() -> Self {
        Self {
            mono: false,
            view: None,
            refresh: true,
            force_basic: false,
        }
    }
}

/// Live health of one environment.
///
/// Falls back to basic health when enhanced health reporting is not
/// enabled for the environment.
pub fn health_dashboard(
    remote: Arc<dyn RemoteSource>,
    app_name: &str,
    env_name: &str,
    options: &HealthOptions,
    state_dir: impl Into<PathBuf>,
) -> Result<Dashboard> {
    let summary = remote.get_environment(app_name, env_name)?;
    let enhanced = !options.force_basic && supports_enhanced_health(remote.as_ref(), env_name)?;
    let flavor = if enhanced {
        Flavor::EnhancedHealth
    } else {
        Flavor::BasicHealth
    };
    let group = match options.view.as_deref() {
        Some(view) => flavor.group_named(view).ok_or_else(|| {
            DashboardError::Unsupported(format!(
                "view '{}' is not available; choose one of: {}",
                view,
                flavor.groups().join(", ")
            ))
        })?,
        None => "split",
    };
    info!(app_name, env_name, ?flavor, group, "opening health dashboard");

    let provider = if enhanced {
        LiveProvider::start(EnhancedHealth::new(Arc::clone(&remote), env_name))
    } else {
        LiveProvider::start(BasicHealth::new(Arc::clone(&remote), app_name, env_name))
    }
    .map_err(DashboardError::Poller)?;

    let (tables, banner) = if enhanced {
        let banner = Banner::Health {
            tier: summary.tier.clone(),
            platform: summary.platform_label(),
        };
        (enhanced_tables(), banner)
    } else {
        (basic_tables(), Banner::BasicHealth)
    };

    let notice = Notice::default();
    let mut context = DashboardContext::new(flavor, state_dir);
    context.actions.register(replace_action(Arc::clone(&remote), Rc::clone(&notice)));
    context.actions.register(reboot_action(remote, Rc::clone(&notice)));

    let screen = Screen::new(context, tables, banner)
        .with_mono(options.mono)
        .with_refresh(options.refresh)
        .with_group(group);
    Ok(Dashboard {
        screen,
        provider: Box::new(provider),
        notice,
    })
}

fn supports_enhanced_health(remote: &dyn RemoteSource, env_name: &str) -> Result<bool> {
    match remote.get_environment_health(env_name) {
        Ok(_) => Ok(true),
        Err(RemoteError::HealthUnsupported) => {
            debug!(env_name, "enhanced health not enabled");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn enhanced_tables() -> Vec<Table> {
    let fixed = Width::Fixed;
    vec![
        Table::with_kind(
            "status",
            TableKind::Status,
            vec![
                Column::left("instance-id", Width::Auto, "InstanceId"),
                Column::left("az", fixed(18), "AvailabilityZone"),
                Column::left("type", fixed(10), "InstanceType"),
                Column::left("id", fixed(4), "DeploymentId"),
                Column::left("status", fixed(10), "HealthStatus").sorted_by("status_sort"),
                Column::new("cause", fixed(60), "Cause", Justify::None),
            ],
        ),
        Table::with_kind(
            "requests",
            TableKind::Request,
            vec![
                Column::left("instance-id", Width::Auto, "InstanceId"),
                Column::left("r/sec", fixed(6), "requests"),
                Column::right("%2xx", fixed(6), "Status2xx").sorted_by("Status2xx_sort"),
                Column::right("%3xx", fixed(6), "Status3xx").sorted_by("Status3xx_sort"),
                Column::right("%4xx", fixed(6), "Status4xx").sorted_by("Status4xx_sort"),
                Column::right("%5xx", fixed(6), "Status5xx").sorted_by("Status5xx_sort"),
                Column::right("p99 ", fixed(9), "P99").sorted_by("P99_sort"),
                Column::right("p90 ", fixed(8), "P90").sorted_by("P90_sort"),
                Column::right("p75", fixed(7), "P75").sorted_by("P75_sort"),
                Column::right("p50", fixed(7), "P50").sorted_by("P50_sort"),
                Column::right("p10", fixed(7), "P10").sorted_by("P10_sort"),
            ],
        ),
        Table::new(
            "cpu",
            vec![
                Column::left("instance-id", Width::Auto, "InstanceId"),
                Column::left("running", fixed(10), "running").sorted_by("LaunchedAt"),
                Column::right("load 1", fixed(7), "load1"),
                Column::right("load 5", fixed(7), "load5"),
                Column::right("user%", fixed(10), "User"),
                Column::right("nice%", fixed(6), "Nice"),
                Column::right("system%", fixed(8), "System"),
                Column::right("idle%", fixed(6), "Idle"),
                Column::right("iowait%", fixed(9), "IOWait"),
            ],
        ),
        Table::new(
            "deployments",
            vec![
                Column::left("instance-id", Width::Auto, "InstanceId"),
                Column::left("id", Width::Auto, "DeploymentId"),
                Column::left("status", Width::Auto, "DeploymentStatus"),
                Column::left("ago", Width::Auto, "TimeSinceDeployment"),
                Column::left("version", Width::Auto, "DeploymentVersion"),
                Column::left("az", Width::Auto, "AvailabilityZone"),
                Column::left("type", Width::Auto, "InstanceType"),
            ],
        ),
    ]
}

fn basic_tables() -> Vec<Table> {
    vec![Table::new(
        "health",
        vec![
            Column::left("instance-id", Width::Fixed(19), "InstanceId"),
            Column::left("EC2 Health", Width::Fixed(15), "health"),
            Column::left("ELB State", Width::Fixed(15), "state"),
            Column::new("ELB description", Width::Fixed(40), "description", Justify::None),
        ],
    )]
}

fn replace_action(remote: Arc<dyn RemoteSource>, notice: Notice) -> Action {
    Action::new(ActionKind::Replace, "instance-ID to replace:", move |input| {
        let instance_id = input.trim();
        remote.terminate_instance(instance_id)?;
        *notice.borrow_mut() = Some(format!("Replacing instance {}.", instance_id));
        Ok(None)
    })
}

fn reboot_action(remote: Arc<dyn RemoteSource>, notice: Notice) -> Action {
    Action::new(ActionKind::Reboot, "instance-ID to reboot:", move |input| {
        let instance_id = input.trim();
        remote.reboot_instance(instance_id)?;
        *notice.borrow_mut() = Some(format!("Rebooting instance {}.", instance_id));
        Ok(None)
    })
}

/// Version history of an application, optionally against the environment
/// it is deployed to.
pub fn versions_dashboard(
    remote: Arc<dyn RemoteSource>,
    app_name: &str,
    env_name: Option<&str>,
    state_dir: impl Into<PathBuf>,
) -> Result<Dashboard> {
    let versions = remote.get_application_versions(app_name)?;
    if versions.is_empty() {
        return Err(RemoteError::NotFound(format!(
            "Application {} has no application versions.",
            app_name
        ))
        .into());
    }

    let mut environment = Row::new();
    environment.set("ApplicationName", app_name);
    if let Some(env_name) = env_name {
        let summary = remote.get_environment(app_name, env_name)?;
        environment.set("EnvironmentName", summary.environment_name.as_str());
        environment.set("Color", summary.health.as_str());
        environment.set("Status", summary.status.as_str());
        environment.set(
            "CurrDeployNum",
            current_deploy_number(&versions, summary.version_label.as_deref()),
        );
    }
    info!(app_name, versions = versions.len(), "opening versions dashboard");

    let rows = versions.iter().map(Row::from).collect();
    let provider = PagedProvider::new(PageKind::AppVersions, environment, rows)?;

    let notice = Notice::default();
    let mut context = DashboardContext::new(Flavor::Versions, state_dir);
    context.actions.register(delete_action(
        Arc::clone(&remote),
        app_name,
        Rc::new(versions),
        Rc::clone(&notice),
    ));
    context.actions.register(lifecycle_action(remote, app_name));

    let table = Table::new(
        "app_versions",
        vec![
            Column::left("#", Width::Auto, "DeployNum"),
            Column::left("Version Label", Width::Auto, "VersionLabel"),
            Column::left("Date Created", Width::Auto, "DateCreated"),
            Column::left("Age", Width::Auto, "SinceCreated"),
            Column::left("Description", Width::Auto, "Description"),
        ],
    );
    let banner = Banner::Versions {
        app_name: app_name.to_string(),
        env_name: env_name.map(str::to_string),
    };
    Ok(Dashboard {
        screen: Screen::new(context, vec![table], banner),
        provider: Box::new(provider),
        notice,
    })
}

/// Displayed `#` of the deployed version, or 0 when it is not in the list.
pub fn current_deploy_number(versions: &[AppVersion], deployed: Option<&str>) -> usize {
    deployed
        .and_then(|label| versions.iter().position(|v| v.version_label == label))
        .map_or(0, |index| versions.len() - index)
}

fn version_by_number<'a>(versions: &'a [AppVersion], input: &str) -> Result<&'a AppVersion, ActionError> {
    let number = parse_item_number(input, versions.len())?;
    nth_newest(versions, number).ok_or(ActionError::OutOfRange {
        value: number as i64,
        max: versions.len(),
    })
}

fn delete_action(
    remote: Arc<dyn RemoteSource>,
    app_name: &str,
    versions: Rc<Vec<AppVersion>>,
    notice: Notice,
) -> Action {
    let count = versions.len();
    let app_name = app_name.to_string();
    let question = {
        let versions = Rc::clone(&versions);
        move |input: &str| -> Result<String, ActionError> {
            let version = version_by_number(&versions, input)?;
            Ok(format!(
                "Do you want to delete the application version with label: {}?",
                version.version_label
            ))
        }
    };
    Action::new(
        ActionKind::Delete,
        format!("Select a version # to delete (1 to {}).", count),
        move |input| {
            let label = &version_by_number(&versions, input)?.version_label;
            remote.delete_version(&app_name, label)?;
            *notice.borrow_mut() = Some("Application Version deleted successfully.".to_string());
            Ok(Some(true))
        },
    )
    .with_confirm(question, Some("Application Version will not be deleted."))
    .with_valid_max(count)
}

/// A rule limit; `none` disables the rule.
fn parse_limit(input: &str) -> Result<Option<u32>, ActionError> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    input
        .parse::<u32>()
        .map(Some)
        .map_err(|_| ActionError::InvalidNumber {
            input: input.to_string(),
        })
}

fn parse_switch(input: &str) -> Result<bool, ActionError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        other => Err(ActionError::Validation(format!(
            "delete-source takes yes or no, not '{}'.",
            other
        ))),
    }
}

/// Applies `count=N|none age=DAYS|none delete-source=yes|no` settings to
/// `current`. Settings not named keep their value; a bare limit sets the
/// count.
fn edit_lifecycle(current: &VersionLifecycle, input: &str) -> Result<VersionLifecycle, ActionError> {
    let mut policy = current.clone();
    for token in input.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            policy.max_count = parse_limit(token)?;
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "count" => policy.max_count = parse_limit(value)?,
            "age" => policy.max_age_in_days = parse_limit(value)?,
            "delete-source" => policy.delete_source_from_s3 = parse_switch(value)?,
            _ => {
                return Err(ActionError::Validation(format!(
                    "Unknown lifecycle setting '{}'. Use count=, age= or delete-source=.",
                    key
                )));
            }
        }
    }
    Ok(policy)
}

fn lifecycle_action(remote: Arc<dyn RemoteSource>, app_name: &str) -> Action {
    let app_name = app_name.to_string();
    Action::new(
        ActionKind::Lifecycle,
        "Lifecycle (count=N|none age=DAYS|none delete-source=yes|no):",
        move |input| {
            let current = remote.get_version_lifecycle(&app_name)?;
            let requested = edit_lifecycle(&current, input)?;
            if requested == current {
                return Err(ActionError::Declined("No changes made.".to_string()));
            }
            remote.update_version_lifecycle(&app_name, &requested)?;
            Ok(Some(false))
        },
    )
    .with_success_message("Successfully updated application version lifecycle policy")
}

/// Recently terminated environments, restorable by number.
pub fn restore_dashboard(
    remote: Arc<dyn RemoteSource>,
    app_name: Option<&str>,
    state_dir: impl Into<PathBuf>,
) -> Result<Dashboard> {
    let environments = remote.get_terminated_environments(app_name)?;
    let mut environment = Row::new();
    if let Some(app_name) = app_name {
        environment.set("ApplicationName", app_name);
    }
    let rows = environments.iter().map(Row::from).collect();
    let provider = PagedProvider::new(PageKind::TerminatedEnvironments, environment, rows)?;
    info!(?app_name, environments = environments.len(), "opening restore dashboard");

    let notice = Notice::default();
    let mut context = DashboardContext::new(Flavor::Environments, state_dir);
    context
        .actions
        .register(restore_action(remote, Rc::new(environments), Rc::clone(&notice)));

    let table = Table::new(
        "environments",
        vec![
            Column::left("#", Width::Auto, "DeployNum"),
            Column::left("Name", Width::Auto, "EnvironmentName"),
            Column::left("ID", Width::Auto, "EnvironmentId"),
            Column::left("Application Version", Width::Auto, "VersionLabel"),
            Column::left("Date Terminated", Width::Auto, "DateUpdated"),
            Column::left("Ago", Width::Auto, "SinceCreated"),
        ],
    );
    let banner = Banner::Environments {
        header: RESTORE_HEADER.to_string(),
    };
    Ok(Dashboard {
        screen: Screen::new(context, vec![table], banner),
        provider: Box::new(provider),
        notice,
    })
}

fn environment_by_number<'a>(
    environments: &'a [TerminatedEnvironment],
    input: &str,
) -> Result<&'a TerminatedEnvironment, ActionError> {
    let number = parse_item_number(input, environments.len())?;
    nth_newest(environments, number).ok_or(ActionError::OutOfRange {
        value: number as i64,
        max: environments.len(),
    })
}

fn restore_question(env: &TerminatedEnvironment) -> String {
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    format!(
        "Selected environment {} ({}, version {}, terminated {}). Restore this environment?",
        env.environment_id,
        env.environment_name,
        or_dash(&env.version_label),
        env.date_updated.map_or_else(|| "-".to_string(), local_time_string),
    )
}

fn restore_action(
    remote: Arc<dyn RemoteSource>,
    environments: Rc<Vec<TerminatedEnvironment>>,
    notice: Notice,
) -> Action {
    let count = environments.len();
    let question = {
        let environments = Rc::clone(&environments);
        move |input: &str| environment_by_number(&environments, input).map(restore_question)
    };
    Action::new(
        ActionKind::Restore,
        "Enter a environment # to restore. ESC to exit.",
        move |input| {
            let env_id = &environment_by_number(&environments, input)?.environment_id;
            remote.restore(env_id)?;
            *notice.borrow_mut() = Some(format!("Restoring {}.", env_id));
            Ok(Some(true))
        },
    )
    .with_confirm(question, Some("Environment will not be restored"))
    .with_valid_max(count)
}
