//! Remote control-plane API seam.
//!
//! The dashboards never talk to the network directly; everything goes
//! through [`RemoteSource`]. [`FixtureRemote`] is the in-memory
//! implementation used by the binary and by tests.

pub mod fixture;
pub mod model;

pub use crate::error::RemoteError;
pub use fixture::{FixtureData, FixtureEnvironment, FixtureRemote};
pub use model::*;

/// Operations the dashboards consume.
///
/// Implementations must be shareable with the health poller thread.
pub trait RemoteSource: Send + Sync {
    /// Aggregate health of an environment.
    ///
    /// Fails with [`RemoteError::HealthUnsupported`] when enhanced health is
    /// not enabled, and [`RemoteError::InvalidParameter`] when the
    /// environment does not exist.
    fn get_environment_health(&self, env_name: &str) -> Result<EnvironmentHealth, RemoteError>;

    /// One page of per-instance health; pass the previous page's token to
    /// continue.
    fn get_instance_health(
        &self,
        env_name: &str,
        next_token: Option<&str>,
    ) -> Result<InstanceHealthPage, RemoteError>;

    fn get_environment(&self, app_name: &str, env_name: &str)
    -> Result<EnvironmentSummary, RemoteError>;

    fn get_environment_resources(&self, env_name: &str) -> Result<EnvironmentResources, RemoteError>;

    fn get_load_balancer_health(
        &self,
        load_balancer: &str,
    ) -> Result<Vec<LoadBalancerInstanceState>, RemoteError>;

    /// EC2 state name of an instance (`running`, `stopped`, ...).
    fn get_instance_state(&self, instance_id: &str) -> Result<String, RemoteError>;

    /// All versions of an application, newest first.
    fn get_application_versions(&self, app_name: &str) -> Result<Vec<AppVersion>, RemoteError>;

    /// Recently terminated environments, newest first.
    fn get_terminated_environments(
        &self,
        app_name: Option<&str>,
    ) -> Result<Vec<TerminatedEnvironment>, RemoteError>;

    fn restore(&self, env_id: &str) -> Result<(), RemoteError>;

    fn delete_version(&self, app_name: &str, version_label: &str) -> Result<(), RemoteError>;

    fn reboot_instance(&self, instance_id: &str) -> Result<(), RemoteError>;

    fn terminate_instance(&self, instance_id: &str) -> Result<(), RemoteError>;

    fn get_version_lifecycle(&self, app_name: &str) -> Result<VersionLifecycle, RemoteError>;

    /// Replaces the version lifecycle policy of the application.
    fn update_version_lifecycle(
        &self,
        app_name: &str,
        policy: &VersionLifecycle,
    ) -> Result<(), RemoteError>;
}
