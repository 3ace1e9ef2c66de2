//! Error types for the remote boundary, the prompt boundary, and dashboard
//! setup/teardown.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`crate::remote::RemoteSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service rejected the request.
    #[error("{0}")]
    Service(String),
    /// The request was malformed or not allowed in the current state.
    #[error("{0}")]
    Validation(String),
    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Enhanced health reporting is unavailable, usually while the
    /// environment switches monitoring type.
    #[error("enhanced health reporting is not available for this environment")]
    HealthUnsupported,
    /// A request parameter named something that no longer exists.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Errors the health poller swallows and retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::HealthUnsupported)
    }
}

/// Failures raised by an action callback at the prompt boundary.
///
/// Everything is rendered as a transient message; [`ActionError::Other`] is
/// the sentinel for anything not otherwise recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("'{input}' is not a valid number")]
    InvalidNumber { input: String },
    #[error("{value} is out of range")]
    OutOfRange { value: i64, max: usize },
    /// The operator answered "no" at a confirmation step, or the input
    /// changed nothing.
    #[error("{0}")]
    Declined(String),
    #[error("{0}")]
    Other(String),
}

pub const GENERIC_FAILURE: &str =
    "Something strange happened and the request could not be completed.";

impl ActionError {
    /// Text shown in the message row.
    ///
    /// Number problems render like validation errors and carry the valid
    /// range when one is known.
    pub fn user_message(&self, valid_max: Option<usize>) -> String {
        match self {
            ActionError::Service(msg)
            | ActionError::Validation(msg)
            | ActionError::NotFound(msg)
            | ActionError::Declined(msg) => msg.clone(),
            ActionError::InvalidNumber { .. } => range_hint(valid_max)
                .unwrap_or_else(|| "Enter a valid number.".to_string()),
            ActionError::OutOfRange { max, .. } => range_hint(valid_max.or(Some(*max)))
                .unwrap_or_else(|| "Enter a valid number.".to_string()),
            ActionError::Other(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

fn range_hint(max: Option<usize>) -> Option<String> {
    max.filter(|m| *m > 0)
        .map(|m| format!("Enter a number between 1 and {}.", m))
}

impl From<RemoteError> for ActionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Service(msg) => ActionError::Service(msg),
            RemoteError::Validation(msg) | RemoteError::InvalidParameter(msg) => {
                ActionError::Validation(msg)
            }
            RemoteError::NotFound(msg) => ActionError::NotFound(msg),
            other @ (RemoteError::HealthUnsupported | RemoteError::Transport(_)) => {
                ActionError::Other(other.to_string())
            }
        }
    }
}

/// Failures while setting up or tearing down a dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("terminal I/O failed: {0}")]
    Terminal(#[from] io::Error),
    #[error("failed to access {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("failed to start health poller: {0}")]
    Poller(#[source] io::Error),
    #[error("{0}")]
    Unsupported(String),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_map_to_action_errors() {
        let err: ActionError = RemoteError::NotFound("gone".into()).into();
        assert_eq!(err, ActionError::NotFound("gone".into()));
        let err: ActionError = RemoteError::Transport("reset".into()).into();
        assert!(matches!(err, ActionError::Other(_)));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ActionError::Other("boom".into()).user_message(None),
            GENERIC_FAILURE
        );
        assert_eq!(
            ActionError::InvalidNumber { input: "abc".into() }.user_message(Some(12)),
            "Enter a number between 1 and 12."
        );
        assert_eq!(
            ActionError::OutOfRange { value: 40, max: 23 }.user_message(None),
            "Enter a number between 1 and 23."
        );
        assert_eq!(
            ActionError::Validation("version is deployed".into()).user_message(Some(3)),
            "version is deployed"
        );
    }

    #[test]
    fn test_only_health_unsupported_is_transient() {
        assert!(RemoteError::HealthUnsupported.is_transient());
        assert!(!RemoteError::InvalidParameter("env".into()).is_transient());
    }
}
