//! envmon - terminal dashboards for hosted application environments.
//!
//! Three dashboards share one screen engine:
//! - live environment health (enhanced or basic), polled on a background thread
//! - application version history with delete and lifecycle actions
//! - recently terminated environments with a restore action

pub mod dashboard;
pub mod error;
pub mod provider;
pub mod remote;
pub mod snapshot;
pub mod tui;
pub mod util;
