//! Provider abstraction for snapshot data sources.
//!
//! The screen pulls data through [`SnapshotProvider`] without knowing
//! whether it comes from a background health poller ([`LiveProvider`]) or
//! from a memoized list of pages ([`PagedProvider`]).

pub mod health;
mod live;
pub mod mailbox;
mod paged;

pub use health::{BasicHealth, EnhancedHealth, HealthSource};
pub use live::{DEFAULT_SLEEP, LiveProvider, sleep_interval};
pub use mailbox::Mailbox;
pub use paged::{PAGE_LENGTH, PageKind, PagedProvider, nth_newest};

use std::time::Duration;

use crate::snapshot::Snapshot;

/// Source of snapshots for a dashboard.
///
/// The trait is object-safe and designed to be used with
/// `Box<dyn SnapshotProvider>`.
pub trait SnapshotProvider {
    /// Returns the freshest snapshot.
    ///
    /// May block on the very first call only. An empty snapshot means there
    /// is nothing left to show.
    fn get_fresh_data(&mut self) -> Snapshot;

    /// Waits up to `timeout` for the first snapshot. Once this returns
    /// `true`, `get_fresh_data` does not block.
    fn wait_ready(&mut self, _timeout: Duration) -> bool {
        true
    }

    /// Moves to the next page. Providers without pages return `None`.
    fn next_page(&mut self) -> Option<Snapshot> {
        None
    }

    /// Moves to the previous page. Providers without pages return `None`.
    fn previous_page(&mut self) -> Option<Snapshot> {
        None
    }

    /// Returns `true` if data refreshes on its own.
    fn is_live(&self) -> bool;
}
