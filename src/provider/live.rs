//! Live provider: a background worker polls health data and hands the
//! freshest snapshot to the screen through a [`Mailbox`].

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::error::RemoteError;
use crate::snapshot::Snapshot;

use super::SnapshotProvider;
use super::health::HealthSource;
use super::mailbox::Mailbox;

/// Sleep used when the data carries no refresh time or health is
/// temporarily unavailable.
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(2);

/// The service refreshes health roughly every 10 seconds; poll one second
/// after the expected refresh.
const REFRESH_PERIOD_SECS: i64 = 11;
const MIN_SLEEP_SECS: f64 = 0.5;
const MAX_SLEEP_SECS: f64 = 11.0;
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Time to wait before the next poll, aligned to the server refresh cadence.
pub fn sleep_interval(refreshed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    let Some(refreshed_at) = refreshed_at else {
        return DEFAULT_SLEEP;
    };
    let elapsed = (now - refreshed_at).num_seconds();
    if elapsed < 0 {
        return Duration::from_secs_f64(MIN_SLEEP_SECS);
    }
    let countdown = (REFRESH_PERIOD_SECS - elapsed) as f64;
    Duration::from_secs_f64(countdown.clamp(MIN_SLEEP_SECS, MAX_SLEEP_SECS))
}

/// Leaves the empty sentinel in the mailbox however the worker exits.
struct SentinelGuard {
    mailbox: Arc<Mailbox<Snapshot>>,
}

impl Drop for SentinelGuard {
    fn drop(&mut self) {
        self.mailbox.send(Snapshot::empty());
    }
}

/// Provider backed by a background polling thread.
pub struct LiveProvider {
    mailbox: Arc<Mailbox<Snapshot>>,
    stop: Arc<AtomicBool>,
    latest: Option<Snapshot>,
    worker: Option<JoinHandle<()>>,
}

impl LiveProvider {
    /// Spawns the worker thread for `source`.
    pub fn start<S: HealthSource>(source: S) -> io::Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let mailbox = Arc::clone(&mailbox);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("health-poller".to_string())
                .spawn(move || {
                    let _guard = SentinelGuard {
                        mailbox: Arc::clone(&mailbox),
                    };
                    poll_loop(source, &mailbox, &stop);
                })?
        };
        Ok(Self {
            mailbox,
            stop,
            latest: None,
            worker: Some(worker),
        })
    }

    /// Provider fed by an externally owned mailbox, without a worker.
    pub fn from_mailbox(mailbox: Arc<Mailbox<Snapshot>>) -> Self {
        Self {
            mailbox,
            stop: Arc::new(AtomicBool::new(false)),
            latest: None,
            worker: None,
        }
    }
}

impl Drop for LiveProvider {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The worker may be blocked inside a remote call; it is not joined.
        drop(self.worker.take());
    }
}

impl SnapshotProvider for LiveProvider {
    fn get_fresh_data(&mut self) -> Snapshot {
        if let Some(snapshot) = self.mailbox.try_take() {
            self.latest = Some(snapshot);
        }
        match &self.latest {
            Some(snapshot) => snapshot.clone(),
            None => {
                let snapshot = self.mailbox.take_blocking();
                self.latest = Some(snapshot.clone());
                snapshot
            }
        }
    }

    fn wait_ready(&mut self, timeout: Duration) -> bool {
        if self.latest.is_none() {
            self.latest = self.mailbox.take_timeout(timeout);
        }
        self.latest.is_some()
    }

    fn is_live(&self) -> bool {
        true
    }
}

fn poll_loop<S: HealthSource>(mut source: S, mailbox: &Mailbox<Snapshot>, stop: &AtomicBool) {
    debug!("starting health poller");
    while !stop.load(Ordering::Relaxed) {
        let sleep = match source.collect(Instant::now()) {
            Ok(snapshot) if snapshot.is_empty() => {
                info!("nothing left to monitor, stopping health poller");
                return;
            }
            Ok(snapshot) => {
                let sleep = sleep_interval(snapshot.refreshed_at(), Utc::now());
                debug!(
                    rows = snapshot.rows.len(),
                    next_poll_ms = sleep.as_millis() as u64,
                    "polled health"
                );
                mailbox.send(snapshot);
                sleep
            }
            Err(e) if e.is_transient() => {
                debug!(error = %e, "health reporting unavailable, retrying");
                DEFAULT_SLEEP
            }
            Err(RemoteError::InvalidParameter(msg)) => {
                debug!(%msg, "environment no longer exists");
                return;
            }
            Err(e) => {
                error!(error = %e, "health poller failed");
                return;
            }
        };
        sleep_unless_stopped(sleep, stop);
    }
    debug!("health poller stopped on request");
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
