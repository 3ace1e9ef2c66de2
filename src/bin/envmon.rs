//! envmon - Terminal dashboards for hosted application environments.
//!
//! Usage:
//!   envmon health shop shop-prod              # live health, all tables
//!   envmon health shop shop-prod --view cpu    # start on the cpu table
//!   envmon health shop shop-prod --no-refresh  # print one frame and exit
//!   envmon versions shop --env shop-prod       # version history
//!   envmon restore --app shop                  # terminated environments
//!
//! Without `--fixture` the dashboards run against generated demo data.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use envmon::dashboard::{
    Dashboard, HealthOptions, Outcome, health_dashboard, restore_dashboard, versions_dashboard,
};
use envmon::error::Result;
use envmon::remote::{FixtureRemote, RemoteSource};
use envmon::tui::ExitReason;

const DEMO_APP: &str = "demo-app";
const DEMO_ENV: &str = "demo-env";

/// Terminal dashboards for hosted application environments.
#[derive(Parser)]
#[command(name = "envmon", about = "Environment health and version dashboards", version)]
struct Args {
    /// JSON fixture to serve instead of generated demo data.
    #[arg(long, global = true, value_name = "PATH")]
    fixture: Option<PathBuf>,

    /// Directory for snapshots and the log file.
    #[arg(long, global = true, env = "ENVMON_STATE_DIR", default_value = ".envmon")]
    state_dir: PathBuf,

    /// Log file (default: <state-dir>/envmon.log).
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Live health of an environment.
    Health {
        app: String,
        env: String,
        /// Start without colors.
        #[arg(long)]
        mono: bool,
        /// Table group to start on (split, status, requests, cpu, deployments, health).
        #[arg(long)]
        view: Option<String>,
        /// Print a single frame and exit.
        #[arg(long)]
        no_refresh: bool,
        /// Use basic health even when enhanced health is enabled.
        #[arg(long)]
        basic: bool,
    },
    /// Application versions, newest first.
    Versions {
        app: String,
        /// Environment whose deployed version is highlighted.
        #[arg(long)]
        env: Option<String>,
    },
    /// Recently terminated environments.
    Restore {
        /// Only environments of this application.
        #[arg(long)]
        app: Option<String>,
    },
}

/// Logs go to a file; anything written to the terminal would corrupt the
/// dashboard.
fn init_logging(verbose: u8, path: &Path) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_env("ENVMON_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("envmon={}", level)));

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = fs::create_dir_all(parent)
    {
        eprintln!("Warning: logging disabled, cannot create {}: {}", parent.display(), e);
        return;
    }
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: logging disabled, cannot open {}: {}", path.display(), e);
            return;
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn load_remote(fixture: Option<&Path>, app: &str, env: &str) -> Result<Arc<dyn RemoteSource>> {
    let remote = match fixture {
        Some(path) => FixtureRemote::from_path(path)?,
        None => {
            info!(app, env, "serving generated demo data");
            FixtureRemote::demo(app, env)
        }
    };
    Ok(Arc::new(remote))
}

fn build(args: &Args) -> Result<(Dashboard, bool)> {
    let fixture = args.fixture.as_deref();
    match &args.command {
        Cmd::Health {
            app,
            env,
            mono,
            view,
            no_refresh,
            basic,
        } => {
            let options = HealthOptions {
                mono: *mono || *no_refresh,
                view: view.clone(),
                refresh: !no_refresh,
                force_basic: *basic,
            };
            let remote = load_remote(fixture, app, env)?;
            let dashboard = health_dashboard(remote, app, env, &options, &args.state_dir)?;
            Ok((dashboard, options.refresh))
        }
        Cmd::Versions { app, env } => {
            let demo_env = env.clone().unwrap_or_else(|| format!("{}-env", app));
            let remote = load_remote(fixture, app, &demo_env)?;
            let dashboard = versions_dashboard(remote, app, env.as_deref(), &args.state_dir)?;
            Ok((dashboard, true))
        }
        Cmd::Restore { app } => {
            let remote = load_remote(fixture, app.as_deref().unwrap_or(DEMO_APP), DEMO_ENV)?;
            let dashboard = restore_dashboard(remote, app.as_deref(), &args.state_dir)?;
            Ok((dashboard, true))
        }
    }
}

fn report(outcome: &Outcome) -> i32 {
    if let Some(notice) = &outcome.notice {
        println!("{}", notice);
    }
    match outcome.reason {
        ExitReason::Interrupted => 130,
        ExitReason::NoData => {
            println!("No more data to display.");
            0
        }
        ExitReason::IdleTimeout => {
            println!("Exited after a long period without input.");
            0
        }
        ExitReason::Quit | ExitReason::ActionCompleted(_) => 0,
    }
}

fn main() {
    let args = Args::parse();
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| args.state_dir.join("envmon.log"));
    init_logging(args.verbose, &log_file);

    let (dashboard, interactive) = match build(&args) {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "failed to open dashboard");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if !interactive {
        let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
        match dashboard.print_once(width as usize, height as usize) {
            Some(frame) => println!("{}", frame),
            None => println!("No data to display."),
        }
        return;
    }

    match dashboard.run() {
        Ok(outcome) => {
            info!(reason = ?outcome.reason, "exiting");
            std::process::exit(report(&outcome));
        }
        Err(e) => {
            error!(error = %e, "dashboard failed");
            eprintln!("Error running dashboard: {}", e);
            std::process::exit(1);
        }
    }
}
