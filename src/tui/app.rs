//! Terminal setup/teardown and the top-level run entry points.

use std::io::{self, Stdout};
use std::panic;
use std::sync::Once;
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{debug, info};

use crate::error::Result;
use crate::provider::SnapshotProvider;

use super::screen::{ExitReason, Screen};

/// Source of keystrokes for the main loop and prompts.
pub trait KeySource {
    /// Waits up to `timeout` for a key press. `Ok(None)` on timeout.
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Reads key presses from the real terminal.
#[derive(Debug, Default)]
pub struct CrosstermKeys;

impl KeySource for CrosstermKeys {
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    }
}

/// Raw mode, alternate screen and hidden cursor for as long as it lives.
pub struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        install_panic_hook();
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen, Hide) {
            let _ = restore_terminal();
            return Err(e);
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    pub fn terminal(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = restore_terminal() {
            debug!(error = %e, "failed to restore terminal");
        }
    }
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Puts the terminal back before the default hook prints the panic.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let _ = restore_terminal();
            previous(info);
        }));
    });
}

/// A dashboard bound to its data provider.
pub struct App {
    screen: Screen,
    provider: Box<dyn SnapshotProvider>,
}

impl App {
    pub fn new(screen: Screen, provider: Box<dyn SnapshotProvider>) -> Self {
        Self { screen, provider }
    }

    /// Runs the interactive dashboard until it exits.
    pub fn run(mut self) -> Result<ExitReason> {
        let mut guard = TerminalGuard::enter()?;
        let mut keys = CrosstermKeys;
        let reason = self
            .screen
            .run(guard.terminal(), &mut keys, self.provider.as_mut());
        drop(guard);
        info!(?reason, "dashboard closed");
        reason
    }

    /// Renders a single monochrome frame as plain text, without touching the
    /// terminal mode. `None` when there is no data.
    pub fn print_once(mut self, width: usize, height: usize) -> Option<String> {
        let lines = self
            .screen
            .render_plain(self.provider.as_mut(), width, height)?;
        Some(lines.join("\n"))
    }
}
