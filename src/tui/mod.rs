//! Terminal dashboard: tables, keymap, banner, prompts and the screen loop.
//!
//! Each cycle composes the whole screen as lines and hands them to ratatui;
//! there is no partial redraw.

mod app;
mod banner;
mod help;
mod input;
mod prompt;
mod render;
mod screen;
mod style;
pub mod table;

pub use app::{App, CrosstermKeys, KeySource, TerminalGuard};
pub use banner::Banner;
pub use help::help_rows;
pub use input::{ActionKind, Axis, Command, Direction, Flavor, Jump, SortOrder, keymap};
pub use prompt::{Action, ActionRegistry, PromptOutcome, parse_item_number};
pub use screen::{DashboardContext, ExitReason, Screen, SortState, export_snapshot};
pub use table::{Column, Justify, Table, TableKind, Width};
