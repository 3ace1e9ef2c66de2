//! Help overlay content per dashboard flavor.

use crate::snapshot::Row;

use super::input::Flavor;
use super::table::Table;

fn entry(rows: &mut Vec<Row>, keys: &[&str], action: &str) {
    let mut row = Row::new();
    row.set("key", keys.join(","));
    row.set("action", action);
    rows.push(row);
}

fn section(rows: &mut Vec<Row>, name: &str) {
    let mut row = Row::new();
    row.set("key", name);
    row.set("action", " ");
    row.set("section", true);
    rows.push(row);
}

fn health_rows(rows: &mut Vec<Row>) {
    entry(rows, &["up", "down", "home", "end"], "Scroll vertically");
    entry(rows, &["left", "right"], "Scroll horizontally");
    entry(rows, &["F"], "Freeze/unfreeze data");
    entry(rows, &["X"], "Replace instance");
    entry(rows, &["B"], "Reboot instance");
    entry(rows, &["<", ">"], "Move sort column left/right");
    entry(rows, &["-", "+"], "Sort order descending/ascending");
    entry(rows, &["P"], "Save health snapshot data file");
    entry(rows, &["Z"], "Toggle color/mono mode");
}

/// Keybinding rows for `flavor`.
///
/// Only the enhanced health dashboard lists the view groups; every other
/// flavor gets the viewless variant.
pub fn help_rows(flavor: Flavor) -> Vec<Row> {
    let mut rows = Vec::new();
    match flavor {
        Flavor::EnhancedHealth => {
            health_rows(&mut rows);
            section(&mut rows, "");
            section(&mut rows, "Views");
            entry(&mut rows, &["1"], "All tables/split view");
            entry(&mut rows, &["2"], "Health status table");
            entry(&mut rows, &["3"], "Request summary table");
            entry(&mut rows, &["4"], "CPU%/Load table");
            entry(&mut rows, &["5"], "Deployment summary table");
        }
        Flavor::BasicHealth => health_rows(&mut rows),
        Flavor::Versions => {
            entry(&mut rows, &["up", "down"], "Previous/next page");
            entry(&mut rows, &["left", "right"], "Scroll description");
            entry(&mut rows, &["D"], "Delete application version");
            entry(&mut rows, &["L"], "Edit version lifecycle policy");
        }
        Flavor::Environments => {
            entry(&mut rows, &["up", "down"], "Previous/next page");
            entry(&mut rows, &["R"], "Restore environment");
        }
    }
    entry(&mut rows, &["H"], "This help menu");
    entry(&mut rows, &["Q", "ESC"], "Quit or close this help menu");
    section(&mut rows, "");
    rows
}

pub fn help_table(flavor: Flavor) -> Table {
    Table::help(help_rows(flavor))
}
