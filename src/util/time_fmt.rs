//! Human-readable time and number formatting for table cells.

use chrono::{DateTime, Local, Utc};

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

/// Coarse age of `then` relative to `now`: `3 days`, `1 hour`, `12 mins`,
/// `40 secs`. Only the largest unit is shown.
///
/// Timestamps in the future count as zero seconds old.
pub fn format_time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - then).num_seconds().max(0);
    let days = elapsed / 86_400;
    let seconds = elapsed % 86_400;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if days > 0 {
        format!("{} day{}", days, plural(days))
    } else if hours > 0 {
        format!("{} hour{}", hours, plural(hours))
    } else if minutes > 0 {
        format!("{} min{}", minutes, plural(minutes))
    } else {
        format!("{} secs", seconds)
    }
}

/// `2024-03-01 14:05:09` in the local timezone.
pub fn local_time_string(ts: DateTime<Utc>) -> String {
    local_time_with(ts, "%Y-%m-%d %H:%M:%S")
}

/// Local-time rendering with an explicit strftime pattern.
pub fn local_time_with(ts: DateTime<Utc>, pattern: &str) -> String {
    ts.with_timezone(&Local).format(pattern).to_string()
}

/// Fixed-point rendering: `format_float(0.0123, 3)` is `0.012`.
pub fn format_float(value: f64, places: usize) -> String {
    format!("{:.*}", places, value)
}
