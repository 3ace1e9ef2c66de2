//! Banner above the tables and the command hint line below them.

use chrono::{DateTime, Utc};
use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::snapshot::Row;
use crate::util::local_time_string;

use super::input::Flavor;
use super::style::Styles;

const COUNT_LABELS: [&str; 8] = [
    "total", "ok", "warning", "degraded", "severe", "info", "pending", "unknown",
];

/// Per-flavor banner content that does not come from snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Health { tier: String, platform: String },
    BasicHealth,
    Versions { app_name: String, env_name: Option<String> },
    Environments { header: String },
}

/// Screen state the banner reads while drawing.
#[derive(Debug, Clone, Copy)]
pub struct BannerContext<'a> {
    pub width: usize,
    /// Lines still available on screen.
    pub lines: usize,
    pub environment: &'a Row,
    pub mono: bool,
    pub frozen: bool,
    pub refresh: bool,
    pub now: DateTime<Utc>,
}

impl Banner {
    pub fn draw(&self, ctx: &BannerContext) -> Vec<Line<'static>> {
        let mut out = Vec::new();
        let mut lines = ctx.lines;
        let env = ctx.environment;
        match self {
            Banner::Health { tier, platform } => {
                if lines > 2 {
                    out.push(health_first_line(ctx));
                    lines -= 1;
                }
                if lines > 2 {
                    let platform = format!(" {}", platform);
                    let pad = ctx.width.saturating_sub(tier.chars().count() + platform.chars().count() + 1);
                    out.push(Line::raw(format!("{}{}{} ", tier, " ".repeat(pad), platform)));
                    lines -= 1;
                }
                if lines > 3 {
                    out.extend(instance_count_lines(env));
                }
            }
            Banner::BasicHealth => {
                if lines > 2 {
                    out.push(health_first_line(ctx));
                    lines -= 1;
                }
                if lines > 2 {
                    out.push(Line::from(vec![
                        Span::raw("instances: "),
                        bold(env.display_or("Total", "0")),
                        Span::raw(" Total, "),
                        bold(env.display_or("InService", "0")),
                        Span::raw(" InService, "),
                        bold(env.display_or("Other", "0")),
                        Span::raw(" Other"),
                    ]));
                    lines -= 1;
                }
                if lines > 2 {
                    out.push(Line::from(vec![
                        Span::raw(" Status: "),
                        bold(env.display_or("Status", "Unknown")),
                        Span::raw(" Health "),
                        bold(env.display_or("Color", "Grey")),
                    ]));
                }
            }
            Banner::Versions { app_name, env_name } => {
                if lines > 2 {
                    let env_name = env_name.as_deref().unwrap_or("No Environment Specified");
                    let app = format!("Application Name: {}", app_name);
                    let pad = ctx.width.saturating_sub(env_name.chars().count() + 2);
                    out.push(Line::styled(
                        format!(" {}{} ", env_name, center(&app, pad)),
                        banner_style(env, ctx.mono),
                    ));
                    lines -= 1;
                }
                if lines > 2 {
                    out.push(Line::from(vec![
                        Span::raw("Environment Status: "),
                        bold(env.display_or("Status", "Unknown")),
                        Span::raw(" Health "),
                        bold(env.display_or("Color", "Unknown")),
                    ]));
                    lines -= 1;
                }
                if lines > 2 {
                    out.push(Line::from(vec![
                        Span::raw("Current version # deployed: "),
                        bold(env.display("CurrDeployNum")),
                    ]));
                }
            }
            Banner::Environments { header } => {
                if lines > 2 {
                    out.push(Line::raw(header.clone()));
                }
            }
        }
        out
    }
}

fn bold(text: impl Into<String>) -> Span<'static> {
    Span::styled(text.into(), Styles::bold())
}

fn banner_style(env: &Row, mono: bool) -> Style {
    Styles::banner(env.text("Color").unwrap_or("Grey"), mono)
}

/// ` <env>   <status>   <refreshed at><countdown> ` filling the width.
fn health_first_line(ctx: &BannerContext) -> Line<'static> {
    let env = ctx.environment;
    let status = env.display_or("HealthStatus", "Unknown");
    let (timestamp, countdown) = match env.time("RefreshedAt") {
        None => ("-".to_string(), " ( now )".to_string()),
        Some(refreshed) => {
            let elapsed = (ctx.now - refreshed).num_seconds();
            let diff = 11 - elapsed;
            let countdown = if !ctx.refresh {
                String::new()
            } else if ctx.frozen {
                format!(" (frozen +{})", elapsed)
            } else if diff < 0 {
                " ( now )".to_string()
            } else {
                format!(" ({} secs)", diff)
            };
            (local_time_string(refreshed), countdown)
        }
    };
    let env_name = env.display_or("EnvironmentName", "");
    let used = env_name.chars().count() + timestamp.chars().count() + countdown.chars().count() + 2;
    let pad = ctx.width.saturating_sub(used);
    Line::styled(
        format!(" {}{}{}{} ", env_name, center(&status, pad), timestamp, countdown),
        banner_style(env, ctx.mono),
    )
}

/// Column labels and bold counts, each centered in a fixed-width cell.
fn instance_count_lines(env: &Row) -> [Line<'static>; 2] {
    let size = COUNT_LABELS.iter().map(|l| l.len()).max().unwrap_or(0) + 1;
    let labels: String = COUNT_LABELS.iter().map(|l| center(l, size)).collect();
    let counts = COUNT_LABELS.iter().map(|label| {
        let value = match *label {
            "total" => env.int("Total").unwrap_or(0),
            "unknown" => env.int("Unknown").unwrap_or(0) + env.int("NoData").unwrap_or(0),
            _ => env.int(&capitalize(label)).unwrap_or(0),
        };
        bold(center(&value.to_string(), size))
    });
    [Line::raw(labels), Line::from(counts.collect::<Vec<_>>())]
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Centers `text` in `width` columns; extra padding goes to the right.
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(width - len - left))
}

/// Command hint under the tables.
pub fn help_line(flavor: Flavor, help_visible: bool, refresh: bool) -> Line<'static> {
    if help_visible {
        return Line::raw("(press Q or ESC to exit)");
    }
    let key = |k: &'static str| Span::styled(k, Styles::bold());
    match flavor {
        Flavor::EnhancedHealth | Flavor::BasicHealth if refresh => Line::from(vec![
            Span::raw(" (Commands: "),
            key("H"),
            Span::raw("elp,"),
            key("Q"),
            Span::raw("uit, ▼ ▲ ◀ ▶)"),
        ]),
        Flavor::EnhancedHealth | Flavor::BasicHealth => Line::default(),
        Flavor::Versions => Line::from(vec![
            Span::raw(" (Commands: "),
            key("Q"),
            Span::raw("uit, "),
            key("D"),
            Span::raw("elete, "),
            key("L"),
            Span::raw("ifecycle, ▼ ▲ ◀ ▶)"),
        ]),
        Flavor::Environments => Line::from(vec![
            Span::raw(" (Commands: "),
            key("Q"),
            Span::raw("uit, "),
            key("R"),
            Span::raw("estore, ▼ ▲)"),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::table::line_text;
    use chrono::Duration;

    fn env_row(now: DateTime<Utc>) -> Row {
        let mut env = Row::new();
        env.set("EnvironmentName", "web-prod");
        env.set("HealthStatus", "Ok");
        env.set("Color", "Green");
        env.set("RefreshedAt", now - Duration::seconds(4));
        env.set("Total", 6_i64);
        env.set("Ok", 3_i64);
        env.set("Severe", 1_i64);
        env.set("Unknown", 1_i64);
        env.set("NoData", 1_i64);
        env
    }

    fn ctx(env: &Row, now: DateTime<Utc>) -> BannerContext<'_> {
        BannerContext {
            width: 80,
            lines: 40,
            environment: env,
            mono: false,
            frozen: false,
            refresh: true,
            now,
        }
    }

    fn health() -> Banner {
        Banner::Health {
            tier: "WebServer".to_string(),
            platform: "Python 3.11/4.0.1".to_string(),
        }
    }

    #[test]
    fn test_center() {
        assert_eq!(center("ab", 6), "  ab  ");
        assert_eq!(center("ab", 5), " ab  ");
        assert_eq!(center("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_health_banner_countdown() {
        let now = Utc::now();
        let env = env_row(now);
        let lines = health().draw(&ctx(&env, now));
        assert_eq!(lines.len(), 4);
        let first = line_text(&lines[0]);
        assert_eq!(first.chars().count(), 80);
        assert!(first.starts_with(" web-prod"));
        assert!(first.ends_with(" (7 secs) "));
        assert!(first.contains(" Ok "));
        assert!(line_text(&lines[1]).ends_with(" Python 3.11/4.0.1 "));
        assert_eq!(line_text(&lines[1]).chars().count(), 80);
    }

    #[test]
    fn test_frozen_and_overdue_countdown() {
        let now = Utc::now();
        let env = env_row(now);
        let mut context = ctx(&env, now);
        context.frozen = true;
        assert!(line_text(&health().draw(&context)[0]).ends_with(" (frozen +4) "));

        let later = now + Duration::seconds(30);
        let context = ctx(&env, later);
        assert!(line_text(&health().draw(&context)[0]).ends_with(" ( now ) "));
    }

    #[test]
    fn test_missing_refresh_time_counts_as_now() {
        let now = Utc::now();
        let mut env = env_row(now);
        env.remove("RefreshedAt");
        let first = line_text(&health().draw(&ctx(&env, now))[0]);
        assert!(first.ends_with("- ( now ) "));
    }

    #[test]
    fn test_instance_counts_merge_no_data_into_unknown() {
        let now = Utc::now();
        let env = env_row(now);
        let lines = health().draw(&ctx(&env, now));
        let labels = line_text(&lines[2]);
        let counts = line_text(&lines[3]);
        assert!(labels.starts_with("  total     ok     warning "));
        let values: Vec<&str> = counts.split_whitespace().collect();
        assert_eq!(values, ["6", "3", "0", "0", "1", "0", "0", "2"]);
    }

    #[test]
    fn test_short_screen_drops_banner_lines() {
        let now = Utc::now();
        let env = env_row(now);
        let mut context = ctx(&env, now);
        context.lines = 3;
        assert_eq!(health().draw(&context).len(), 1);
        context.lines = 2;
        assert!(health().draw(&context).is_empty());
    }

    #[test]
    fn test_versions_banner() {
        let mut env = Row::new();
        env.set("Status", "Ready");
        env.set("Color", "Green");
        env.set("CurrDeployNum", 21_i64);
        let banner = Banner::Versions {
            app_name: "shop".to_string(),
            env_name: None,
        };
        let now = Utc::now();
        let lines = banner.draw(&ctx(&env, now));
        assert_eq!(lines.len(), 3);
        let first = line_text(&lines[0]);
        assert!(first.starts_with(" No Environment Specified"));
        assert!(first.contains("Application Name: shop"));
        assert_eq!(line_text(&lines[1]), "Environment Status: Ready Health Green");
        assert_eq!(line_text(&lines[2]), "Current version # deployed: 21");
    }

    #[test]
    fn test_basic_banner() {
        let mut env = Row::new();
        env.set("Total", 2_i64);
        env.set("InService", 1_i64);
        env.set("Other", 1_i64);
        env.set("Status", "Ready");
        let now = Utc::now();
        let lines = Banner::BasicHealth.draw(&ctx(&env, now));
        assert_eq!(line_text(&lines[1]), "instances: 2 Total, 1 InService, 1 Other");
        assert_eq!(line_text(&lines[2]), " Status: Ready Health Grey");
    }

    #[test]
    fn test_help_lines() {
        let text = line_text(&help_line(Flavor::EnhancedHealth, false, true));
        assert_eq!(text, " (Commands: Help,Quit, ▼ ▲ ◀ ▶)");
        assert_eq!(line_text(&help_line(Flavor::EnhancedHealth, false, false)), "");
        assert_eq!(
            line_text(&help_line(Flavor::Environments, false, true)),
            " (Commands: Quit, Restore, ▼ ▲)"
        );
        assert_eq!(
            line_text(&help_line(Flavor::Versions, true, true)),
            "(press Q or ESC to exit)"
        );
    }
}
