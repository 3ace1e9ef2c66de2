//! Keybindings: key events map to [`Command`]s per dashboard flavor.

use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which dashboard is running; decides tables, keymap and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    EnhancedHealth,
    BasicHealth,
    Versions,
    Environments,
}

impl Flavor {
    /// Whether a background poller keeps the data fresh.
    pub fn is_live(self) -> bool {
        matches!(self, Flavor::EnhancedHealth | Flavor::BasicHealth)
    }

    /// Exit after this long without a keystroke.
    pub fn idle_timeout(self) -> Duration {
        if self.is_live() {
            Duration::from_secs(2 * 60 * 60)
        } else {
            // Paged listings outlive their pagination tokens after 20 minutes.
            Duration::from_secs(19 * 60)
        }
    }

    /// Table groups selectable with the digit keys, in key order.
    pub fn groups(self) -> &'static [&'static str] {
        match self {
            Flavor::EnhancedHealth => &["split", "status", "requests", "cpu", "deployments"],
            Flavor::BasicHealth => &["split", "health"],
            Flavor::Versions => &["app_versions"],
            Flavor::Environments => &["environments"],
        }
    }

    /// Resolves a user-supplied view name to one of this flavor's groups.
    pub fn group_named(self, name: &str) -> Option<&'static str> {
        self.groups().iter().copied().find(|g| *g == name)
    }

    /// Screen row used for prompts and transient messages.
    pub fn message_row(self) -> usize {
        match self {
            Flavor::EnhancedHealth => 4,
            Flavor::BasicHealth | Flavor::Versions => 3,
            Flavor::Environments => 1,
        }
    }
}

/// Mutating operations bound to letter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Delete,
    Lifecycle,
    Restore,
    Replace,
    Reboot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn is_backward(self) -> bool {
        self == Direction::Backward
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    Home,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Escape,
    Interrupt,
    ShowHelp,
    ToggleFreeze,
    ToggleMono,
    Snapshot,
    /// Digit key, 1-based.
    SelectGroup(usize),
    /// `Forward` moves right.
    MoveSort(Direction),
    SortOrder(SortOrder),
    /// `Forward` is down/right.
    Scroll(Axis, Direction),
    Jump(Jump),
    Page(Direction),
    InvokeAction(ActionKind),
}

/// Maps a key event to a command for `flavor`. Letters are case-insensitive.
pub fn keymap(flavor: Flavor, key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::Interrupt),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Esc => return Some(Command::Escape),
        KeyCode::Char(c) => match c.to_ascii_uppercase() {
            'Q' => return Some(Command::Quit),
            'H' => return Some(Command::ShowHelp),
            _ => {}
        },
        _ => {}
    }
    match flavor {
        Flavor::EnhancedHealth | Flavor::BasicHealth => health_keymap(flavor, key.code),
        Flavor::Versions => versions_keymap(key.code),
        Flavor::Environments => environments_keymap(key.code),
    }
}

fn health_keymap(flavor: Flavor, code: KeyCode) -> Option<Command> {
    let command = match code {
        KeyCode::Char(c) => match c.to_ascii_uppercase() {
            'F' => Command::ToggleFreeze,
            'Z' => Command::ToggleMono,
            'P' => Command::Snapshot,
            'X' => Command::InvokeAction(ActionKind::Replace),
            'B' => Command::InvokeAction(ActionKind::Reboot),
            '<' => Command::MoveSort(Direction::Backward),
            '>' => Command::MoveSort(Direction::Forward),
            '+' => Command::SortOrder(SortOrder::Ascending),
            '-' => Command::SortOrder(SortOrder::Descending),
            d @ '1'..='9' => {
                let n = d as usize - '0' as usize;
                if n > flavor.groups().len() {
                    return None;
                }
                Command::SelectGroup(n)
            }
            _ => return None,
        },
        KeyCode::Down => Command::Scroll(Axis::Vertical, Direction::Forward),
        KeyCode::Up => Command::Scroll(Axis::Vertical, Direction::Backward),
        KeyCode::Right => Command::Scroll(Axis::Horizontal, Direction::Forward),
        KeyCode::Left => Command::Scroll(Axis::Horizontal, Direction::Backward),
        KeyCode::Home => Command::Jump(Jump::Home),
        KeyCode::End => Command::Jump(Jump::End),
        _ => return None,
    };
    Some(command)
}

fn versions_keymap(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char(c) => match c.to_ascii_uppercase() {
            'D' => Some(Command::InvokeAction(ActionKind::Delete)),
            'L' => Some(Command::InvokeAction(ActionKind::Lifecycle)),
            _ => None,
        },
        KeyCode::Down => Some(Command::Page(Direction::Forward)),
        KeyCode::Up => Some(Command::Page(Direction::Backward)),
        KeyCode::Right => Some(Command::Scroll(Axis::Horizontal, Direction::Forward)),
        KeyCode::Left => Some(Command::Scroll(Axis::Horizontal, Direction::Backward)),
        _ => None,
    }
}

fn environments_keymap(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Char(c) if c.eq_ignore_ascii_case(&'r') => {
            Some(Command::InvokeAction(ActionKind::Restore))
        }
        KeyCode::Down => Some(Command::Page(Direction::Forward)),
        KeyCode::Up => Some(Command::Page(Direction::Backward)),
        _ => None,
    }
}
