//! The interaction engine shared by every dashboard flavor.
//!
//! One cycle pulls a snapshot from the provider, sorts it, composes the
//! whole screen (banner, visible tables, message row, command hint) and
//! waits up to half a second for a key. Keys become [`Command`]s and are
//! dispatched here; action keys open a blocking prompt on the message row.

use std::fs;
use std::iter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tracing::{debug, error, info, warn};

use crate::error::{ActionError, DashboardError, Result};
use crate::provider::SnapshotProvider;
use crate::snapshot::Snapshot;

use super::app::KeySource;
use super::banner::{Banner, BannerContext, help_line};
use super::help::help_table;
use super::input::{ActionKind, Axis, Command, Direction, Flavor, Jump, SortOrder, keymap};
use super::prompt::{Action, ActionRegistry, Edit, LineEditor, PromptOutcome, confirm_answer};
use super::render::render;
use super::style::Styles;
use super::table::{RenderContext, Table, line_text};

/// How long key waits block before the loop refreshes.
pub const KEY_WAIT: Duration = Duration::from_millis(500);
/// How long transient messages stay on screen.
pub const MESSAGE_DURATION: Duration = Duration::from_secs(4);

const HELP_GROUP: &str = "help";
const DESCRIPTION_SHIFT: usize = 3;
const MAX_DESCRIPTION_SHIFT: usize = 99;

/// Why the main loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Interrupted,
    /// The provider ran dry.
    NoData,
    IdleTimeout,
    /// An action finished and closed the dashboard.
    ActionCompleted(ActionKind),
}

/// Everything a dashboard needs besides its tables and data source.
#[derive(Debug)]
pub struct DashboardContext {
    /// Directory receiving snapshot exports.
    pub state_dir: PathBuf,
    pub flavor: Flavor,
    pub actions: ActionRegistry,
}

impl DashboardContext {
    pub fn new(flavor: Flavor, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            flavor,
            actions: ActionRegistry::new(),
        }
    }
}

/// Active sort target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    /// Table name and column index.
    pub target: Option<(&'static str, usize)>,
    pub descending: bool,
}

#[derive(Debug, Clone)]
struct ViewState {
    mono: bool,
    frozen: bool,
    refresh: bool,
    horizontal_offset: usize,
    max_columns: usize,
    last_group: &'static str,
}

#[derive(Debug, Clone)]
struct Message {
    line: Line<'static>,
    /// `None` while a prompt owns the row.
    until: Option<Instant>,
}

pub struct Screen {
    flavor: Flavor,
    tables: Vec<Table>,
    help: Table,
    banner: Banner,
    actions: ActionRegistry,
    state_dir: PathBuf,
    sort: SortState,
    view: ViewState,
    data: Snapshot,
    message: Option<Message>,
    idle_since: Instant,
}

impl Screen {
    pub fn new(context: DashboardContext, tables: Vec<Table>, banner: Banner) -> Self {
        let flavor = context.flavor;
        let first_group = flavor.groups().first().copied().unwrap_or("split");
        let mut screen = Self {
            flavor,
            tables,
            help: help_table(flavor),
            banner,
            actions: context.actions,
            state_dir: context.state_dir,
            sort: SortState::default(),
            view: ViewState {
                mono: false,
                frozen: false,
                refresh: true,
                horizontal_offset: 0,
                max_columns: 0,
                last_group: first_group,
            },
            data: Snapshot::empty(),
            message: None,
            idle_since: Instant::now(),
        };
        screen.turn_on_table(first_group);
        screen
    }

    pub fn with_mono(mut self, mono: bool) -> Self {
        self.view.mono = mono;
        self
    }

    /// Without refresh the loop returns after the first draw.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.view.refresh = refresh;
        self
    }

    /// Starts on table group `group`.
    pub fn with_group(mut self, group: &'static str) -> Self {
        self.turn_on_table(group);
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// Snapshot currently on screen.
    pub fn snapshot(&self) -> &Snapshot {
        &self.data
    }

    pub fn sort_state(&self) -> SortState {
        self.sort
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn help_visible(&self) -> bool {
        self.help.visible
    }

    pub fn is_frozen(&self) -> bool {
        self.view.frozen
    }

    /// Text currently in the message row.
    pub fn message_text(&self) -> Option<String> {
        self.message.as_ref().map(|m| line_text(&m.line))
    }

    /// Runs the main loop until quit, idle timeout, data exhaustion or a
    /// finished action.
    pub fn run<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
        provider: &mut dyn SnapshotProvider,
    ) -> Result<ExitReason> {
        info!(flavor = ?self.flavor, live = provider.is_live(), "dashboard started");
        self.idle_since = Instant::now();
        let idle_timeout = self.flavor.idle_timeout();
        if let Some(reason) = self.wait_for_data(keys, provider)? {
            return Ok(reason);
        }
        while self.idle_since.elapsed() < idle_timeout {
            self.get_data(provider);
            if self.data.is_empty() {
                info!("no data left to display");
                return Ok(ExitReason::NoData);
            }
            self.sort_data();
            self.draw(terminal)?;
            if !self.view.refresh {
                return Ok(ExitReason::Quit);
            }
            if let Some(reason) = self.handle_input(terminal, keys, provider)? {
                return Ok(reason);
            }
        }
        info!(timeout = ?idle_timeout, "idle timeout");
        Ok(ExitReason::IdleTimeout)
    }

    /// Waits for the provider's first snapshot. Only quit and interrupt
    /// keys are honored meanwhile.
    fn wait_for_data(
        &mut self,
        keys: &mut dyn KeySource,
        provider: &mut dyn SnapshotProvider,
    ) -> Result<Option<ExitReason>> {
        let idle_timeout = self.flavor.idle_timeout();
        while !provider.wait_ready(KEY_WAIT) {
            if self.idle_since.elapsed() >= idle_timeout {
                return Ok(Some(ExitReason::IdleTimeout));
            }
            let Some(key) = keys.next_key(Duration::ZERO)? else {
                continue;
            };
            match keymap(self.flavor, &key) {
                Some(Command::Interrupt) => return Ok(Some(ExitReason::Interrupted)),
                Some(Command::Quit) => return Ok(Some(ExitReason::Quit)),
                _ => debug!(code = ?key.code, "key ignored while waiting for data"),
            }
        }
        Ok(None)
    }

    /// One frame as plain text lines. `None` when there is no data.
    pub fn render_plain(
        &mut self,
        provider: &mut dyn SnapshotProvider,
        width: usize,
        height: usize,
    ) -> Option<Vec<String>> {
        self.get_data(provider);
        if self.data.is_empty() {
            return None;
        }
        self.sort_data();
        let lines = self.compose(width, height, Utc::now());
        Some(lines.iter().map(line_text).collect())
    }

    /// Pulls the freshest snapshot. While frozen the provider is still
    /// drained and the value dropped.
    fn get_data(&mut self, provider: &mut dyn SnapshotProvider) {
        let fresh = provider.get_fresh_data();
        if self.view.frozen {
            debug!("frozen; discarding fresh snapshot");
            return;
        }
        self.data = fresh;
    }

    fn sort_data(&mut self) {
        let Some((table_name, column)) = self.sort.target else {
            return;
        };
        let Some(sort_key) = self
            .tables
            .iter()
            .find(|t| t.name == table_name)
            .and_then(|t| t.columns.get(column))
            .map(|c| c.sort_key)
        else {
            return;
        };
        let descending = self.sort.descending;
        self.data.rows.sort_by(|a, b| {
            let ordering = a.cmp_by(b, sort_key);
            if descending { ordering.reverse() } else { ordering }
        });
    }

    fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        if self
            .message
            .as_ref()
            .is_some_and(|m| m.until.is_some_and(|until| Instant::now() >= until))
        {
            self.message = None;
        }
        let now = Utc::now();
        terminal.draw(|frame| {
            let area = frame.area();
            let lines = self.compose(area.width as usize, area.height as usize, now);
            render(frame, lines);
        })?;
        Ok(())
    }

    /// Builds every line of the screen.
    pub fn compose(&mut self, width: usize, height: usize, now: DateTime<Utc>) -> Vec<Line<'static>> {
        let mut budget = height.saturating_sub(1);
        let mut lines = self.banner.draw(&BannerContext {
            width,
            lines: budget,
            environment: &self.data.environment,
            mono: self.view.mono,
            frozen: self.view.frozen,
            refresh: self.view.refresh,
            now,
        });
        budget = budget.saturating_sub(lines.len());
        lines.push(Line::default());
        // blank lines before and after the tables
        budget = budget.saturating_sub(2);

        let visible: Vec<&Table> = self
            .tables
            .iter()
            .chain(iter::once(&self.help))
            .filter(|t| t.visible)
            .collect();
        if !visible.is_empty() {
            let headers: usize = visible.iter().map(|t| t.header_size()).sum();
            let visible_rows = budget.saturating_sub(headers) / visible.len();
            if visible_rows > 0 {
                self.view.max_columns = visible
                    .iter()
                    .map(|t| t.columns.len())
                    .max()
                    .unwrap_or(0)
                    .saturating_sub(1);
                let ctx = RenderContext {
                    width,
                    horizontal_offset: self.view.horizontal_offset,
                    max_columns: self.view.max_columns,
                    mono: self.view.mono,
                    sort: self.sort.target,
                    environment: &self.data.environment,
                };
                for table in self.tables.iter_mut().chain(iter::once(&mut self.help)) {
                    lines.extend(table.draw(visible_rows, &self.data.rows, &ctx));
                }
            }
        }

        lines.push(help_line(self.flavor, self.help.visible, self.view.refresh));

        if let Some(message) = &self.message {
            let row = self.flavor.message_row();
            while lines.len() <= row {
                lines.push(Line::default());
            }
            lines[row] = message.line.clone();
        }
        lines
    }

    fn handle_input<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
        provider: &mut dyn SnapshotProvider,
    ) -> Result<Option<ExitReason>> {
        let Some(key) = keys.next_key(KEY_WAIT)? else {
            return Ok(None);
        };
        self.idle_since = Instant::now();
        debug!(code = ?key.code, modifiers = ?key.modifiers, "key");
        let Some(command) = keymap(self.flavor, &key) else {
            return Ok(None);
        };
        self.dispatch(command, terminal, keys, provider)
    }

    fn dispatch<B: Backend>(
        &mut self,
        command: Command,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
        provider: &mut dyn SnapshotProvider,
    ) -> Result<Option<ExitReason>> {
        match command {
            Command::Quit => {
                if !self.help.visible {
                    return Ok(Some(ExitReason::Quit));
                }
                self.turn_on_table(self.view.last_group);
            }
            Command::Escape => {
                if self.help.visible {
                    self.turn_on_table(self.view.last_group);
                } else if !self.flavor.is_live() {
                    return Ok(Some(ExitReason::Quit));
                }
            }
            Command::Interrupt => return Ok(Some(ExitReason::Interrupted)),
            Command::ShowHelp => self.turn_on_table(HELP_GROUP),
            Command::ToggleFreeze => self.view.frozen = !self.view.frozen,
            Command::ToggleMono => self.view.mono = !self.view.mono,
            Command::Snapshot => self.save_snapshot(),
            Command::SelectGroup(n) => {
                if let Some(group) = n.checked_sub(1).and_then(|i| self.flavor.groups().get(i).copied()) {
                    self.turn_on_table(group);
                }
            }
            Command::MoveSort(direction) => self.move_sort(direction),
            Command::SortOrder(order) => self.sort.descending = order == SortOrder::Descending,
            Command::Scroll(Axis::Vertical, direction) => self.scroll_down(direction.is_backward()),
            Command::Scroll(Axis::Horizontal, direction) => {
                if self.flavor == Flavor::Versions {
                    self.shift_description(direction);
                } else {
                    self.scroll_over(direction);
                }
            }
            Command::Jump(jump) => {
                for table in self.tables.iter_mut().chain(iter::once(&mut self.help)) {
                    match jump {
                        Jump::Home => table.scroll_to_beginning(),
                        Jump::End => table.scroll_to_end(),
                    }
                }
            }
            Command::Page(direction) => {
                let page = match direction {
                    Direction::Forward => provider.next_page(),
                    Direction::Backward => provider.previous_page(),
                };
                if let Some(snapshot) = page {
                    self.data = snapshot;
                }
                if let Some(table) = self.tables.first_mut() {
                    table.shift_col = 0;
                }
            }
            Command::InvokeAction(kind) => return self.invoke(kind, terminal, keys),
        }
        Ok(None)
    }

    /// Shows the tables of `group`. Changing group clears the sort target;
    /// scroll positions always reset.
    pub fn turn_on_table(&mut self, group: &'static str) {
        for table in &mut self.tables {
            table.visible = group == "split" || group == table.name;
        }
        self.help.visible = group == HELP_GROUP;
        if !self.help.visible && group != self.view.last_group {
            self.sort.target = None;
            self.view.last_group = group;
        }
        self.view.horizontal_offset = 0;
        for table in self.tables.iter_mut().chain(iter::once(&mut self.help)) {
            table.vertical_offset = 0;
        }
    }

    /// Moves the sort target one column, crossing into neighboring visible
    /// tables and wrapping at either end.
    pub fn move_sort(&mut self, direction: Direction) {
        let visible: Vec<(&'static str, usize)> = self
            .tables
            .iter()
            .filter(|t| t.visible)
            .map(|t| (t.name, t.columns.len()))
            .collect();
        let Some(&(first, _)) = visible.first() else {
            return;
        };
        let Some((name, column)) = self.sort.target else {
            self.sort.target = Some((first, 0));
            return;
        };
        let index = visible.iter().position(|(n, _)| *n == name).unwrap_or(0);
        let target = match direction {
            Direction::Forward => {
                if column + 1 < visible[index].1 {
                    (name, column + 1)
                } else if index + 1 < visible.len() {
                    (visible[index + 1].0, 0)
                } else {
                    (first, 0)
                }
            }
            Direction::Backward => {
                if column > 0 {
                    (name, column - 1)
                } else {
                    let (prev, len) = if index > 0 {
                        visible[index - 1]
                    } else {
                        visible[visible.len() - 1]
                    };
                    (prev, len.saturating_sub(1))
                }
            }
        };
        debug!(?target, "sort target moved");
        self.sort.target = Some(target);
    }

    /// Scrolls the first visible table one row; the others follow by row
    /// identity.
    fn scroll_down(&mut self, reverse: bool) {
        let mut visible: Vec<&mut Table> = self
            .tables
            .iter_mut()
            .chain(iter::once(&mut self.help))
            .filter(|t| t.visible)
            .collect();
        let Some((first, rest)) = visible.split_first_mut() else {
            return;
        };
        if first.rows().is_empty() {
            return;
        }
        if let Some(id) = first.scroll_down(reverse) {
            for table in rest {
                table.scroll_to_id(&id, reverse);
            }
        }
    }

    fn scroll_over(&mut self, direction: Direction) {
        match direction {
            Direction::Backward => {
                self.view.horizontal_offset = self.view.horizontal_offset.saturating_sub(1)
            }
            // unbounded so long causes can scroll as text
            Direction::Forward => self.view.horizontal_offset += 1,
        }
    }

    /// Scrolls text inside the `Description` column of the versions table.
    fn shift_description(&mut self, direction: Direction) {
        let Some(table) = self.tables.first_mut() else {
            return;
        };
        let Some(column) = table.columns.iter().position(|c| c.key == "Description") else {
            return;
        };
        match direction {
            Direction::Backward => table.shift_col = table.shift_col.saturating_sub(DESCRIPTION_SHIFT),
            Direction::Forward => {
                if table.shift_col < MAX_DESCRIPTION_SHIFT
                    && table.widest_in_column(column) > MAX_DESCRIPTION_SHIFT - 10
                {
                    table.shift_col += DESCRIPTION_SHIFT;
                }
            }
        }
    }

    fn save_snapshot(&mut self) {
        match export_snapshot(&self.state_dir, &self.data, Local::now()) {
            Ok(path) => self.show_message(
                format!("Snapshot file saved at: {}", path.display()),
                Styles::bold(),
            ),
            Err(e) => {
                error!(error = %e, "failed to save snapshot");
                self.show_message(e.to_string(), error_style());
            }
        }
    }

    fn show_message(&mut self, text: String, style: Style) {
        self.message = Some(Message {
            line: Line::from(vec![Span::raw("  "), Span::styled(text, style)]),
            until: Some(Instant::now() + MESSAGE_DURATION),
        });
    }

    fn show_action_error(&mut self, err: &ActionError, valid_max: Option<usize>) {
        let style = match err {
            ActionError::Declined(_) => Styles::bold(),
            _ => error_style(),
        };
        self.show_message(err.user_message(valid_max), style);
    }

    fn invoke<B: Backend>(
        &mut self,
        kind: ActionKind,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
    ) -> Result<Option<ExitReason>> {
        let Some(mut action) = self.actions.take(kind) else {
            debug!(?kind, "no action registered");
            return Ok(None);
        };
        let outcome = self.prompt_and_action(&mut action, terminal, keys);
        self.actions.register(action);
        match outcome? {
            PromptOutcome::Aborted | PromptOutcome::Stay => Ok(None),
            PromptOutcome::ExitSubview => Ok(Some(ExitReason::ActionCompleted(kind))),
        }
    }

    /// Reads input on the message row, confirms if the action asks for it,
    /// then runs the action and reports failures as transient messages.
    pub fn prompt_and_action<B: Backend>(
        &mut self,
        action: &mut Action,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
    ) -> Result<PromptOutcome> {
        let input = self.read_line(&action.prompt, terminal, keys)?;
        let Some(input) = input else {
            debug!(kind = ?action.kind, "prompt aborted");
            return Ok(PromptOutcome::Aborted);
        };

        if let Some(confirm) = &action.confirm {
            let question = match confirm(&input) {
                Ok(question) => question,
                Err(e) => {
                    self.show_action_error(&e, action.valid_max);
                    return Ok(PromptOutcome::Stay);
                }
            };
            match self.read_confirmation(&question, terminal, keys)? {
                Some(true) => {}
                Some(false) => {
                    if let Some(text) = &action.decline_message {
                        self.show_action_error(&ActionError::Declined(text.clone()), None);
                    }
                    return Ok(PromptOutcome::Stay);
                }
                None => return Ok(PromptOutcome::Aborted),
            }
        }

        match (action.run)(&input) {
            Ok(None) | Ok(Some(true)) => {
                info!(kind = ?action.kind, %input, "action completed");
                Ok(PromptOutcome::ExitSubview)
            }
            Ok(Some(false)) => {
                info!(kind = ?action.kind, %input, "action completed");
                if let Some(text) = action.success_message.clone() {
                    self.show_message(text, Styles::bold());
                }
                Ok(PromptOutcome::Stay)
            }
            Err(e) => {
                warn!(kind = ?action.kind, %input, error = %e, "action failed");
                self.show_action_error(&e, action.valid_max);
                Ok(PromptOutcome::Stay)
            }
        }
    }

    fn set_prompt_line(&mut self, prompt: &str, input: &str) {
        self.message = Some(Message {
            line: Line::from(vec![
                Span::raw("  "),
                Span::styled(prompt.to_string(), Styles::bold()),
                Span::raw(format!(" {}", input)),
            ]),
            until: None,
        });
    }

    fn read_line<B: Backend>(
        &mut self,
        prompt: &str,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
    ) -> Result<Option<String>> {
        let mut editor = LineEditor::default();
        let result = loop {
            self.set_prompt_line(prompt, editor.text());
            self.draw(terminal)?;
            let Some(key) = keys.next_key(KEY_WAIT)? else {
                continue;
            };
            self.idle_since = Instant::now();
            match editor.feed(&key) {
                Edit::Pending => {}
                Edit::Submit(text) => break Some(text),
                Edit::Cancel => break None,
            }
        };
        self.message = None;
        Ok(result)
    }

    fn read_confirmation<B: Backend>(
        &mut self,
        question: &str,
        terminal: &mut Terminal<B>,
        keys: &mut dyn KeySource,
    ) -> Result<Option<bool>> {
        let prompt = format!("{} (Y/n):", question);
        let answer = loop {
            self.set_prompt_line(&prompt, "");
            self.draw(terminal)?;
            let Some(key) = keys.next_key(KEY_WAIT)? else {
                continue;
            };
            if let Some(answer) = confirm_answer(&key) {
                break answer;
            }
        };
        self.message = None;
        Ok(answer)
    }
}

fn error_style() -> Style {
    Styles::bold().fg(Color::Red)
}

/// Writes `snapshot` as pretty JSON to
/// `<dir>/health-snapshot-YYMMDD-HHMMSS.json`.
pub fn export_snapshot(dir: &Path, snapshot: &Snapshot, now: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| DashboardError::File {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("health-snapshot-{}.json", now.format("%y%m%d-%H%M%S")));
    let json = serde_json::to_string_pretty(snapshot).map_err(|source| DashboardError::Json {
        context: "health snapshot".to_string(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| DashboardError::File {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "saved health snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    use std::sync::Arc;

    use crate::error::GENERIC_FAILURE;
    use crate::provider::{LiveProvider, Mailbox};
    use crate::snapshot::{Collection, Row};
    use crate::tui::prompt::parse_item_number;
    use crate::tui::table::{Column, ROW_ID_KEY, Width};

    /// Replays keys; `None` entries are timeouts. Interrupts once exhausted.
    struct ScriptedKeys(VecDeque<Option<KeyEvent>>);

    impl ScriptedKeys {
        fn new(keys: impl IntoIterator<Item = Option<KeyEvent>>) -> Self {
            Self(keys.into_iter().collect())
        }

        fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
    }

    impl KeySource for ScriptedKeys {
        fn next_key(&mut self, _timeout: Duration) -> io::Result<Option<KeyEvent>> {
            Ok(self
                .0
                .pop_front()
                .unwrap_or_else(|| Some(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL))))
        }
    }

    fn ch(c: char) -> Option<KeyEvent> {
        Some(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    fn code(code: KeyCode) -> Option<KeyEvent> {
        Some(KeyEvent::new(code, KeyModifiers::NONE))
    }

    /// Serves queued snapshots, then keeps re-serving the last one.
    struct QueueProvider {
        queue: VecDeque<Snapshot>,
        last: Snapshot,
        calls: usize,
    }

    impl QueueProvider {
        fn new(snapshots: Vec<Snapshot>) -> Self {
            Self {
                queue: snapshots.into(),
                last: Snapshot::empty(),
                calls: 0,
            }
        }
    }

    impl SnapshotProvider for QueueProvider {
        fn get_fresh_data(&mut self) -> Snapshot {
            self.calls += 1;
            if let Some(next) = self.queue.pop_front() {
                self.last = next;
            }
            self.last.clone()
        }

        fn is_live(&self) -> bool {
            true
        }
    }

    fn snapshot(env_name: &str, count: usize) -> Snapshot {
        let mut env = Row::new();
        env.set("EnvironmentName", env_name);
        env.set("Color", "Green");
        let rows = (0..count)
            .map(|i| {
                let mut row = Row::new();
                row.set(ROW_ID_KEY, format!("i-{:02}", i));
                row.set("requests", (count - i) as i64);
                row.set("Color", "Green");
                row
            })
            .collect();
        Snapshot::new(Collection::Instances, env, rows)
    }

    fn tables() -> Vec<Table> {
        vec![
            Table::new(
                "status",
                vec![
                    Column::left("instance-id", Width::Auto, ROW_ID_KEY),
                    Column::right("r/sec", Width::Fixed(6), "requests"),
                ],
            ),
            Table::new(
                "requests",
                vec![
                    Column::left("instance-id", Width::Auto, ROW_ID_KEY),
                    Column::right("r/sec", Width::Fixed(6), "requests"),
                    Column::left("color", Width::Fixed(6), "Color"),
                ],
            ),
        ]
    }

    fn screen_with(flavor: Flavor, state_dir: &Path, actions: ActionRegistry) -> Screen {
        let mut context = DashboardContext::new(flavor, state_dir);
        context.actions = actions;
        Screen::new(
            context,
            tables(),
            Banner::Environments {
                header: "Environments".to_string(),
            },
        )
    }

    fn screen() -> Screen {
        screen_with(Flavor::EnhancedHealth, Path::new(".envmon-test"), ActionRegistry::new())
    }

    fn terminal() -> Terminal<TestBackend> {
        Terminal::new(TestBackend::new(100, 30)).unwrap()
    }

    fn run(
        screen: &mut Screen,
        keys: &mut ScriptedKeys,
        provider: &mut QueueProvider,
    ) -> ExitReason {
        screen.run(&mut terminal(), keys, provider).unwrap()
    }

    #[test]
    fn test_quit_key_exits() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([None, ch('q')]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert_eq!(provider.calls, 2);
    }

    #[test]
    fn test_empty_snapshot_exits_with_no_data() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 3), Snapshot::empty()]);
        let mut keys = ScriptedKeys::new([None, None, None]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::NoData);
        assert_eq!(keys.0.len(), 2);
    }

    #[test]
    fn test_without_refresh_draws_once() {
        let mut screen = screen().with_refresh(false);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut terminal = terminal();
        let mut keys = ScriptedKeys::new([]);
        let reason = screen.run(&mut terminal, &mut keys, &mut provider).unwrap();
        assert_eq!(reason, ExitReason::Quit);
        assert!(keys.is_empty());
        let buffer = terminal.backend().buffer();
        let first: String = (0..buffer.area.width)
            .map(|x| buffer[(x, 0)].symbol().to_string())
            .collect();
        assert!(first.starts_with("Environments"));
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Interrupted);
    }

    #[test]
    fn test_sort_target_moves_and_wraps() {
        let mut screen = screen();
        screen.move_sort(Direction::Forward);
        assert_eq!(screen.sort_state().target, Some(("status", 0)));
        screen.move_sort(Direction::Forward);
        assert_eq!(screen.sort_state().target, Some(("status", 1)));
        screen.move_sort(Direction::Forward);
        assert_eq!(screen.sort_state().target, Some(("requests", 0)));
        screen.move_sort(Direction::Forward);
        screen.move_sort(Direction::Forward);
        assert_eq!(screen.sort_state().target, Some(("requests", 2)));
        screen.move_sort(Direction::Forward);
        assert_eq!(screen.sort_state().target, Some(("status", 0)));
        screen.move_sort(Direction::Backward);
        assert_eq!(screen.sort_state().target, Some(("requests", 2)));
    }

    #[test]
    fn test_first_backward_move_selects_first_column() {
        let mut screen = screen();
        screen.move_sort(Direction::Backward);
        assert_eq!(screen.sort_state().target, Some(("status", 0)));
    }

    #[test]
    fn test_group_change_clears_sort() {
        let mut screen = screen();
        screen.move_sort(Direction::Forward);
        screen.turn_on_table("split");
        assert!(screen.sort_state().target.is_some());
        screen.turn_on_table("requests");
        assert_eq!(screen.sort_state().target, None);
        let visible: Vec<&str> = screen.tables().iter().filter(|t| t.visible).map(|t| t.name).collect();
        assert_eq!(visible, ["requests"]);
    }

    #[test]
    fn test_help_does_not_clear_sort() {
        let mut screen = screen();
        screen.move_sort(Direction::Forward);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('h'), ch('q'), ch('q')]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert!(keys.is_empty());
        assert!(!screen.help_visible());
        assert_eq!(screen.sort_state().target, Some(("status", 0)));
    }

    #[test]
    fn test_sort_descending_by_column() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 4)]);
        // target status/r-sec, ascending
        let mut keys = ScriptedKeys::new([ch('>'), ch('>'), ch('+'), None, ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        let ids: Vec<&str> = screen.snapshot().rows.iter().filter_map(|r| r.text(ROW_ID_KEY)).collect();
        assert_eq!(ids, ["i-03", "i-02", "i-01", "i-00"]);

        let mut keys = ScriptedKeys::new([ch('-'), None, ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        let ids: Vec<&str> = screen.snapshot().rows.iter().filter_map(|r| r.text(ROW_ID_KEY)).collect();
        assert_eq!(ids, ["i-00", "i-01", "i-02", "i-03"]);
    }

    #[test]
    fn test_scroll_keeps_tables_in_sync() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 40)]);
        let mut keys = ScriptedKeys::new([code(KeyCode::Down), code(KeyCode::Down), ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        let offsets: Vec<usize> = screen.tables().iter().map(|t| t.vertical_offset).collect();
        assert_eq!(offsets, [2, 2]);

        let mut keys = ScriptedKeys::new([code(KeyCode::End), ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        assert!(screen.tables().iter().all(|t| t.vertical_offset == t.max_offset()));
    }

    #[test]
    fn test_freeze_keeps_draining() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![
            snapshot("first", 2),
            snapshot("second", 2),
            snapshot("third", 2),
        ]);
        let mut keys = ScriptedKeys::new([ch('f'), None, ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        assert!(screen.is_frozen());
        assert!(provider.queue.is_empty());
        assert_eq!(screen.snapshot().environment.text("EnvironmentName"), Some("first"));

        let mut keys = ScriptedKeys::new([ch('f'), ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        assert_eq!(screen.snapshot().environment.text("EnvironmentName"), Some("third"));
    }

    #[test]
    fn test_snapshot_export_writes_displayed_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut screen = screen_with(Flavor::EnhancedHealth, dir.path(), ActionRegistry::new());
        let mut provider = QueueProvider::new(vec![snapshot("web-prod", 3)]);
        let mut keys = ScriptedKeys::new([ch('p'), ch('q')]);
        run(&mut screen, &mut keys, &mut provider);

        let files: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("health-snapshot-") && name.ends_with(".json"));
        assert_eq!(name.len(), "health-snapshot-YYMMDD-HHMMSS.json".len());

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(value["environment"]["EnvironmentName"], "web-prod");
        assert_eq!(value["instances"].as_array().unwrap().len(), 3);
        assert!(screen.message_text().unwrap().contains("Snapshot file saved at: "));
    }

    #[test]
    fn test_snapshot_export_keeps_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let refreshed = Utc::now() - chrono::Duration::seconds(4);
        let mut snapshot = snapshot("web-prod", 2);
        snapshot.environment.set("RefreshedAt", refreshed);
        snapshot.environment.set("Causes", vec!["50.0 % of the requests are failing".to_string()]);
        snapshot.rows[0].set("LaunchedAt", refreshed - chrono::Duration::hours(3));
        snapshot.rows[0].set("load1", 0.25);
        snapshot.rows[1].set("Causes", vec!["Disk full".to_string(), "CPU at 97%".to_string()]);
        snapshot.rows[1].set("Deployed", true);

        let path = export_snapshot(dir.path(), &snapshot, Local::now()).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, serde_json::to_value(&snapshot).unwrap());
        assert!(written["environment"]["RefreshedAt"].is_string());
        assert_eq!(written["instances"][0]["load1"], 0.25);
        assert_eq!(written["instances"][1]["Causes"][1], "CPU at 97%");
    }

    #[test]
    fn test_help_overlay_scrolls() {
        let mut screen = screen();
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut terminal = Terminal::new(TestBackend::new(80, 16)).unwrap();

        let mut keys = ScriptedKeys::new([ch('h'), code(KeyCode::Down)]);
        let reason = screen.run(&mut terminal, &mut keys, &mut provider).unwrap();
        assert_eq!(reason, ExitReason::Interrupted);
        assert!(screen.help_visible());
        assert_eq!(screen.help.vertical_offset, 1);

        let mut keys = ScriptedKeys::new([code(KeyCode::End)]);
        screen.run(&mut terminal, &mut keys, &mut provider).unwrap();
        assert!(screen.help.vertical_offset > 1);
        assert_eq!(screen.help.vertical_offset, screen.help.max_offset());

        let mut keys = ScriptedKeys::new([code(KeyCode::Up), code(KeyCode::Home)]);
        screen.run(&mut terminal, &mut keys, &mut provider).unwrap();
        assert_eq!(screen.help.vertical_offset, 0);

        // Reopening the overlay starts from the top.
        let mut keys = ScriptedKeys::new([code(KeyCode::End), ch('q'), ch('h')]);
        screen.run(&mut terminal, &mut keys, &mut provider).unwrap();
        assert!(screen.help_visible());
        assert_eq!(screen.help.vertical_offset, 0);
    }

    #[test]
    fn test_interrupt_while_waiting_for_first_snapshot() {
        let mailbox = Arc::new(Mailbox::new());
        let mut provider = LiveProvider::from_mailbox(Arc::clone(&mailbox));
        let mut screen = screen();
        let mut keys = ScriptedKeys::new([None, ch('x')]);
        let reason = screen.run(&mut terminal(), &mut keys, &mut provider).unwrap();
        assert_eq!(reason, ExitReason::Interrupted);
        assert!(keys.is_empty());
        assert!(screen.snapshot().is_empty());
    }

    #[test]
    fn test_quit_while_waiting_for_first_snapshot() {
        let mailbox = Arc::new(Mailbox::<Snapshot>::new());
        let mut provider = LiveProvider::from_mailbox(mailbox);
        let mut screen = screen();
        let mut keys = ScriptedKeys::new([ch('q')]);
        let reason = screen.run(&mut terminal(), &mut keys, &mut provider).unwrap();
        assert_eq!(reason, ExitReason::Quit);
    }

    #[test]
    fn test_message_lands_on_message_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut screen = screen_with(Flavor::EnhancedHealth, dir.path(), ActionRegistry::new());
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('p'), ch('q')]);
        run(&mut screen, &mut keys, &mut provider);
        let lines = screen.compose(100, 30, Utc::now());
        assert!(line_text(&lines[4]).starts_with("  Snapshot file saved at: "));
    }

    fn recording_action(kind: ActionKind, log: Rc<RefCell<Vec<String>>>) -> Action {
        Action::new(kind, "instance-ID to reboot:", move |input: &str| {
            log.borrow_mut().push(input.to_string());
            Ok(None)
        })
    }

    #[test]
    fn test_prompt_runs_action_and_exits() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut actions = ActionRegistry::new();
        actions.register(recording_action(ActionKind::Reboot, log.clone()));
        let mut screen = screen_with(Flavor::EnhancedHealth, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([
            ch('b'),
            ch('i'),
            None,
            ch('-'),
            ch('1'),
            ch('x'),
            code(KeyCode::Backspace),
            code(KeyCode::Enter),
        ]);
        assert_eq!(
            run(&mut screen, &mut keys, &mut provider),
            ExitReason::ActionCompleted(ActionKind::Reboot)
        );
        assert_eq!(*log.borrow(), ["i-1"]);
    }

    #[test]
    fn test_prompt_escape_and_empty_input_abort() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut actions = ActionRegistry::new();
        actions.register(recording_action(ActionKind::Replace, log.clone()));
        let mut screen = screen_with(Flavor::EnhancedHealth, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([
            ch('x'),
            ch('i'),
            code(KeyCode::Esc),
            ch('x'),
            code(KeyCode::Enter),
            ch('q'),
        ]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert!(log.borrow().is_empty());
        assert_eq!(screen.message_text(), None);
    }

    #[test]
    fn test_unrecognized_failure_shows_generic_message() {
        let mut actions = ActionRegistry::new();
        actions.register(Action::new(ActionKind::Reboot, "instance-ID to reboot:", |_| {
            Err(ActionError::Other("socket closed".to_string()))
        }));
        let mut screen = screen_with(Flavor::EnhancedHealth, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('b'), ch('1'), code(KeyCode::Enter), ch('q')]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert_eq!(screen.message_text().as_deref(), Some(format!("  {}", GENERIC_FAILURE).as_str()));
    }

    #[test]
    fn test_number_errors_show_range_hint() {
        let mut actions = ActionRegistry::new();
        actions.register(
            Action::new(ActionKind::Restore, "Enter a environment # to restore. ESC to exit.", |_| {
                Ok(None)
            })
            .with_confirm(|input| parse_item_number(input, 12).map(|n| format!("Restore #{}?", n)), None)
            .with_valid_max(12),
        );
        let mut screen = screen_with(Flavor::Environments, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('r'), ch('4'), ch('0'), code(KeyCode::Enter), ch('q')]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert_eq!(
            screen.message_text().as_deref(),
            Some("  Enter a number between 1 and 12.")
        );
    }

    #[test]
    fn test_declined_confirmation_stays() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let recorded = log.clone();
        let mut actions = ActionRegistry::new();
        actions.register(
            Action::new(ActionKind::Restore, "Enter a environment # to restore. ESC to exit.", move |input: &str| {
                recorded.borrow_mut().push(input.to_string());
                Ok(None)
            })
            .with_confirm(|_| Ok("Restore this environment?".to_string()), Some("Environment will not be restored")),
        );
        let mut screen = screen_with(Flavor::Environments, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('r'), ch('2'), code(KeyCode::Enter), None, ch('n'), code(KeyCode::Esc)]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert!(log.borrow().is_empty());
        assert_eq!(
            screen.message_text().as_deref(),
            Some("  Environment will not be restored")
        );
    }

    #[test]
    fn test_staying_action_shows_success_message() {
        let mut actions = ActionRegistry::new();
        actions.register(
            Action::new(ActionKind::Lifecycle, "Max versions to keep:", |_| Ok(Some(false)))
                .with_success_message("Successfully updated application version lifecycle policy"),
        );
        let mut screen = screen_with(Flavor::Versions, Path::new("."), actions);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        let mut keys = ScriptedKeys::new([ch('l'), ch('5'), code(KeyCode::Enter), ch('q')]);
        assert_eq!(run(&mut screen, &mut keys, &mut provider), ExitReason::Quit);
        assert_eq!(
            screen.message_text().as_deref(),
            Some("  Successfully updated application version lifecycle policy")
        );
    }

    #[test]
    fn test_help_overlay_replaces_tables() {
        let mut screen = screen();
        screen.turn_on_table(HELP_GROUP);
        let mut provider = QueueProvider::new(vec![snapshot("web", 3)]);
        screen.get_data(&mut provider);
        let lines = screen.compose(100, 40, Utc::now());
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert!(texts.iter().any(|t| t.contains("Freeze/unfreeze data")));
        assert!(!texts.iter().any(|t| t.contains("i-00")));
        assert_eq!(texts.last().map(String::as_str), Some("(press Q or ESC to exit)"));
    }
}
