//! Column/table model and the text-grid renderer.
//!
//! Each table renders itself into a handful of [`Line`]s per cycle: a
//! reverse-video header, an optional synthetic "Overall" row, the visible
//! window of data rows and a one-line scroll indicator.

use std::collections::HashSet;
use std::iter;

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::snapshot::Row;

use super::style::Styles;

/// Field holding the stable identity of a row.
pub const ROW_ID_KEY: &str = "InstanceId";
/// Identity of the synthetic aggregate row.
pub const OVERALL_ID: &str = "  Overall";

const HEADER_SPACE_NEEDED: usize = 16;
const HEADER_WIDTH: usize = 11;
const MAX_DESCRIPTION: usize = 100;
const CAUSE_SCROLL_FACTOR: usize = 5;
const DOWN_ARROW: char = '▼';
const UP_ARROW: char = '▲';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
    /// Pads like `Left` but never trims.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Fixed(usize),
    /// Widest visible cell (or header) plus two.
    Auto,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub width: Width,
    pub key: &'static str,
    pub justify: Justify,
    pub sort_key: &'static str,
    fit_size: usize,
}

impl Column {
    pub fn new(name: &'static str, width: Width, key: &'static str, justify: Justify) -> Self {
        let fit_size = match width {
            Width::Fixed(n) => n,
            Width::Auto => 0,
        };
        Self {
            name,
            width,
            key,
            justify,
            sort_key: key,
            fit_size,
        }
    }

    pub fn left(name: &'static str, width: Width, key: &'static str) -> Self {
        Self::new(name, width, key, Justify::Left)
    }

    pub fn right(name: &'static str, width: Width, key: &'static str) -> Self {
        Self::new(name, width, key, Justify::Right)
    }

    /// Sorts on `sort_key` instead of the displayed field.
    pub fn sorted_by(mut self, sort_key: &'static str) -> Self {
        self.sort_key = sort_key;
        self
    }

    fn size(&self) -> usize {
        match self.width {
            Width::Fixed(n) => n,
            Width::Auto => self.fit_size,
        }
    }
}

/// Pads `text` to `size` and trims it unless `justify` is `None`.
///
/// A `Description` column that overflows ends in `▶`; once shifted it also
/// starts with `◀`.
pub fn justify_and_trim(
    text: &str,
    size: usize,
    justify: Justify,
    key: Option<&str>,
    shift_col: usize,
) -> String {
    let pad = " ".repeat(size.saturating_sub(text.chars().count()));
    let mut s = match justify {
        Justify::Right => format!("{}{}", pad, text),
        Justify::Left | Justify::None => format!("{}{}", text, pad),
    };
    if justify != Justify::Right && key == Some("Description") {
        if s.chars().count() > size {
            s = s
                .chars()
                .take(size.saturating_sub(1))
                .chain(iter::once('▶'))
                .collect();
        }
        if shift_col > 0 {
            s = iter::once('◀').chain(s.chars().skip(1)).collect();
        }
    }
    if justify == Justify::None {
        return s;
    }
    s.chars().take(size).collect()
}

/// Row-production variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Plain,
    /// Adds an always-visible Overall row built from the environment entry.
    Request,
    /// `Request` plus one continuation row per extra cause.
    Status,
    /// Static keybinding rows; snapshot data is ignored.
    Help,
}

/// Screen-wide state a table reads while drawing.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub width: usize,
    pub horizontal_offset: usize,
    /// Column count of the widest visible table, minus the swatch column.
    pub max_columns: usize,
    pub mono: bool,
    /// Active sort target as (table name, column index).
    pub sort: Option<(&'a str, usize)>,
    pub environment: &'a Row,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: &'static str,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    pub visible: bool,
    pub vertical_offset: usize,
    /// Horizontal text shift inside the `Description` column.
    pub shift_col: usize,
    visible_rows: usize,
    first_column: usize,
    data: Vec<Row>,
}

impl Table {
    pub fn new(name: &'static str, columns: Vec<Column>) -> Self {
        Self::with_kind(name, TableKind::Plain, columns)
    }

    pub fn with_kind(name: &'static str, kind: TableKind, columns: Vec<Column>) -> Self {
        Self {
            name,
            kind,
            columns,
            visible: true,
            vertical_offset: 0,
            shift_col: 0,
            visible_rows: 0,
            first_column: 0,
            data: Vec::new(),
        }
    }

    /// A hidden help table holding `rows`.
    pub fn help(rows: Vec<Row>) -> Self {
        let mut table = Self::with_kind(
            "help",
            TableKind::Help,
            vec![
                Column::new("Key", Width::Fixed(18), "key", Justify::None),
                Column::new("Action", Width::Fixed(0), "action", Justify::None),
            ],
        );
        table.visible = false;
        table.data = rows;
        table
    }

    /// Header lines the table needs besides data rows and the info line.
    pub fn header_size(&self) -> usize {
        match self.kind {
            TableKind::Plain | TableKind::Help => 2,
            TableKind::Request | TableKind::Status => 3,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.data
    }

    /// Renders the table into lines, storing `rows` as its current data.
    pub fn draw(&mut self, visible_rows: usize, rows: &[Row], ctx: &RenderContext) -> Vec<Line<'static>> {
        if !self.visible {
            return Vec::new();
        }
        match self.kind {
            TableKind::Help => {}
            TableKind::Status => self.data = expand_rows(rows, ctx.environment),
            TableKind::Plain | TableKind::Request => self.data = rows.to_vec(),
        }
        self.visible_rows = visible_rows;
        self.clamp_offset();
        self.first_column = (ctx.horizontal_offset + 1).min(self.columns.len().saturating_sub(1));

        let mut lines = Vec::with_capacity(visible_rows + self.header_size());
        lines.push(self.header_line(ctx));
        if matches!(self.kind, TableKind::Request | TableKind::Status) {
            let mut total = ctx.environment.clone();
            total.set(ROW_ID_KEY, OVERALL_ID);
            lines.push(self.row_line(&total, ctx));
        }
        for r in self.first_row_index()..self.last_row_index() {
            lines.push(self.row_line(&self.data[r], ctx));
        }
        lines.push(self.info_line());
        lines
    }

    fn rendered_columns(&self) -> impl Iterator<Item = usize> + use<> {
        iter::once(0).chain(self.first_column.max(1)..self.columns.len())
    }

    fn header_line(&mut self, ctx: &RenderContext) -> Line<'static> {
        let mut spans = vec![Span::styled(" ", Styles::header())];
        let mut plain = String::from(" ");
        for c in self.rendered_columns() {
            if self.columns[c].width == Width::Auto {
                let mut size = self.widest_in_column(c) + 2;
                if self.columns[c].name == "Description" {
                    size = size.min(MAX_DESCRIPTION);
                }
                self.columns[c].fit_size = size;
            }
            let column = &self.columns[c];
            let on_screen = plain.chars().count() < ctx.width;
            let is_sort = on_screen && ctx.sort == Some((self.name, c));
            let label = justify_and_trim(column.name, column.size(), column.justify, None, 0);
            plain.push(' ');
            plain.push_str(&label);
            spans.push(Span::styled(" ", Styles::header()));
            let style = if is_sort { Styles::sort_column() } else { Styles::header() };
            spans.push(Span::styled(label, style));
        }

        let len = plain.chars().count();
        let mut spans = fit_spans(spans, ctx.width);
        if len < ctx.width {
            spans.push(Span::styled(" ".repeat(ctx.width - len), Styles::header()));
        }
        let fitted: String = plain.chars().chain(iter::repeat(' ')).take(ctx.width).collect();
        let trailing = fitted.chars().rev().take_while(|c| *c == ' ').count();
        if ctx.width >= HEADER_SPACE_NEEDED && trailing >= HEADER_SPACE_NEEDED {
            let mut spans = fit_spans(spans, ctx.width - HEADER_SPACE_NEEDED);
            spans.push(Span::styled("  ", Styles::header()));
            spans.push(Span::styled(
                format!(" {} ", justify_and_trim(self.name, HEADER_WIDTH, Justify::Right, None, 0)),
                Styles::badge(),
            ));
            spans.push(Span::styled(" ", Styles::header()));
            return Line::from(spans);
        }
        Line::from(spans)
    }

    fn row_line(&self, row: &Row, ctx: &RenderContext) -> Line<'static> {
        let color = row.text("Color").unwrap_or("");
        let swatch = if ctx.mono {
            Span::raw(color.chars().next().unwrap_or(' ').to_string())
        } else {
            Span::styled(" ", Styles::swatch(color))
        };
        let overall = row.text(ROW_ID_KEY).is_some_and(|id| id.contains("Overall"));
        let base = if overall { Styles::overall() } else { Style::default() };

        let mut spans = vec![swatch];
        for c in self.rendered_columns() {
            let column = &self.columns[c];
            let style = match self.kind {
                TableKind::Help if c == 0 && row.flag("section") => Styles::underlined(),
                TableKind::Help if c == 0 => Styles::bold(),
                _ => base,
            };
            spans.push(Span::styled(" ", base));
            spans.push(Span::styled(self.cell_text(row, column, ctx), style));
        }
        Line::from(fit_spans(spans, ctx.width))
    }

    fn cell_text(&self, row: &Row, column: &Column, ctx: &RenderContext) -> String {
        let size = column.size();
        if self.kind == TableKind::Status {
            let mut text = if row.flag("Copy") && column.key != "Cause" {
                " ".to_string()
            } else {
                row.display(column.key)
            };
            if column.key == "Cause" && ctx.horizontal_offset > ctx.max_columns {
                let skip = (ctx.horizontal_offset - ctx.max_columns) * CAUSE_SCROLL_FACTOR;
                text = text.chars().skip(skip).collect();
            }
            return justify_and_trim(&text, size, column.justify, None, 0);
        }
        let mut text = row.display(column.key);
        if column.key == "Description" && self.shift_col > 0 {
            text = text.chars().skip(self.shift_col).collect();
        }
        justify_and_trim(&text, size, column.justify, Some(column.key), self.shift_col)
    }

    fn info_line(&self) -> Line<'static> {
        let mut line = String::from(" ");
        if self.last_row_index() < self.data.len() {
            line.push(' ');
            line.push(DOWN_ARROW);
        } else {
            line.push_str("  ");
        }
        if self.first_row_index() != 0 {
            line.push(' ');
            line.push(UP_ARROW);
        }
        Line::raw(line)
    }

    /// Widest rendered cell of column `c` over the visible window.
    pub fn widest_in_column(&self, c: usize) -> usize {
        let column = &self.columns[c];
        (self.first_row_index()..self.last_row_index())
            .map(|r| self.data[r].display(column.key).chars().count())
            .fold(column.name.chars().count(), usize::max)
    }

    fn first_row_index(&self) -> usize {
        self.vertical_offset
    }

    fn last_row_index(&self) -> usize {
        self.data.len().min(self.visible_rows + self.vertical_offset)
    }

    pub fn max_offset(&self) -> usize {
        self.data.len().saturating_sub(self.visible_rows)
    }

    fn clamp_offset(&mut self) {
        self.vertical_offset = self.vertical_offset.min(self.max_offset());
    }

    fn row_id(&self, index: usize) -> Option<String> {
        self.data
            .get(index)
            .and_then(|r| r.text(ROW_ID_KEY))
            .map(str::to_string)
    }

    pub fn visible_row_ids(&self) -> HashSet<String> {
        (self.first_row_index()..self.last_row_index())
            .map(|r| self.row_id(r).unwrap_or_default())
            .collect()
    }

    /// Scrolls one row. Returns the identity of the row that came into view
    /// if it differs from the one that went out.
    pub fn scroll_down(&mut self, reverse: bool) -> Option<String> {
        let (last_id, new_id) = if reverse && self.vertical_offset > 0 {
            let last_id = self.row_id(self.first_row_index());
            self.vertical_offset -= 1;
            (last_id, self.row_id(self.first_row_index()))
        } else if !reverse && self.vertical_offset < self.max_offset() {
            let last_id = self.row_id(self.last_row_index().saturating_sub(1));
            self.vertical_offset += 1;
            (last_id, self.row_id(self.last_row_index().saturating_sub(1)))
        } else {
            return None;
        };
        if new_id != last_id { new_id } else { None }
    }

    /// Scrolls in one direction until a row with identity `id` is visible
    /// or the table cannot scroll further.
    pub fn scroll_to_id(&mut self, id: &str, reverse: bool) {
        if self.visible_row_ids().contains(id) {
            return;
        }
        while let Some(new_id) = self.scroll_down(reverse) {
            if new_id == id {
                return;
            }
        }
    }

    pub fn scroll_to_end(&mut self) {
        self.vertical_offset = self.max_offset();
    }

    pub fn scroll_to_beginning(&mut self) {
        self.vertical_offset = 0;
    }
}

/// Expands rows with several causes into one continuation row per extra
/// cause, starting with the environment's own extra causes.
pub fn expand_rows(rows: &[Row], environment: &Row) -> Vec<Row> {
    let mut expanded = Vec::with_capacity(rows.len());
    let mut total = environment.clone();
    total.set(ROW_ID_KEY, OVERALL_ID);
    push_continuations(&mut expanded, &total);
    for row in rows {
        expanded.push(row.clone());
        push_continuations(&mut expanded, row);
    }
    expanded
}

fn push_continuations(out: &mut Vec<Row>, row: &Row) {
    for cause in row.list("Causes").iter().skip(1) {
        let mut copy = row.clone();
        copy.set("Cause", cause.as_str());
        copy.set("Copy", true);
        out.push(copy);
    }
}

/// Truncates styled spans to `width` characters.
fn fit_spans(spans: Vec<Span<'static>>, width: usize) -> Vec<Span<'static>> {
    let mut remaining = width;
    let mut out = Vec::with_capacity(spans.len());
    for span in spans {
        if remaining == 0 {
            break;
        }
        let len = span.content.chars().count();
        if len <= remaining {
            remaining -= len;
            out.push(span);
        } else {
            let text: String = span.content.chars().take(remaining).collect();
            out.push(Span::styled(text, span.style));
            remaining = 0;
        }
    }
    out
}

/// Plain text of a rendered line.
pub fn line_text(line: &Line) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}
