//! Frame rendering.

use ratatui::Frame;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;

/// Draws the composed screen lines over the whole frame. Lines wider than
/// the frame are clipped.
pub fn render(frame: &mut Frame, lines: Vec<Line<'static>>) {
    let area = frame.area();
    frame.render_widget(Paragraph::new(lines), area);
}
