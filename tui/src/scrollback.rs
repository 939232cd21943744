//! Styled scrollback output inserted above the inline viewport.

use ratatui::prelude::{Backend, Terminal};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget, Wrap};
use tern_engine::ScrollbackEntry;
use tern_types::{PermissionVerdict, TodoStatus};
use tern_utils::EditLine;

use crate::markdown::render_markdown;
use crate::theme::{Palette, styles};

/// Lines for one scrollback entry, before wrapping.
#[must_use]
pub fn entry_lines(entry: &ScrollbackEntry, palette: &Palette) -> Vec<Line<'static>> {
    match entry {
        ScrollbackEntry::UserEcho(text) => prefixed(text, "> ", styles::user_echo(palette), styles::text(palette)),
        ScrollbackEntry::Queued(text) => {
            let mut lines = prefixed(text, "> ", styles::dim(palette), styles::dim(palette));
            if let Some(last) = lines.last_mut() {
                last.push_span(Span::styled(
                    " (queued)",
                    styles::dim(palette).add_modifier(Modifier::ITALIC),
                ));
            }
            lines
        }
        ScrollbackEntry::Assistant(markdown) => {
            let mut lines = render_markdown(markdown, palette);
            if let Some(first) = lines.first_mut() {
                first.spans.insert(0, Span::styled("⏺ ", Style::default().fg(palette.text)));
                for line in lines.iter_mut().skip(1) {
                    line.spans.insert(0, Span::raw("  "));
                }
            }
            lines
        }
        ScrollbackEntry::ToolCall {
            name,
            summary,
            diff,
        } => {
            let mut head = vec![
                Span::styled("⏺ ", Style::default().fg(palette.success)),
                Span::styled(name.clone(), styles::tool_name(palette)),
            ];
            if !summary.is_empty() {
                head.push(Span::styled(format!(" {summary}"), styles::dim(palette)));
            }
            let mut lines = vec![Line::from(head)];
            lines.extend(diff.iter().map(|edit| {
                let color = match edit {
                    EditLine::Removed(_) => palette.removed,
                    EditLine::Added(_) => palette.added,
                };
                Line::from(vec![
                    Span::raw("  "),
                    Span::styled(edit.display(), Style::default().fg(color)),
                ])
            }));
            lines
        }
        ScrollbackEntry::PermissionOutcome { tool, verdict } => {
            let (mark, word, color) = match verdict {
                PermissionVerdict::Allow => ("✓", "allowed", palette.success),
                PermissionVerdict::AlwaysAllow => ("✓", "always allowed", palette.success),
                PermissionVerdict::Deny => ("✗", "denied", palette.error),
            };
            vec![Line::from(vec![
                Span::styled(tool.clone(), styles::tool_name(palette)),
                Span::styled(format!(" {mark} {word}"), Style::default().fg(color)),
            ])]
        }
        ScrollbackEntry::AskUserSummary(pairs) => pairs
            .iter()
            .map(|(question, answer)| {
                Line::from(vec![
                    Span::styled(format!("· {question} → "), styles::dim(palette)),
                    Span::styled(answer.clone(), styles::text(palette).add_modifier(Modifier::BOLD)),
                ])
            })
            .collect(),
        ScrollbackEntry::Todos(items) => items
            .iter()
            .map(|item| {
                let style = match item.status {
                    TodoStatus::Completed => styles::dim(palette).add_modifier(Modifier::CROSSED_OUT),
                    TodoStatus::InProgress => styles::text(palette).add_modifier(Modifier::BOLD),
                    TodoStatus::Pending => styles::text(palette),
                };
                Line::from(vec![
                    Span::styled(format!("{} ", item.status.glyph()), style),
                    Span::styled(item.content.clone(), style),
                ])
            })
            .collect(),
        ScrollbackEntry::Info(text) => plain(text, styles::text(palette)),
        ScrollbackEntry::Dim(text) => plain(text, styles::dim(palette)),
        ScrollbackEntry::Corrected { .. } => plain(&entry.plain_text(), styles::dim(palette)),
        ScrollbackEntry::Warning(_) => plain(&entry.plain_text(), styles::warning(palette)),
        ScrollbackEntry::Error(_) => plain(&entry.plain_text(), styles::error(palette)),
    }
}

fn plain(text: &str, style: Style) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| Line::styled(line.to_string(), style))
        .collect()
}

/// First line gets `marker`; continuation lines are indented to match.
fn prefixed(text: &str, marker: &str, marker_style: Style, style: Style) -> Vec<Line<'static>> {
    let indent = " ".repeat(marker.chars().count());
    text.lines()
        .enumerate()
        .map(|(i, line)| {
            let lead = if i == 0 {
                Span::styled(marker.to_string(), marker_style)
            } else {
                Span::raw(indent.clone())
            };
            Line::from(vec![lead, Span::styled(line.to_string(), style)])
        })
        .collect()
}

/// Terminal rows `lines` occupy when wrapped to `width`.
#[must_use]
pub fn wrapped_line_count(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| match line.width() {
            0 => 1,
            w => (w - 1) / width + 1,
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Inserts rendered entries above the inline viewport.
#[derive(Debug, Default)]
pub struct ScrollbackWriter {
    printed: usize,
}

impl ScrollbackWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries written so far.
    #[must_use]
    pub fn printed(&self) -> usize {
        self.printed
    }

    pub fn print<B>(
        &mut self,
        terminal: &mut Terminal<B>,
        entry: &ScrollbackEntry,
        palette: &Palette,
    ) -> Result<(), B::Error>
    where
        B: Backend,
    {
        let lines = entry_lines(entry, palette);
        if lines.is_empty() {
            return Ok(());
        }
        let width = terminal.size()?.width.max(1);
        let height = wrapped_line_count(&lines, width);
        terminal.insert_before(height, |buf| {
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .render(buf.area, buf);
        })?;
        self.printed += 1;
        Ok(())
    }
}
