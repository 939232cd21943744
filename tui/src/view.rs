//! The live region: everything below the scrollback, redrawn after every
//! message.
//!
//! Every function here reads the model and returns lines; nothing mutates.

use std::time::Duration;

use chrono::Utc;
use ratatui::Frame;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Wrap};
use tern_engine::ui::{
    AskUserPrompt, ConfigPanel, DETAIL_ROWS, DiffViewMode, DiffViewer, HelpScreen, HelpTab,
    ItemKind, ModelPicker, OTHER_LABEL, PermissionPrompt, ResumePicker, TextInput, help_lines,
    help_viewport, session_line, viewport_height,
};
use tern_engine::{Mode, ModeState, Model, format_tokens};
use tern_types::{
    PermissionMode, TodoStatus, context_window_for, display_name_for, strip_control,
    truncate_with_ellipsis,
};
use unicode_segmentation::UnicodeSegmentation;

use crate::scrollback::wrapped_line_count;
use crate::theme::{Palette, styles};

const QUEUE_PREVIEW_CHARS: usize = 60;

pub const CTRL_C_HINT: &str = "Press Ctrl-C again to exit";

#[must_use]
pub fn live_lines(model: &Model, palette: &Palette) -> Vec<Line<'static>> {
    let width = usize::from(model.width().max(1));
    match model.mode_state() {
        ModeState::Input | ModeState::Streaming => prompt_view(model, palette, width),
        ModeState::Permission(prompt) => permission_view(prompt, palette, width),
        ModeState::AskUser(prompt) => ask_user_view(prompt, palette, width),
        ModeState::Resume(picker) => resume_view(picker, palette),
        ModeState::ModelPicker(picker) => model_picker_view(picker, model.model_name(), palette),
        ModeState::Diff(viewer) => diff_view(viewer, palette, width),
        ModeState::Config(panel) => config_view(panel, model.height(), palette),
        ModeState::Help(screen) => help_view(screen, model, palette, width),
    }
}

/// Rows the live region needs at `width`, capped to leave one row of
/// scrollback visible.
#[must_use]
pub fn live_height(model: &Model, palette: &Palette, width: u16) -> u16 {
    let rows = wrapped_line_count(&live_lines(model, palette), width);
    let cap = model.height().saturating_sub(1).max(1);
    rows.clamp(1, cap)
}

pub fn draw(frame: &mut Frame, model: &Model, palette: &Palette) {
    let area = frame.area();
    frame.render_widget(Clear, area);
    let lines = live_lines(model, palette);
    let rows = wrapped_line_count(&lines, area.width);
    // Keep the bottom (input and footer) in view when the region overflows.
    let offset = rows.saturating_sub(area.height);
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((offset, 0)),
        area,
    );
}

fn rule(width: usize, palette: &Palette) -> Line<'static> {
    Line::styled("─".repeat(width), Style::default().fg(palette.border))
}

fn hint(text: impl Into<String>, palette: &Palette) -> Line<'static> {
    Line::styled(text.into(), styles::key_hint(palette))
}

fn cursor_row(selected: bool, text: String, palette: &Palette) -> Line<'static> {
    if selected {
        Line::from(vec![
            Span::styled("❯ ", Style::default().fg(palette.accent)),
            Span::styled(text, styles::selected(palette)),
        ])
    } else {
        Line::from(vec![Span::raw("  "), Span::styled(text, styles::text(palette))])
    }
}

fn prompt_view(model: &Model, palette: &Palette, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if model.mode() == Mode::Streaming {
        let text = model.streaming_text();
        if !text.is_empty() {
            // The tail only; the full text is printed when the block ends.
            let budget = usize::from(model.height()).saturating_sub(10).max(3);
            let all: Vec<&str> = text.lines().collect();
            let start = all.len().saturating_sub(budget);
            for (i, line) in all[start..].iter().enumerate() {
                let lead = if start == 0 && i == 0 { "⏺ " } else { "  " };
                lines.push(Line::from(vec![
                    Span::raw(lead),
                    Span::styled((*line).to_string(), styles::text(palette)),
                ]));
            }
        }
    }

    if let Some(line) = spinner_line(model, palette) {
        lines.push(line);
    }

    for queued in model.queue().iter() {
        lines.push(Line::from(vec![
            Span::styled("  ⧗ ", styles::dim(palette)),
            Span::styled(
                truncate_with_ellipsis(queued, QUEUE_PREVIEW_CHARS),
                styles::dim(palette).add_modifier(Modifier::ITALIC),
            ),
        ]));
    }

    lines.push(rule(width, palette));
    lines.extend(input_lines(model.input(), palette));
    lines.push(rule(width, palette));

    if !model.completions().is_empty() {
        lines.extend(completion_lines(model, palette));
    } else if model.ctrl_c_pending() {
        lines.push(hint(CTRL_C_HINT, palette));
    } else {
        lines.extend(footer(model, palette));
    }
    lines
}

fn spinner_line(model: &Model, palette: &Palette) -> Option<Line<'static>> {
    let label = if model.mode() == Mode::Streaming {
        let todo = model
            .todos()
            .iter()
            .find(|t| t.status == TodoStatus::InProgress && !t.active_form.is_empty())
            .map(|t| format!("{}…", t.active_form));
        model
            .active_tool()
            .map(str::to_string)
            .or(todo)
            .unwrap_or_else(|| "Thinking…".to_string())
    } else if model.is_diff_loading() {
        "Loading diff...".to_string()
    } else {
        return None;
    };

    let mut spans = vec![
        Span::styled(format!("{} ", model.spinner().frame()), Style::default().fg(palette.brand)),
        Span::styled(label, Style::default().fg(palette.brand)),
    ];
    if model.mode() == Mode::Streaming {
        let elapsed = model.turn_elapsed().unwrap_or(Duration::ZERO).as_secs();
        spans.push(Span::styled(
            format!(" ({elapsed}s · esc to clear queue · ctrl+c to interrupt)"),
            styles::dim(palette),
        ));
    }
    Some(Line::from(spans))
}

/// The editor with a block cursor. Continuation lines are indented under the
/// `> ` prompt.
fn input_lines(input: &TextInput, palette: &Palette) -> Vec<Line<'static>> {
    let text_style = styles::text(palette);
    let cursor_style = text_style.add_modifier(Modifier::REVERSED);
    let show_cursor = input.cursor_visible();

    if input.is_empty() {
        let placeholder = input.placeholder().to_string();
        let mut spans = vec![Span::styled("> ", styles::dim(palette))];
        let mut graphemes = placeholder.graphemes(true);
        if show_cursor {
            let first = graphemes.next().unwrap_or(" ").to_string();
            spans.push(Span::styled(first, styles::dim(palette).add_modifier(Modifier::REVERSED)));
        }
        spans.push(Span::styled(graphemes.collect::<String>(), styles::dim(palette)));
        return vec![Line::from(spans)];
    }

    let text = input.text();
    let split = input.byte_index();
    let (before, rest) = text.split_at(split);

    let mut rows: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    push_text(&mut rows, before, text_style);
    let mut after = rest;
    if show_cursor {
        match rest.graphemes(true).next() {
            Some(g) if g != "\n" && g != "\r\n" => {
                push_span(&mut rows, g.to_string(), cursor_style);
                after = &rest[g.len()..];
            }
            _ => push_span(&mut rows, " ".to_string(), cursor_style),
        }
    }
    push_text(&mut rows, after, text_style);

    rows.into_iter()
        .enumerate()
        .map(|(i, mut spans)| {
            let lead = if i == 0 {
                Span::styled("> ", styles::dim(palette))
            } else {
                Span::raw("  ")
            };
            spans.insert(0, lead);
            Line::from(spans)
        })
        .collect()
}

fn push_span(rows: &mut Vec<Vec<Span<'static>>>, text: String, style: Style) {
    if let Some(row) = rows.last_mut() {
        row.push(Span::styled(text, style));
    }
}

fn push_text(rows: &mut Vec<Vec<Span<'static>>>, text: &str, style: Style) {
    let mut pieces = text.split('\n').peekable();
    while let Some(piece) = pieces.next() {
        let piece = piece.trim_end_matches('\r');
        if !piece.is_empty() {
            push_span(rows, piece.to_string(), style);
        }
        if pieces.peek().is_some() {
            rows.push(Vec::new());
        }
    }
}

fn completion_lines(model: &Model, palette: &Palette) -> Vec<Line<'static>> {
    let completions = model.completions();
    let width = completions
        .items
        .iter()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
        + 1;
    completions
        .items
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let description = model
                .registry()
                .lookup(name)
                .map(|c| c.description.clone())
                .unwrap_or_default();
            let label = format!("/{name:<width$}");
            if i == completions.index {
                Line::from(vec![
                    Span::styled(label, styles::selected(palette)),
                    Span::styled(format!("  {description}"), Style::default().fg(palette.accent)),
                ])
            } else {
                Line::from(vec![
                    Span::styled(label, styles::text(palette)),
                    Span::styled(format!("  {description}"), styles::dim(palette)),
                ])
            }
        })
        .collect()
}

/// Status-line output when configured, one row per output line, otherwise
/// the built-in summary.
fn footer(model: &Model, palette: &Palette) -> Vec<Line<'static>> {
    if !model.status_line().is_empty() {
        return strip_control(model.status_line())
            .split('\n')
            .map(|line| Line::styled(line.to_string(), styles::dim(palette)))
            .collect();
    }
    let mut parts = vec!["? for shortcuts".to_string(), display_name_for(model.model_name())];
    if model.input().is_normal() {
        parts.insert(0, "-- NORMAL --".to_string());
    }
    if model.fast_mode() {
        parts.push("fast".to_string());
    }
    let mode = model.settings().permission_mode;
    if mode != PermissionMode::Default {
        parts.push(mode.label().to_lowercase());
    }
    let window = context_window_for(model.effective_model_id());
    if let Some(pct) = model.tokens().used_percentage(window) {
        parts.push(format!(
            "{} tokens ({pct:.0}% context)",
            format_tokens(model.tokens().context_tokens())
        ));
    }
    vec![hint(parts.join(" · "), palette)]
}

fn permission_view(prompt: &PermissionPrompt, palette: &Palette, width: usize) -> Vec<Line<'static>> {
    let request = &prompt.request;
    let mut lines = vec![
        rule(width, palette),
        Line::styled(
            "Permission required",
            Style::default().fg(palette.warning).add_modifier(Modifier::BOLD),
        ),
        Line::from(vec![
            Span::styled("Tool: ", styles::dim(palette)),
            Span::styled(request.tool.clone(), styles::tool_name(palette)),
        ]),
    ];
    if !request.summary.is_empty() {
        lines.push(Line::styled(format!("  {}", request.summary), styles::text(palette)));
    }
    lines.push(Line::default());
    let mut choices = "y allow · n deny".to_string();
    if prompt.can_always_allow() {
        choices.push_str(" · a always allow");
    }
    choices.push_str(" · esc deny");
    lines.push(hint(choices, palette));
    lines
}

fn ask_user_view(prompt: &AskUserPrompt, palette: &Palette, width: usize) -> Vec<Line<'static>> {
    let mut lines = vec![rule(width, palette)];
    let Some(question) = prompt.current() else {
        return lines;
    };
    let total = prompt.request.questions.len();
    let mut title = Vec::new();
    if !question.header.is_empty() {
        title.push(Span::styled(format!("[{}] ", question.header), Style::default().fg(palette.accent)));
    }
    title.push(Span::styled(
        question.question.clone(),
        styles::text(palette).add_modifier(Modifier::BOLD),
    ));
    if total > 1 {
        title.push(Span::styled(
            format!("  ({}/{total})", prompt.question_idx + 1),
            styles::dim(palette),
        ));
    }
    lines.push(Line::from(title));

    for (i, option) in question.options.iter().enumerate() {
        let mut row = cursor_row(i == prompt.cursor, format!("{}. {}", i + 1, option.label), palette);
        if !option.description.is_empty() {
            row.push_span(Span::styled(format!("  {}", option.description), styles::dim(palette)));
        }
        lines.push(row);
    }
    let other = prompt.other_row();
    lines.push(cursor_row(prompt.cursor == other, format!("{}. {OTHER_LABEL}", other + 1), palette));

    if let Some(custom) = &prompt.custom {
        lines.push(Line::from(vec![
            Span::styled("  > ", styles::dim(palette)),
            Span::styled(custom.clone(), styles::text(palette)),
            Span::styled(" ", styles::text(palette).add_modifier(Modifier::REVERSED)),
        ]));
        lines.push(hint("enter submit · esc back", palette));
    } else {
        lines.push(hint("↑/↓ select · enter confirm · esc skip", palette));
    }
    lines
}

fn resume_view(picker: &ResumePicker, palette: &Palette) -> Vec<Line<'static>> {
    let now = Utc::now();
    let mut lines = vec![Line::styled("Resume a session", styles::title(palette))];
    if picker.offset > 0 {
        lines.push(hint(format!("  ↑ {} more above", picker.offset), palette));
    }
    for (i, session) in picker.visible() {
        lines.push(cursor_row(i == picker.cursor, session_line(session, now), palette));
    }
    let shown_to = picker.offset + picker.visible().count();
    if shown_to < picker.sessions.len() {
        lines.push(hint(format!("  ↓ {} more below", picker.sessions.len() - shown_to), palette));
    }
    lines.push(hint("↑/↓ select · enter resume · esc cancel", palette));
    lines
}

fn model_picker_view(picker: &ModelPicker, current: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![Line::styled("Select model", styles::title(palette))];
    for (i, info) in ModelPicker::options().iter().enumerate() {
        let mut row = cursor_row(i == picker.cursor, format!("{}. {}", i + 1, info.display_name), palette);
        if info.id == current {
            row.push_span(Span::styled(" ✔", Style::default().fg(palette.success)));
        }
        row.push_span(Span::styled(format!("  {}", info.description), styles::dim(palette)));
        lines.push(row);
    }
    lines.push(hint("↑/↓ or 1-9 select · enter confirm · esc cancel", palette));
    lines
}

fn diff_view(viewer: &DiffViewer, palette: &Palette, width: usize) -> Vec<Line<'static>> {
    let data = &viewer.data;
    let mut lines = vec![Line::styled("Uncommitted changes", styles::title(palette))];

    if let Some(message) = &data.error_msg {
        lines.push(Line::styled(message.clone(), styles::warning(palette)));
        lines.push(hint("esc close", palette));
        return lines;
    }

    let stats = data.stats;
    let noun = if stats.files_count == 1 { "file" } else { "files" };
    lines.push(Line::from(vec![
        Span::styled(format!("{} {noun} changed ", stats.files_count), styles::text(palette)),
        Span::styled(format!("+{}", stats.lines_added), Style::default().fg(palette.added)),
        Span::raw(" "),
        Span::styled(format!("-{}", stats.lines_removed), Style::default().fg(palette.removed)),
    ]));
    lines.push(rule(width, palette));

    match viewer.view_mode {
        DiffViewMode::List => {
            if data.files.is_empty() {
                lines.push(Line::styled("Working tree clean", styles::dim(palette)));
            }
            let (start, end) = viewer.list_window();
            if start > 0 {
                lines.push(hint(format!("  ↑ {start} more above"), palette));
            }
            for (i, file) in data.files.iter().enumerate().take(end).skip(start) {
                let mut row = cursor_row(i == viewer.selected, file.path.clone(), palette);
                if file.is_untracked {
                    row.push_span(Span::styled(" (untracked)", styles::dim(palette)));
                } else if file.is_binary {
                    row.push_span(Span::styled(" (binary)", styles::dim(palette)));
                } else {
                    row.push_span(Span::styled(
                        format!(" +{}", file.lines_added),
                        Style::default().fg(palette.added),
                    ));
                    row.push_span(Span::styled(
                        format!(" -{}", file.lines_removed),
                        Style::default().fg(palette.removed),
                    ));
                }
                lines.push(row);
            }
            if end < data.files.len() {
                lines.push(hint(format!("  ↓ {} more below", data.files.len() - end), palette));
            }
            lines.push(hint("↑/↓ select · enter view · esc close", palette));
        }
        DiffViewMode::Detail => {
            lines.extend(detail_lines(viewer, palette, width));
            lines.push(hint("↑/↓ scroll · ← back · esc close", palette));
        }
    }
    lines
}

fn detail_lines(viewer: &DiffViewer, palette: &Palette, width: usize) -> Vec<Line<'static>> {
    let Some(file) = viewer.selected_file() else {
        return Vec::new();
    };
    let mut lines = vec![
        Line::styled(file.path.clone(), styles::text(palette).add_modifier(Modifier::BOLD)),
        rule(width, palette),
    ];

    let placeholder = if file.is_untracked {
        Some("Untracked file. Stage it with `git add` to see its contents.")
    } else if file.is_binary {
        Some("Binary file not shown.")
    } else if file.is_large_file {
        Some("Large file diff not shown.")
    } else {
        None
    };
    if let Some(text) = placeholder {
        lines.push(Line::styled(text, styles::dim(palette)));
        return lines;
    }

    let mut body = Vec::new();
    for hunk in viewer.selected_hunks() {
        body.push(Line::styled(hunk.header(), Style::default().fg(palette.accent)));
        for line in &hunk.lines {
            let style = match line.chars().next() {
                Some('+') => Style::default().fg(palette.added),
                Some('-') => Style::default().fg(palette.removed),
                _ => styles::dim(palette),
            };
            body.push(Line::styled(line.clone(), style));
        }
    }
    if file.is_truncated {
        body.push(Line::styled("… diff truncated", styles::dim(palette)));
    }
    lines.extend(body.into_iter().skip(viewer.detail_scroll).take(DETAIL_ROWS));
    lines
}

fn config_view(panel: &ConfigPanel, term_height: u16, palette: &Palette) -> Vec<Line<'static>> {
    let viewport = viewport_height(term_height);
    let mut lines = vec![Line::styled("Settings", styles::title(palette))];

    if panel.searching || !panel.search_query.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Search: ", styles::dim(palette)),
            Span::styled(panel.search_query.clone(), styles::text(palette)),
        ]));
    }

    let (above, below) = panel.overflow(viewport);
    if above > 0 {
        lines.push(hint(format!("  ↑ {above} more above"), palette));
    }
    if panel.filtered.is_empty() {
        lines.push(Line::styled("  No matching settings", styles::dim(palette)));
    }
    for (row, &item_idx) in panel
        .filtered
        .iter()
        .enumerate()
        .skip(panel.scroll_off)
        .take(viewport)
    {
        let item = &panel.items[item_idx];
        let value = panel.value_of(item.id);
        let value_style = match (&item.kind, value.as_str()) {
            (ItemKind::Bool, "on") => Style::default().fg(palette.success),
            (ItemKind::Bool, _) => styles::dim(palette),
            (ItemKind::Enum(_), _) => Style::default().fg(palette.accent),
        };
        let mut line = cursor_row(row == panel.cursor, format!("{:<22}", item.label), palette);
        line.push_span(Span::styled(value, value_style));
        lines.push(line);
    }
    if below > 0 {
        lines.push(hint(format!("  ↓ {below} more below"), palette));
    }
    let keys = if panel.searching {
        "type to filter · enter done · esc clear"
    } else {
        "↑/↓ select · space/enter change · / search · esc close"
    };
    lines.push(hint(keys, palette));
    lines
}

fn help_view(
    screen: &HelpScreen,
    model: &Model,
    palette: &Palette,
    width: usize,
) -> Vec<Line<'static>> {
    let mut tabs = vec![Span::styled(format!("tern v{} ", model.version()), styles::title(palette))];
    for tab in HelpTab::ALL {
        let style = if tab == screen.tab {
            styles::selected(palette)
        } else {
            styles::dim(palette)
        };
        tabs.push(Span::raw(" "));
        tabs.push(Span::styled(format!(" {} ", tab.title()), style));
    }
    let mut lines = vec![Line::from(tabs), rule(width, palette)];

    let body = help_lines(screen.tab, model.registry());
    let viewport = help_viewport(model.height());
    lines.extend(
        body.into_iter()
            .skip(screen.scroll)
            .take(viewport)
            .map(|line| Line::styled(line, styles::text(palette))),
    );
    lines.push(hint("←/→ tabs · ↑/↓ scroll · esc to close", palette));
    lines
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyCode;
    use ratatui::text::Line;
    use tern_engine::testing::{FakeTurn, Harness};
    use tern_engine::{Mode, Msg};

    use super::{CTRL_C_HINT, live_height, live_lines};
    use crate::theme::Palette;

    fn screen(h: &Harness) -> Vec<String> {
        live_lines(&h.model, &Palette::dark())
            .iter()
            .map(|l: &Line<'_>| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn contains(h: &Harness, needle: &str) -> bool {
        screen(h).iter().any(|line| line.contains(needle))
    }

    #[tokio::test]
    async fn idle_input_shows_placeholder_and_footer() {
        let h = Harness::new();
        assert!(contains(&h, "Type a message, or /help"));
        assert!(contains(&h, "? for shortcuts"));
    }

    #[tokio::test]
    async fn each_status_line_row_counts_toward_height() {
        let mut h = Harness::new();
        h.send(Msg::StatusLineUpdate("one".into()));
        let single = live_height(&h.model, &Palette::dark(), 80);
        h.send(Msg::StatusLineUpdate("one\ntwo".into()));
        assert_eq!(live_height(&h.model, &Palette::dark(), 80), single + 1);
        assert!(contains(&h, "two"));
    }

    #[tokio::test]
    async fn typed_text_shows_with_prompt() {
        let mut h = Harness::new();
        h.type_str("hello");
        assert!(screen(&h).iter().any(|l| l.starts_with("> hello")));
    }

    #[tokio::test]
    async fn ctrl_c_hint_replaces_footer() {
        let mut h = Harness::new();
        h.ctrl('c');
        assert!(contains(&h, CTRL_C_HINT));
        assert!(!contains(&h, "? for shortcuts"));
    }

    #[tokio::test]
    async fn completions_are_listed() {
        let mut h = Harness::new();
        h.type_str("/comp");
        h.key(KeyCode::Tab);
        assert!(contains(&h, "/compact"));
    }

    #[tokio::test]
    async fn permission_prompt_lists_choices() {
        let mut h = Harness::new();
        h.agent.script(FakeTurn::Tool {
            name: "Bash".into(),
            input: serde_json::json!({"command": "ls"}),
            reply: "done".into(),
        });
        h.submit("list files");
        h.settle().await;
        assert_eq!(h.model.mode(), Mode::Permission);
        assert!(contains(&h, "Permission required"));
        assert!(contains(&h, "Bash"));
        assert!(contains(&h, "y allow · n deny"));
    }

    #[tokio::test]
    async fn help_shows_tabs_and_footer() {
        let mut h = Harness::new();
        h.key(KeyCode::Char('?'));
        assert_eq!(h.model.mode(), Mode::Help);
        let lines = screen(&h);
        assert!(lines[0].starts_with("tern v0.1.0"));
        assert!(lines[0].contains("general"));
        assert!(lines[0].contains("custom-commands"));
        assert!(lines.last().is_some_and(|l| l.contains("esc to close")));
    }

    #[tokio::test]
    async fn settings_overflow_says_which_way() {
        let mut h = Harness::new();
        h.send(Msg::WindowSize { width: 80, height: 20 });
        h.submit("/config");
        assert_eq!(h.model.mode(), Mode::Config);
        let has_hint = |arrow: &str, text: &str, h: &Harness| {
            screen(h)
                .iter()
                .any(|l| l.trim_start().starts_with(arrow) && l.ends_with(text))
        };
        assert!(has_hint("↓", "more below", &h));
        assert!(!contains(&h, "more above"));

        for _ in 0..8 {
            h.key(KeyCode::Down);
        }
        assert!(has_hint("↑", "more above", &h));
    }

    #[tokio::test]
    async fn height_is_capped_by_terminal() {
        let mut h = Harness::new();
        h.send(Msg::WindowSize { width: 40, height: 6 });
        h.key(KeyCode::Char('?'));
        assert!(live_height(&h.model, &Palette::dark(), 40) <= 5);
    }
}
