//! Markdown to ratatui lines for finished assistant text.
//!
//! Wrapping is left to the caller; each paragraph, list item, heading and code
//! line becomes one logical [`Line`].

use std::mem;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::theme::Palette;

#[must_use]
pub fn render_markdown(content: &str, palette: &Palette) -> Vec<Line<'static>> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut renderer = MarkdownRenderer::new(palette);
    for event in Parser::new_ext(content, options) {
        renderer.handle_event(event);
    }
    renderer.finish()
}

struct MarkdownRenderer<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,

    // Counters so that `# Title with **bold**` stays bold after the inner
    // strong ends.
    bold: usize,
    italic: usize,
    strike: usize,
    heading: Option<HeadingLevel>,
    quote_depth: usize,

    code_block: Option<CodeBlock>,
    table: Option<Table>,
    lists: Vec<Option<u64>>,
}

struct CodeBlock {
    lang: String,
    lines: Vec<String>,
}

#[derive(Default)]
struct Table {
    alignments: Vec<Alignment>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl<'p> MarkdownRenderer<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            spans: Vec::new(),
            bold: 0,
            italic: 0,
            strike: 0,
            heading: None,
            quote_depth: 0,
            code_block: None,
            table: None,
            lists: Vec::new(),
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.flush_line(),
            // Tag-like text in model output is shown rather than dropped.
            Event::Html(html) | Event::InlineHtml(html) => self.text(html.trim_end_matches('\n')),
            Event::TaskListMarker(done) => {
                let marker = if done { "☑ " } else { "☐ " };
                self.spans.push(Span::styled(marker, self.base_style()));
            }
            Event::Rule => {
                self.flush_line();
                self.lines
                    .push(Line::styled("─".repeat(40), Style::default().fg(self.palette.border)));
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.blank_separator();
                self.heading = Some(level);
                self.bold += 1;
            }
            Tag::Strong => self.bold += 1,
            Tag::Emphasis => self.italic += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.split_whitespace().next().unwrap_or("").to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(CodeBlock {
                    lang,
                    lines: Vec::new(),
                });
            }
            Tag::List(start) => {
                self.flush_line();
                if self.lists.is_empty() {
                    self.blank_separator();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.spans
                    .push(Span::styled(marker, Style::default().fg(self.palette.muted)));
            }
            Tag::Table(alignments) => {
                self.flush_line();
                self.blank_separator();
                self.table = Some(Table {
                    alignments,
                    ..Table::default()
                });
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    table.cell.clear();
                }
            }
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.blank_separator();
                }
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.bold = self.bold.saturating_sub(1);
                self.flush_line();
                self.heading = None;
            }
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::CodeBlock => {
                if let Some(block) = self.code_block.take() {
                    self.push_code_block(block);
                }
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.lists.pop();
            }
            TagEnd::Item | TagEnd::Paragraph => self.flush_line(),
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.push_table(table);
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = &mut self.table
                    && !table.row.is_empty()
                {
                    let row = mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = mem::take(&mut table.cell);
                    table.row.push(cell);
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(block) = &mut self.code_block {
            block.lines.extend(text.lines().map(str::to_string));
            return;
        }
        if let Some(table) = &mut self.table {
            table.cell.push_str(text);
            return;
        }
        let style = self.current_style();
        let mut pieces = text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() {
                self.spans.push(Span::styled(piece.to_string(), style));
            }
            if pieces.peek().is_some() {
                self.flush_line();
            }
        }
    }

    fn inline_code(&mut self, code: &str) {
        if let Some(table) = &mut self.table {
            table.cell.push_str(code);
            return;
        }
        self.spans
            .push(Span::styled(code.to_string(), Style::default().fg(self.palette.accent)));
    }

    fn soft_break(&mut self) {
        if self.code_block.is_none() && self.table.is_none() {
            self.spans.push(Span::raw(" "));
        }
    }

    fn base_style(&self) -> Style {
        Style::default().fg(self.palette.text)
    }

    fn current_style(&self) -> Style {
        let mut style = self.base_style();
        if self.heading.is_some() {
            style = style.fg(self.palette.accent);
        }
        if self.quote_depth > 0 {
            style = style.fg(self.palette.muted);
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 || self.quote_depth > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.strike > 0 {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        style
    }

    fn blank_separator(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.spans.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(self.palette.border),
            ));
        }
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn push_code_block(&mut self, block: CodeBlock) {
        self.blank_separator();
        let fence = Style::default().fg(self.palette.border);
        let code = Style::default().fg(self.palette.muted);
        self.lines
            .push(Line::styled(format!("```{}", block.lang), fence));
        for line in block.lines {
            self.lines.push(Line::styled(line, code));
        }
        self.lines.push(Line::styled("```", fence));
    }

    fn push_table(&mut self, table: Table) {
        if table.rows.is_empty() {
            return;
        }
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![3usize; columns];
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.trim().width());
            }
        }

        let border = Style::default().fg(self.palette.border);
        let header = self.base_style().add_modifier(Modifier::BOLD);
        let body = self.base_style();

        self.lines
            .push(Line::styled(table_border(&widths, '┌', '┬', '┐'), border));
        for (i, row) in table.rows.iter().enumerate() {
            let style = if i == 0 { header } else { body };
            self.lines
                .push(table_row(row, &widths, &table.alignments, style, border));
            if i == 0 {
                self.lines
                    .push(Line::styled(table_border(&widths, '├', '┼', '┤'), border));
            }
        }
        self.lines
            .push(Line::styled(table_border(&widths, '└', '┴', '┘'), border));
    }
}

fn table_border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}", inner.join(&mid.to_string()))
}

fn table_row(
    row: &[String],
    widths: &[usize],
    alignments: &[Alignment],
    style: Style,
    border: Style,
) -> Line<'static> {
    let mut spans = vec![Span::styled("│", border)];
    for (i, width) in widths.iter().enumerate() {
        let cell = row.get(i).map_or("", |c| c.trim());
        let pad = width.saturating_sub(cell.width());
        let padded = match alignments.get(i) {
            Some(Alignment::Right) => format!(" {}{cell} ", " ".repeat(pad)),
            Some(Alignment::Center) => {
                let left = pad / 2;
                format!(" {}{cell}{} ", " ".repeat(left), " ".repeat(pad - left))
            }
            _ => format!(" {cell}{} ", " ".repeat(pad)),
        };
        spans.push(Span::styled(padded, style));
        spans.push(Span::styled("│", border));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use ratatui::style::Modifier;
    use ratatui::text::Line;

    use super::render_markdown;
    use crate::theme::Palette;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render(md: &str) -> Vec<String> {
        render_markdown(md, &Palette::dark()).iter().map(text_of).collect()
    }

    #[test]
    fn paragraphs_are_separated_by_blank_line() {
        assert_eq!(render("first\n\nsecond"), vec!["first", "", "second"]);
    }

    #[test]
    fn soft_breaks_join_lines() {
        assert_eq!(render("one\ntwo"), vec!["one two"]);
    }

    #[test]
    fn lists_get_markers() {
        assert_eq!(render("- a\n- b"), vec!["• a", "• b"]);
        assert_eq!(render("3. x\n4. y"), vec!["3. x", "4. y"]);
    }

    #[test]
    fn code_block_keeps_fences_and_language() {
        let lines = render("```rust\nfn main() {}\n```");
        assert_eq!(lines, vec!["```rust", "fn main() {}", "```"]);
    }

    #[test]
    fn table_has_borders() {
        let lines = render("| A | Bee |\n|---|---:|\n| 1 | 2 |");
        assert_eq!(lines[0], "┌─────┬─────┐");
        assert_eq!(lines[1], "│ A   │ Bee │");
        assert_eq!(lines[3], "│ 1   │   2 │");
        assert_eq!(lines[4], "└─────┴─────┘");
    }

    #[test]
    fn bold_survives_nested_emphasis() {
        let lines = render_markdown("# Intro **key** point", &Palette::dark());
        let heading = &lines[0];
        for span in heading.spans.iter().filter(|s| !s.content.trim().is_empty()) {
            assert!(span.style.add_modifier.contains(Modifier::BOLD), "{}", span.content);
        }
    }

    #[test]
    fn html_like_tags_are_kept() {
        let joined = render("<thinking>important</thinking>").join("\n");
        assert!(joined.contains("important"), "{joined}");
    }

    #[test]
    fn quotes_are_prefixed() {
        assert_eq!(render("> careful"), vec!["│ careful"]);
    }
}
