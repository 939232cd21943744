//! A ratatui backend that draws into a vt100 screen so tests can read back
//! exactly what a terminal would show.
//!
//! Only glyph placement matters here; colors and attributes are dropped.

use std::fmt;
use std::io;

use crossterm::Command;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType as TermClear};
use ratatui::backend::{Backend, ClearType, WindowSize};
use ratatui::buffer::Cell;
use ratatui::layout::{Position, Size};

pub struct ScreenBackend {
    screen: vt100::Parser,
    size: Size,
}

impl ScreenBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            screen: vt100::Parser::new(height, width, 0),
            size: Size::new(width, height),
        }
    }

    fn emit(&mut self, command: impl Command) {
        let mut ansi = String::new();
        if command.write_ansi(&mut ansi).is_ok() {
            self.screen.process(ansi.as_bytes());
        }
    }
}

/// Screen rows joined by newlines, trailing blanks trimmed.
impl fmt::Display for ScreenBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.screen.screen().contents())
    }
}

impl Backend for ScreenBackend {
    type Error = io::Error;

    fn draw<'a, I>(&mut self, content: I) -> io::Result<()>
    where
        I: Iterator<Item = (u16, u16, &'a Cell)>,
    {
        for (x, y, cell) in content {
            self.emit(MoveTo(x, y));
            self.screen.process(cell.symbol().as_bytes());
        }
        Ok(())
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn show_cursor(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn get_cursor_position(&mut self) -> io::Result<Position> {
        let (row, col) = self.screen.screen().cursor_position();
        Ok(Position::new(col, row))
    }

    fn set_cursor_position<P: Into<Position>>(&mut self, position: P) -> io::Result<()> {
        let Position { x, y } = position.into();
        self.emit(MoveTo(x, y));
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.emit(Clear(TermClear::All));
        Ok(())
    }

    fn clear_region(&mut self, _region: ClearType) -> io::Result<()> {
        self.clear()
    }

    fn size(&self) -> io::Result<Size> {
        Ok(self.size)
    }

    fn window_size(&mut self) -> io::Result<WindowSize> {
        Ok(WindowSize {
            columns_rows: self.size,
            pixels: Size::default(),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
