//! The mailbox loop: one message at a time through `update`, then its effects,
//! then a redraw of the live region.

use std::collections::VecDeque;
use std::io::{self, Write, stdout};

use anyhow::Result;
use crossterm::{
    cursor::MoveToColumn,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode, size as terminal_size},
};
use ratatui::layout::Rect;
use ratatui::prelude::{Backend, Terminal};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedReceiver;

use tern_engine::{Effect, ExecRequest, ExitAction, Mailbox, Model, Msg};
use tern_tui::{InputPump, ScrollbackWriter, draw, live_height, palette};

pub struct Runtime {
    model: Model,
    mailbox: Mailbox,
    rx: UnboundedReceiver<Msg>,
    /// Messages produced by synchronous calls; handled before the mailbox.
    pending: VecDeque<Msg>,
    writer: ScrollbackWriter,
    input: Option<InputPump>,
    viewport_height: u16,
}

impl Runtime {
    pub fn new(model: Model, mailbox: Mailbox, rx: UnboundedReceiver<Msg>) -> Self {
        Self {
            model,
            mailbox,
            rx,
            pending: VecDeque::new(),
            writer: ScrollbackWriter::new(),
            input: None,
            viewport_height: 1,
        }
    }

    pub fn exit_action(&self) -> ExitAction {
        self.model.exit_action()
    }

    pub async fn run<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: Backend + Write,
        B::Error: Send + Sync + 'static,
    {
        self.input = Some(InputPump::start(self.mailbox.clone()));
        let (width, height) = terminal_size()?;
        self.pending.push_back(Msg::WindowSize {
            width: i32::from(width),
            height: i32::from(height),
        });
        self.pending.push_back(Msg::Init);

        loop {
            let msg = match self.pending.pop_front() {
                Some(msg) => msg,
                None => match self.rx.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let effects = self.model.update(msg);
            let quit = self.execute(terminal, effects).await?;
            if quit || self.model.is_quitting() {
                break;
            }
            if !self.pending.is_empty() {
                continue;
            }

            self.sync_viewport(terminal)?;
            let palette = palette(&self.model.settings().theme);
            terminal.draw(|frame| draw(frame, &self.model, &palette))?;
        }
        tracing::info!(printed = self.writer.printed(), "event loop finished");
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.shutdown().await;
        }
    }

    /// Runs `effects` in order. Returns `true` on `Quit`.
    async fn execute<B>(&mut self, terminal: &mut Terminal<B>, effects: Vec<Effect>) -> Result<bool>
    where
        B: Backend + Write,
        B::Error: Send + Sync + 'static,
    {
        let mut quit = false;
        for effect in effects {
            match effect {
                Effect::Print(entry) => {
                    let palette = palette(&self.model.settings().theme);
                    self.writer.print(terminal, &entry, &palette)?;
                }
                Effect::Quit => quit = true,
                Effect::Schedule { after, msg } => {
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        mailbox.post(msg);
                    });
                }
                Effect::Task(future) => {
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        if let Some(msg) = future.await {
                            mailbox.post(msg);
                        }
                    });
                }
                Effect::Call(call) => {
                    if let Some(msg) = call() {
                        self.pending.push_back(msg);
                    }
                }
                Effect::Exec(request) => {
                    let msg = self.exec(terminal, request).await?;
                    self.pending.push_back(msg);
                }
            }
        }
        Ok(quit)
    }

    /// Hands the terminal to a child process until it exits.
    async fn exec<B>(&mut self, terminal: &mut Terminal<B>, request: ExecRequest) -> Result<Msg>
    where
        B: Backend + Write,
        B::Error: Send + Sync + 'static,
    {
        let ExecRequest {
            program,
            args,
            cwd,
            on_exit,
        } = request;
        tracing::info!(%program, "suspending terminal for child process");

        if let Some(input) = &self.input {
            input.pause();
        }
        clear_viewport(terminal)?;
        disable_raw_mode()?;
        execute!(stdout(), DisableBracketedPaste)?;

        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(dir) = &cwd {
            command.current_dir(dir);
        }
        let status = command.status().await;
        if let Err(err) = &status {
            tracing::warn!(%program, %err, "child process failed to start");
        }

        enable_raw_mode()?;
        execute!(stdout(), EnableBracketedPaste)?;
        terminal.clear()?;
        if let Some(input) = &self.input {
            input.resume();
        }
        Ok(on_exit(status))
    }

    /// Grows or shrinks the inline viewport to fit the live region.
    fn sync_viewport<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: Backend + Write,
        B::Error: Send + Sync + 'static,
    {
        let (term_width, term_height) = terminal_size()?;
        let palette = palette(&self.model.settings().theme);
        let needed = live_height(&self.model, &palette, term_width).min(term_height);
        if needed != self.viewport_height {
            let y = term_height.saturating_sub(needed);
            terminal.resize(Rect::new(0, y, term_width, needed))?;
            self.viewport_height = needed;
        }
        Ok(())
    }
}

/// Blanks the inline viewport so the shell prompt lands on a clean line.
pub fn clear_viewport<B>(terminal: &mut Terminal<B>) -> io::Result<()>
where
    B: Backend + Write,
{
    let area = terminal.get_frame().area();
    terminal
        .set_cursor_position((0, area.y))
        .map_err(|_| io::Error::other("failed to move cursor"))?;
    execute!(
        terminal.backend_mut(),
        MoveToColumn(0),
        Clear(ClearType::FromCursorDown)
    )
}
