//! Terminal input reader.
//!
//! crossterm's reader blocks, so it runs on a blocking task and posts
//! translated messages straight into the event loop's mailbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use tern_engine::{Mailbox, Msg};
use tokio::task::JoinHandle;

/// Poll timeout; bounds how long shutdown and pause take to be noticed.
const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// The message for a terminal event, if the loop cares about it.
#[must_use]
pub fn translate(event: Event) -> Option<Msg> {
    match event {
        Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
            Some(Msg::Key(key))
        }
        Event::Paste(text) => Some(Msg::Paste(normalize_line_endings(&text))),
        Event::Resize(width, height) => Some(Msg::WindowSize {
            width: i32::from(width),
            height: i32::from(height),
        }),
        _ => None,
    }
}

pub struct InputPump {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl InputPump {
    /// Starts reading. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(mailbox: Mailbox) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let join = {
            let stop = Arc::clone(&stop);
            let paused = Arc::clone(&paused);
            tokio::task::spawn_blocking(move || input_loop(&stop, &paused, &mailbox))
        };
        Self {
            stop,
            paused,
            join: Some(join),
        }
    }

    /// Stops reading stdin while another process owns the terminal.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        // Let an in-flight poll finish before the child starts reading.
        thread::sleep(INPUT_POLL_TIMEOUT);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub async fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, join).await;
        }
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best effort; do not block in Drop.
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: &AtomicBool, paused: &AtomicBool, mailbox: &Mailbox) {
    while !stop.load(Ordering::Acquire) {
        if paused.load(Ordering::Acquire) {
            thread::sleep(INPUT_POLL_TIMEOUT);
            continue;
        }
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if let Some(msg) = translate(ev)
                        && !mailbox.post(msg)
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "terminal read failed");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "terminal poll failed");
                break;
            }
        }
    }
    tracing::debug!("input pump stopped");
}

#[cfg(test)]
mod tests {
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};
    use tern_engine::Msg;

    use super::translate;

    #[test]
    fn key_releases_are_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert!(translate(Event::Key(release)).is_none());
        let press = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert!(matches!(translate(Event::Key(press)), Some(Msg::Key(k)) if k == press));
    }

    #[test]
    fn paste_normalizes_line_endings() {
        let msg = translate(Event::Paste("a\r\nb\rc".into()));
        assert!(matches!(msg, Some(Msg::Paste(text)) if text == "a\nb\nc"));
    }

    #[test]
    fn resize_becomes_window_size() {
        let msg = translate(Event::Resize(100, 30));
        assert!(matches!(msg, Some(Msg::WindowSize { width: 100, height: 30 })));
    }

    #[test]
    fn focus_events_are_dropped() {
        assert!(translate(Event::FocusGained).is_none());
    }
}
