//! Multiple-choice questions asked by the agent.
//!
//! Each question lists its options followed by a synthetic "Other" row that
//! switches to free-text entry. Answers are keyed by question text.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use tern_types::{Answers, Question};

use crate::rendezvous::AskUserRequest;

pub const OTHER_LABEL: &str = "Other (custom input)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskOutcome {
    Continue,
    /// Every question has an answer.
    Done,
    /// Esc: send what we have.
    Dismissed,
    /// Ctrl-C: send what we have and cancel the turn.
    Cancelled,
}

#[derive(Debug)]
pub struct AskUserPrompt {
    pub request: AskUserRequest,
    pub question_idx: usize,
    pub cursor: usize,
    pub answers: Answers,
    /// `Some` while typing a custom answer.
    pub custom: Option<String>,
}

impl AskUserPrompt {
    #[must_use]
    pub fn new(request: AskUserRequest) -> Self {
        Self {
            request,
            question_idx: 0,
            cursor: 0,
            answers: Answers::new(),
            custom: None,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.request.questions.get(self.question_idx)
    }

    /// Index of the "Other" row.
    #[must_use]
    pub fn other_row(&self) -> usize {
        self.current().map_or(0, |q| q.options.len())
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> AskOutcome {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AskOutcome::Cancelled;
        }
        if let Some(buffer) = self.custom.as_mut() {
            match key.code {
                KeyCode::Char(c) => buffer.push(c),
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Esc => self.custom = None,
                KeyCode::Enter => {
                    let text = buffer.trim().to_string();
                    if !text.is_empty() {
                        return self.commit(text);
                    }
                }
                _ => {}
            }
            return AskOutcome::Continue;
        }
        match key.code {
            KeyCode::Esc => AskOutcome::Dismissed,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                AskOutcome::Continue
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(self.other_row());
                AskOutcome::Continue
            }
            KeyCode::Enter => {
                let label = self
                    .current()
                    .and_then(|q| q.options.get(self.cursor))
                    .map(|o| o.label.clone());
                match label {
                    Some(label) => self.commit(label),
                    None => {
                        self.custom = Some(String::new());
                        AskOutcome::Continue
                    }
                }
            }
            _ => AskOutcome::Continue,
        }
    }

    /// Appends pasted text to the custom answer being typed.
    pub fn paste(&mut self, text: &str) {
        if let Some(buffer) = self.custom.as_mut() {
            buffer.extend(text.chars().filter(|c| !c.is_control()));
        }
    }

    fn commit(&mut self, answer: String) -> AskOutcome {
        if let Some(question) = self.current() {
            let key = question.question.clone();
            self.answers.insert(key, answer);
        }
        self.question_idx += 1;
        self.cursor = 0;
        self.custom = None;
        if self.question_idx >= self.request.questions.len() {
            AskOutcome::Done
        } else {
            AskOutcome::Continue
        }
    }

    /// Writes the answers collected so far and returns `(question, answer)`
    /// pairs in question order for the scrollback summary.
    pub fn finish(self) -> Vec<(String, String)> {
        let Self {
            request, answers, ..
        } = self;
        let summary = request
            .questions
            .iter()
            .filter_map(|q| {
                answers
                    .get(&q.question)
                    .map(|a| (q.question.clone(), a.clone()))
            })
            .collect();
        request.respond.send(answers);
        summary
    }
}
