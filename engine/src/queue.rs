//! FIFO of messages submitted while a turn is running.

use std::collections::VecDeque;

#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    items: VecDeque<String>,
}

impl InputQueue {
    pub fn enqueue(&mut self, text: impl Into<String>) {
        self.items.push_back(text.into());
    }

    /// Removes the head, or returns an empty string when drained.
    pub fn dequeue(&mut self) -> String {
        self.items.pop_front().unwrap_or_default()
    }

    pub fn remove_last(&mut self) -> Option<String> {
        self.items.pop_back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}
