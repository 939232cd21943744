use std::time::Duration;

use crate::effect::Effect;
use crate::msg::Msg;

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Braille spinner driven by scheduled ticks.
///
/// Ticks carry the generation they were scheduled under; stopping or
/// restarting bumps the generation so stale ticks are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Spinner {
    frame: usize,
    generation: u64,
    active: bool,
}

impl Spinner {
    /// Starts ticking. Returns `None` when already running.
    pub fn start(&mut self) -> Option<Effect> {
        if self.active {
            return None;
        }
        self.active = true;
        self.generation += 1;
        Some(self.tick_effect())
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.generation += 1;
    }

    pub fn on_tick(&mut self, generation: u64) -> Option<Effect> {
        if !self.active || generation != self.generation {
            return None;
        }
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        Some(self.tick_effect())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }

    fn tick_effect(&self) -> Effect {
        Effect::schedule(SPINNER_INTERVAL, Msg::SpinnerTick(self.generation))
    }
}
