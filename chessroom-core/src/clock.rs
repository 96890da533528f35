//! Per-color countdown clocks
//!
//! Exactly one side's clock runs per tick: the side to move. Flag fall and
//! an explicit stop both end decrementing for good.

use crate::pieces::Color;
use std::time::Duration;

/// Ten minutes per side
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(600);

/// One decrement per second
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

const WARNING_THRESHOLD: Duration = Duration::from_secs(120);
const DANGER_THRESHOLD: Duration = Duration::from_secs(30);

/// Display band for a clock reading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Warning,
    Danger,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClockState {
    Idle,
    Running,
    Flagged(Color),
    Stopped,
}

/// Two countdowns, one per color
#[derive(Clone, Debug)]
pub struct Clock {
    white: Duration,
    black: Duration,
    tick: Duration,
    active: Color,
    state: ClockState,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET, DEFAULT_TICK)
    }
}

impl Clock {
    pub fn new(budget: Duration, tick: Duration) -> Self {
        Self {
            white: budget,
            black: budget,
            tick,
            active: Color::White,
            state: ClockState::Idle,
        }
    }

    /// Begin counting down; no effect once flagged or stopped
    pub fn start(&mut self) {
        if self.state == ClockState::Idle {
            self.state = ClockState::Running;
        }
    }

    /// Discard the clock for the rest of the game
    pub fn stop(&mut self) {
        if matches!(self.state, ClockState::Idle | ClockState::Running) {
            self.state = ClockState::Stopped;
        }
    }

    /// Advance one tick against the side to move
    ///
    /// Returns the flagged color when this tick ran its time out.
    pub fn tick(&mut self, side_to_move: Color) -> Option<Color> {
        if self.state != ClockState::Running {
            return None;
        }
        self.active = side_to_move;
        let step = self.tick;
        let remaining = match side_to_move {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        *remaining = remaining.saturating_sub(step);
        if remaining.is_zero() {
            self.state = ClockState::Flagged(side_to_move);
            return Some(side_to_move);
        }
        None
    }

    pub fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// Side currently counting down, if running
    pub fn active(&self) -> Option<Color> {
        (self.state == ClockState::Running).then_some(self.active)
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn flagged(&self) -> Option<Color> {
        match self.state {
            ClockState::Flagged(color) => Some(color),
            _ => None,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn urgency(&self, color: Color) -> Urgency {
        let remaining = self.remaining(color);
        if remaining <= DANGER_THRESHOLD {
            Urgency::Danger
        } else if remaining <= WARNING_THRESHOLD {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }
}

/// `m:ss` rendering of a clock reading
pub fn format_clock(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Terminal reason when `flagged` runs out of time
pub fn timeout_message(flagged: Color) -> String {
    format!("{} wins on time!", flagged.opponent())
}
