use std::time::{Duration, Instant};

pub const DEFAULT_TICK_LENGTH: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct GameTick(pub u64);

impl std::fmt::Display for GameTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame counter for the tick driver.
#[derive(Debug, Clone)]
pub struct GameClock {
    tick_length: Duration,
    tick: GameTick,
}

impl GameClock {
    pub fn new(tick_length: Duration) -> Self {
        let tick_length = if tick_length.is_zero() {
            Duration::from_millis(1)
        } else {
            tick_length
        };
        Self {
            tick_length,
            tick: GameTick(0),
        }
    }

    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    pub fn now(&self) -> GameTick {
        self.tick
    }

    pub fn advance(&mut self) -> GameTick {
        self.tick.0 = self.tick.0.saturating_add(1);
        self.tick
    }

    /// What is left of the frame that started at `started`, or how far it
    /// ran over.
    pub fn frame_budget(&self, started: Instant, now: Instant) -> FrameBudget {
        let elapsed = now.saturating_duration_since(started);
        match self.tick_length.checked_sub(elapsed) {
            Some(remaining) => FrameBudget::Remaining(remaining),
            None => FrameBudget::Overrun(elapsed - self.tick_length),
        }
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_LENGTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBudget {
    Remaining(Duration),
    Overrun(Duration),
}
