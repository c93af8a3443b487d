// Tick-based ability gating. Stamps and durations are whole simulation ticks
// so readiness at an exact multiple of the duration never depends on float
// rounding of `tick / tick_rate_hz`.

use crate::domain::scheduler::{seconds_to_ticks, ticks_to_seconds};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    duration_ticks: u64,
    last_cast: Option<u64>,
}

impl Cooldown {
    /// A cooldown that has never fired, so the first cast is always allowed.
    pub fn new(duration_ticks: u64) -> Self {
        Self {
            duration_ticks,
            last_cast: None,
        }
    }

    /// Builds a cooldown from a tuning value in seconds.
    pub fn from_seconds(seconds: f64, tick_rate_hz: u32) -> Self {
        Self::new(seconds_to_ticks(seconds, tick_rate_hz))
    }

    /// A cooldown that behaves as if it just fired at `tick`.
    pub fn started_at(duration_ticks: u64, tick: u64) -> Self {
        Self {
            duration_ticks,
            last_cast: Some(tick),
        }
    }

    pub fn duration_ticks(&self) -> u64 {
        self.duration_ticks
    }

    pub fn last_cast(&self) -> Option<u64> {
        self.last_cast
    }

    pub fn is_ready(&self, tick: u64) -> bool {
        self.remaining_ticks(tick) == 0
    }

    pub fn remaining_ticks(&self, tick: u64) -> u64 {
        match self.last_cast {
            Some(last) => last
                .saturating_add(self.duration_ticks)
                .saturating_sub(tick),
            None => 0,
        }
    }

    pub fn remaining_seconds(&self, tick: u64, tick_rate_hz: u32) -> f64 {
        ticks_to_seconds(self.remaining_ticks(tick), tick_rate_hz)
    }

    /// Stamps a successful cast. The stamp never moves backwards.
    pub fn record(&mut self, tick: u64) {
        if self.last_cast.is_none_or(|last| tick >= last) {
            self.last_cast = Some(tick);
        }
    }

    /// Overwrites the stamp from a replicated snapshot.
    pub fn sync(&mut self, last_cast: Option<u64>) {
        self.last_cast = last_cast;
    }
}
