// Tick-keyed timers and delayed actions.

use std::collections::BTreeMap;

/// Handle to a pending scheduled event; cancelling removes the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Queue of events keyed by the simulation tick at which they fire.
#[derive(Debug)]
pub struct Scheduler<E> {
    next_handle: u64,
    pending: BTreeMap<(u64, TimerHandle), E>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            next_handle: 1,
            pending: BTreeMap::new(),
        }
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_tick: u64, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.pending.insert((fire_tick, handle), event);
        handle
    }

    /// Returns true if the event was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let key = self.pending.keys().find(|(_, h)| *h == handle).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.keys().any(|(_, h)| *h == handle)
    }

    /// Removes and returns every event due at or before `tick`, in firing order.
    pub fn drain_due(&mut self, tick: u64) -> Vec<(TimerHandle, E)> {
        let later = self.pending.split_off(&(tick.saturating_add(1), TimerHandle(0)));
        let due = std::mem::replace(&mut self.pending, later);
        due.into_iter().map(|((_, handle), event)| (handle, event)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Seconds of tuning rounded to the nearest whole tick.
pub fn seconds_to_ticks(seconds: f64, tick_rate_hz: u32) -> u64 {
    if !seconds.is_finite() {
        return 0;
    }
    (seconds.max(0.0) * f64::from(tick_rate_hz)).round() as u64
}

pub fn ticks_to_seconds(ticks: u64, tick_rate_hz: u32) -> f64 {
    ticks as f64 / f64::from(tick_rate_hz.max(1))
}

/// Countdown measured in whole ticks so expiry is exact regardless of float drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTimer {
    target_tick: u64,
}

impl TickTimer {
    pub fn from_ticks(now_tick: u64, duration_ticks: u64) -> Self {
        Self {
            target_tick: now_tick.saturating_add(duration_ticks),
        }
    }

    pub fn target_tick(&self) -> u64 {
        self.target_tick
    }

    pub fn expired(&self, tick: u64) -> bool {
        tick >= self.target_tick
    }

    pub fn remaining_ticks(&self, tick: u64) -> u64 {
        self.target_tick.saturating_sub(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_fire_in_tick_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(10, "late");
        scheduler.schedule(5, "early");
        scheduler.schedule(12, "future");

        let due: Vec<_> = scheduler.drain_due(10).into_iter().map(|(_, e)| e).collect();

        assert_eq!(due, vec!["early", "late"]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn when_cancelled_then_event_never_fires() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(3, ());

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.drain_due(100).is_empty());
    }

    #[test]
    fn seconds_round_to_the_nearest_tick() {
        assert_eq!(seconds_to_ticks(5.0, 10), 50);
        assert_eq!(seconds_to_ticks(1.5, 60), 90);
        assert_eq!(seconds_to_ticks(0.04, 10), 0);
        assert_eq!(seconds_to_ticks(-1.0, 60), 0);
        assert_eq!(ticks_to_seconds(15, 10), 1.5);
    }

    #[test]
    fn tick_timer_expires_on_its_target_tick() {
        let timer = TickTimer::from_ticks(31, 50);

        assert!(!timer.expired(80));
        assert!(timer.expired(81));
        assert_eq!(timer.remaining_ticks(71), 10);
    }
}
