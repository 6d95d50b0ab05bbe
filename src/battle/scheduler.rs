//! Interval gating for the engine's recurring work
//!
//! Each subsystem owns an `IntervalGate` and asks it whether it may run,
//! so the cadence is explicit and testable without a host loop.

use crate::core::types::SimTime;

/// Next-eligible-time gate for one recurring task
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalGate {
    interval: SimTime,
    last_fired: Option<SimTime>,
}

impl IntervalGate {
    pub fn new(interval: SimTime) -> Self {
        Self {
            interval: interval.max(0.0),
            last_fired: None,
        }
    }

    pub fn interval(&self) -> SimTime {
        self.interval
    }

    pub fn last_fired(&self) -> Option<SimTime> {
        self.last_fired
    }

    /// Earliest time the task may run again (`None` = immediately)
    pub fn next_eligible(&self) -> Option<SimTime> {
        self.last_fired.map(|last| last + self.interval)
    }

    /// Should the task run at `now`?
    pub fn is_due(&self, now: SimTime) -> bool {
        match self.last_fired {
            None => true, // First evaluation always happens
            // A clock that went backwards means a restarted host; run again
            Some(last) if now < last => true,
            Some(last) => now - last >= self.interval,
        }
    }

    /// Record that the task ran at `now`
    pub fn fire(&mut self, now: SimTime) {
        self.last_fired = Some(now);
    }

    /// Fire if due; returns whether it fired
    pub fn try_fire(&mut self, now: SimTime) -> bool {
        if self.is_due(now) {
            self.fire(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_is_due() {
        let gate = IntervalGate::new(5.0);
        assert!(gate.is_due(0.0));
        assert_eq!(gate.next_eligible(), None);
    }

    #[test]
    fn test_gated_within_interval() {
        let mut gate = IntervalGate::new(5.0);
        assert!(gate.try_fire(1.0));
        assert!(!gate.try_fire(3.0));
        assert!(!gate.try_fire(5.9));
        assert_eq!(gate.next_eligible(), Some(6.0));
        assert!(gate.try_fire(6.0));
    }

    #[test]
    fn test_clock_reset_is_due() {
        let mut gate = IntervalGate::new(10.0);
        gate.fire(50.0);
        assert!(!gate.is_due(55.0));
        assert!(gate.is_due(2.0));
    }

    #[test]
    fn test_reset() {
        let mut gate = IntervalGate::new(10.0);
        gate.fire(1.0);
        gate.reset();
        assert!(gate.is_due(1.5));
        assert_eq!(gate.last_fired(), None);
    }
}
