//! Continuous fader ramps
//!
//! A ramp is the "hold to raise/lower" behaviour: one fader step every
//! `interval_ms` until stopped or until the fader hits its bound. The ramp
//! controller only keeps the schedule; the processor controller sends the
//! steps and decides when a ramp auto-stops.
//!
//! There is at most one job per direction. Starting a direction again replaces
//! its job; the opposite direction is left alone, like two independent hold
//! buttons.

use crate::protocol::Direction;

/// Tick interval used when the host does not give one
pub const DEFAULT_RAMP_INTERVAL_MS: u64 = 500;

/// Longest tick interval a host may ask for
pub const MAX_RAMP_INTERVAL_MS: u64 = 60_000;

/// An active ramp in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampJob {
    pub direction: Direction,
    pub interval_ms: u64,
    /// Time of the next tick
    next_tick_ms: u64,
}

impl RampJob {
    pub fn next_tick_ms(&self) -> u64 {
        self.next_tick_ms
    }
}

/// Schedule of the running ramps, driven by the caller's clock
#[derive(Debug, Clone, Default)]
pub struct RampController {
    increase: Option<RampJob>,
    decrease: Option<RampJob>,
}

impl RampController {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, direction: Direction) -> &mut Option<RampJob> {
        match direction {
            Direction::Increase => &mut self.increase,
            Direction::Decrease => &mut self.decrease,
        }
    }

    /// Start (or restart) the ramp in `direction`.
    ///
    /// A fresh ramp ticks immediately. Restarting a running direction replaces
    /// its job but keeps the pending tick (capped at one new interval), so
    /// repeated starts never produce extra steps. Returns the replaced job.
    pub fn start(&mut self, direction: Direction, interval_ms: u64, now: u64) -> Option<RampJob> {
        let interval_ms = interval_ms.max(1);
        let slot = self.slot(direction);
        let next_tick_ms = match slot {
            Some(old) => old.next_tick_ms.min(now.saturating_add(interval_ms)),
            None => now,
        };
        slot.replace(RampJob {
            direction,
            interval_ms,
            next_tick_ms,
        })
    }

    /// Stop the ramp in `direction`. Returns the stopped job; stopping an idle
    /// direction is a no-op.
    pub fn stop(&mut self, direction: Direction) -> Option<RampJob> {
        self.slot(direction).take()
    }

    pub fn stop_all(&mut self) {
        self.increase = None;
        self.decrease = None;
    }

    pub fn is_running(&self, direction: Direction) -> bool {
        match direction {
            Direction::Increase => self.increase.is_some(),
            Direction::Decrease => self.decrease.is_some(),
        }
    }

    pub fn job(&self, direction: Direction) -> Option<&RampJob> {
        match direction {
            Direction::Increase => self.increase.as_ref(),
            Direction::Decrease => self.decrease.as_ref(),
        }
    }

    /// Directions whose tick is due at `now`, rescheduling each of them.
    ///
    /// A job that fell behind ticks once and skips the intervals it missed.
    pub fn due(&mut self, now: u64) -> Vec<Direction> {
        let mut due = Vec::new();
        for job in [&mut self.increase, &mut self.decrease]
            .into_iter()
            .flatten()
        {
            if job.next_tick_ms <= now {
                due.push(job.direction);
                job.next_tick_ms = job.next_tick_ms.saturating_add(job.interval_ms);
                if job.next_tick_ms <= now {
                    job.next_tick_ms = now.saturating_add(job.interval_ms);
                }
            }
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_is_immediate() {
        let mut ramps = RampController::new();
        assert!(ramps.start(Direction::Increase, 500, 1000).is_none());
        assert_eq!(ramps.due(1000), vec![Direction::Increase]);
        assert!(ramps.due(1499).is_empty());
        assert_eq!(ramps.due(1500), vec![Direction::Increase]);
    }

    #[test]
    fn test_restart_replaces_job() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, 500, 0);
        assert_eq!(ramps.due(0).len(), 1);
        let replaced = ramps.start(Direction::Increase, 500, 0);
        assert_eq!(replaced.map(|j| j.interval_ms), Some(500));
        assert!(ramps.due(0).is_empty());

        let mut ticks = 0;
        for now in (100..=2000).step_by(100) {
            ticks += ramps.due(now).len();
        }
        // t = 500, 1000, 1500, 2000
        assert_eq!(ticks, 4);
    }

    #[test]
    fn test_restart_with_shorter_interval() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Decrease, 1000, 0);
        ramps.due(0);
        ramps.start(Direction::Decrease, 200, 100);
        assert_eq!(ramps.job(Direction::Decrease).unwrap().next_tick_ms(), 300);
    }

    #[test]
    fn test_restart_after_stop_is_immediate() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, 500, 0);
        ramps.due(0);
        ramps.stop(Direction::Increase);
        ramps.start(Direction::Increase, 500, 100);
        assert_eq!(ramps.due(100), vec![Direction::Increase]);
    }

    #[test]
    fn test_directions_are_independent() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, 500, 0);
        ramps.start(Direction::Decrease, 300, 0);
        assert!(ramps.is_running(Direction::Increase));
        assert!(ramps.is_running(Direction::Decrease));

        ramps.stop(Direction::Decrease);
        assert!(ramps.is_running(Direction::Increase));
        assert_eq!(ramps.due(0), vec![Direction::Increase]);
    }

    #[test]
    fn test_stop_is_idempotent_and_final() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Decrease, 200, 0);
        assert!(ramps.stop(Direction::Decrease).is_some());
        assert!(ramps.stop(Direction::Decrease).is_none());
        assert!(ramps.due(10_000).is_empty());
        assert!(ramps.job(Direction::Decrease).is_none());
    }

    #[test]
    fn test_missed_intervals_are_skipped() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, 100, 0);
        assert_eq!(ramps.due(0).len(), 1);
        // Caller was late by several intervals: one tick, then back on schedule
        assert_eq!(ramps.due(550).len(), 1);
        assert_eq!(ramps.job(Direction::Increase).unwrap().next_tick_ms(), 650);
        assert!(ramps.due(600).is_empty());
    }

    #[test]
    fn test_huge_interval_saturates() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, u64::MAX, 1000);
        assert_eq!(ramps.due(1000), vec![Direction::Increase]);
        assert_eq!(
            ramps.job(Direction::Increase).unwrap().next_tick_ms(),
            u64::MAX
        );
        assert!(ramps.due(5000).is_empty());

        ramps.start(Direction::Increase, u64::MAX, 2000);
        assert_eq!(
            ramps.job(Direction::Increase).unwrap().next_tick_ms(),
            u64::MAX
        );
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let mut ramps = RampController::new();
        ramps.start(Direction::Increase, 0, 0);
        assert_eq!(ramps.job(Direction::Increase).unwrap().interval_ms, 1);
    }
}
