//! Fixed-interval tick scheduling for the refresh loop.

use std::time::{Duration, Instant};

/// Fires once per elapsed interval. Ticks missed while the caller was busy
/// are skipped, not replayed.
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    interval: Duration,
    next_due: Instant,
}

impl IntervalScheduler {
    /// First tick is due immediately
    #[must_use]
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: now,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True if a tick is due at `now`, in which case the next one is scheduled
    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }

        self.next_due += self.interval;
        if self.next_due <= now {
            // Fell behind by at least a whole interval, realign
            self.next_due = now + self.interval;
        }
        true
    }

    #[must_use]
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Make the next tick due immediately
    pub fn reset(&mut self, now: Instant) {
        self.next_due = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_first_tick_immediate() {
        let start = Instant::now();
        let mut scheduler = IntervalScheduler::new(SECOND, start);
        assert!(scheduler.poll(start));
        assert!(!scheduler.poll(start));
        assert_eq!(scheduler.time_until_next(start), SECOND);
    }

    #[test]
    fn test_once_per_interval() {
        let start = Instant::now();
        let mut scheduler = IntervalScheduler::new(SECOND, start);

        let mut fired = 0;
        // Poll every 100ms for 5 seconds
        for step in 0..50 {
            if scheduler.poll(start + Duration::from_millis(step * 100)) {
                fired += 1;
            }
        }
        assert_eq!(fired, 5);
    }

    #[test]
    fn test_missed_ticks_are_skipped() {
        let start = Instant::now();
        let mut scheduler = IntervalScheduler::new(SECOND, start);
        assert!(scheduler.poll(start));

        // Caller stalled for 3.5 intervals: one tick, then wait a full interval
        let late = start + Duration::from_millis(3500);
        assert!(scheduler.poll(late));
        assert!(!scheduler.poll(late));
        assert_eq!(scheduler.time_until_next(late), SECOND);
    }

    #[test]
    fn test_small_delay_keeps_cadence() {
        let start = Instant::now();
        let mut scheduler = IntervalScheduler::new(SECOND, start);
        assert!(scheduler.poll(start));

        let slightly_late = start + Duration::from_millis(1200);
        assert!(scheduler.poll(slightly_late));
        assert_eq!(scheduler.time_until_next(slightly_late), Duration::from_millis(800));
    }

    #[test]
    fn test_reset() {
        let start = Instant::now();
        let mut scheduler = IntervalScheduler::new(SECOND, start);
        assert!(scheduler.poll(start));
        scheduler.reset(start);
        assert_eq!(scheduler.time_until_next(start), Duration::ZERO);
        assert!(scheduler.poll(start));
    }
}
