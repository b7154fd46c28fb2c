//! Volume write debouncing
//!
//! Holds at most one pending volume target. Scheduling replaces the previous
//! target and pushes the deadline out, so a burst of changes collapses into a
//! single device write once input goes quiet.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWrite {
    target: i32,
    deadline: Instant,
}

#[derive(Debug)]
pub struct VolumeDebounce {
    delay: Duration,
    pending: Option<PendingWrite>,
}

impl VolumeDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending write with `target`, due `delay` after `now`
    ///
    /// Returns true if an earlier pending write was superseded.
    pub fn schedule(&mut self, target: i32, now: Instant) -> bool {
        self.pending
            .replace(PendingWrite {
                target,
                deadline: now + self.delay,
            })
            .is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.deadline)
    }

    /// Target of the pending write, if any
    pub fn target(&self) -> Option<i32> {
        self.pending.map(|pending| pending.target)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending target if its deadline has passed
    pub fn take_due(&mut self, now: Instant) -> Option<i32> {
        match self.pending {
            Some(pending) if pending.deadline <= now => {
                self.pending = None;
                Some(pending.target)
            }
            _ => None,
        }
    }

    /// Drop the pending write, returning its target
    pub fn cancel(&mut self) -> Option<i32> {
        self.pending.take().map(|pending| pending.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_write_is_due_after_delay() {
        let mut debounce = VolumeDebounce::new(ms(500));
        let start = Instant::now();

        assert!(!debounce.schedule(-40, start));
        assert!(debounce.is_pending());
        assert_eq!(debounce.deadline(), Some(start + ms(500)));

        assert_eq!(debounce.take_due(start + ms(499)), None);
        assert_eq!(debounce.take_due(start + ms(500)), Some(-40));
        assert!(!debounce.is_pending());
        assert_eq!(debounce.take_due(start + ms(1000)), None);
    }

    #[test]
    fn test_reschedule_replaces_target_and_extends_deadline() {
        let mut debounce = VolumeDebounce::new(ms(500));
        let start = Instant::now();

        debounce.schedule(-65, start);
        assert!(debounce.schedule(-60, start + ms(200)));
        assert_eq!(debounce.target(), Some(-60));

        // The first deadline has passed but was superseded
        assert_eq!(debounce.take_due(start + ms(500)), None);
        assert_eq!(debounce.take_due(start + ms(700)), Some(-60));
    }

    #[test]
    fn test_cancel() {
        let mut debounce = VolumeDebounce::new(ms(500));
        assert_eq!(debounce.cancel(), None);

        debounce.schedule(-10, Instant::now());
        assert_eq!(debounce.cancel(), Some(-10));
        assert_eq!(debounce.deadline(), None);
    }
}
