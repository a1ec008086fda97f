//! Restartable save timer owned by one document store.

use std::time::{Duration, Instant};

/// Debounce deadline tracker; the caller polls it with the current instant.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    delay: Duration,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    At(Instant),
    /// The delay overflows the clock; only an explicit save flushes it.
    Never,
}

impl SaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Starts the timer, or restarts it if already pending.
    pub fn schedule(&mut self, now: Instant) {
        self.pending = Some(match now.checked_add(self.delay) {
            Some(deadline) => Pending::At(deadline),
            None => Pending::Never,
        });
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Instant the pending save comes due; `None` when idle or never due.
    pub fn deadline(&self) -> Option<Instant> {
        match self.pending {
            Some(Pending::At(deadline)) => Some(deadline),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Consumes the deadline when it has elapsed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.pending = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::SaveDebouncer;
    use std::time::{Duration, Instant};

    #[test]
    fn rescheduling_pushes_the_deadline_back() {
        let start = Instant::now();
        let mut debouncer = SaveDebouncer::new(Duration::from_millis(1000));
        debouncer.schedule(start);
        debouncer.schedule(start + Duration::from_millis(600));

        assert!(!debouncer.is_due(start + Duration::from_millis(1000)));
        assert!(debouncer.take_due(start + Duration::from_millis(1600)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn overflowing_delay_stays_pending_but_never_due() {
        let start = Instant::now();
        let mut debouncer = SaveDebouncer::new(Duration::MAX);
        debouncer.schedule(start);

        assert!(debouncer.is_pending());
        assert_eq!(debouncer.deadline(), None);
        assert!(!debouncer.take_due(start + Duration::from_secs(3600)));
        debouncer.cancel();
        assert!(!debouncer.is_pending());
    }
}
