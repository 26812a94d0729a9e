//! Two-timer debounce for whole-workspace refreshes.
//!
//! A burst of changes is batched behind a short delay. Under continuous
//! changes a longer repeating timer forces a refresh anyway, then keeps
//! re-arming for as long as changes keep arriving.
//!
//! The scheduler owns no thread and reads no clock: callers pass `now` in
//! and ask for [`RefreshScheduler::next_deadline`] to know how long they
//! may block.

use std::time::{Duration, Instant};

use thrd_core::settings::RefreshSettings;

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    initial_delay: Duration,
    repeat_delay: Duration,
    short_deadline: Option<Instant>,
    long_deadline: Option<Instant>,
    scheduled_during_long: bool,
}

impl RefreshScheduler {
    pub fn new(initial_delay: Duration, repeat_delay: Duration) -> Self {
        RefreshScheduler {
            initial_delay,
            repeat_delay,
            short_deadline: None,
            long_deadline: None,
            scheduled_during_long: false,
        }
    }

    pub fn from_settings(settings: &RefreshSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.initial_delay_ms),
            Duration::from_millis(settings.repeat_delay_ms),
        )
    }

    /// Ask for a refresh.
    ///
    /// Absorbed while the short timer is armed; remembered for the long
    /// timer's expiry while only that one is armed.
    pub fn schedule(&mut self, now: Instant) {
        if self.short_deadline.is_some() {
            return;
        }
        if self.long_deadline.is_some() {
            self.scheduled_during_long = true;
        } else {
            self.short_deadline = Some(now + self.initial_delay);
            self.long_deadline = Some(now + self.repeat_delay);
        }
    }

    /// Expire timers due at `now`. Returns whether a refresh should run.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut fire = false;
        if self.short_deadline.is_some_and(|at| at <= now) {
            self.short_deadline = None;
            fire = true;
        }
        if self.long_deadline.is_some_and(|at| at <= now) {
            if self.scheduled_during_long {
                self.scheduled_during_long = false;
                self.long_deadline = Some(now + self.repeat_delay);
                fire = true;
            } else {
                self.long_deadline = None;
            }
        }
        fire
    }

    /// Earliest instant at which [`poll`](Self::poll) can change state.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.short_deadline, self.long_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.next_deadline().is_none()
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::from_settings(&RefreshSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scheduler() -> (RefreshScheduler, Instant) {
        (RefreshScheduler::new(ms(20), ms(500)), Instant::now())
    }

    #[test]
    fn idle_scheduler_never_fires() {
        let (mut s, t0) = scheduler();
        assert!(s.is_idle());
        assert!(!s.poll(t0 + ms(10_000)));
    }

    #[test]
    fn burst_is_batched_into_one_refresh() {
        let (mut s, t0) = scheduler();
        s.schedule(t0);
        s.schedule(t0 + ms(5));
        s.schedule(t0 + ms(10));
        assert_eq!(s.next_deadline(), Some(t0 + ms(20)));
        assert!(!s.poll(t0 + ms(19)));
        assert!(s.poll(t0 + ms(20)), "short timer fires");
        // Nothing arrived during the long timer, so it lapses quietly.
        assert!(!s.poll(t0 + ms(500)));
        assert!(s.is_idle());
    }

    #[test]
    fn change_after_short_timer_waits_for_long_timer() {
        let (mut s, t0) = scheduler();
        s.schedule(t0);
        assert!(s.poll(t0 + ms(20)));
        s.schedule(t0 + ms(100));
        assert_eq!(s.next_deadline(), Some(t0 + ms(500)));
        assert!(!s.poll(t0 + ms(499)));
        assert!(s.poll(t0 + ms(500)), "remembered change fires on long expiry");
        assert_eq!(
            s.next_deadline(),
            Some(t0 + ms(1000)),
            "long timer re-arms after a forced refresh"
        );
        assert!(!s.poll(t0 + ms(1000)));
        assert!(s.is_idle());
    }

    #[test]
    fn continuous_changes_refresh_at_the_repeat_interval() {
        let (mut s, t0) = scheduler();
        let mut fired = Vec::new();
        for step in 0..=150u64 {
            let now = t0 + ms(step * 10);
            if s.poll(now) {
                fired.push(step * 10);
            }
            s.schedule(now);
        }
        assert_eq!(fired, vec![20, 500, 1000, 1500]);
    }

    #[test]
    fn after_lapse_a_new_burst_starts_fresh() {
        let (mut s, t0) = scheduler();
        s.schedule(t0);
        assert!(s.poll(t0 + ms(20)));
        assert!(!s.poll(t0 + ms(500)));
        s.schedule(t0 + ms(600));
        assert_eq!(s.next_deadline(), Some(t0 + ms(620)));
        assert!(s.poll(t0 + ms(620)));
    }
}
