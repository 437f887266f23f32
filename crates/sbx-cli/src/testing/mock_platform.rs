//! Mock platform with simulated time
//!
//! Timers fire only when the test calls [`MockPlatform::advance`]. `sleep`
//! advances the clock itself, so awaiting it runs whatever falls due.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::{ready, Future};
use std::time::Duration;

use crate::error::StageError;
use crate::platform::{Platform, TimerTask};

struct PendingTimer {
    due: Duration,
    seq: u64,
    task: TimerTask,
}

/// Mock platform for unit and integration tests
pub struct MockPlatform {
    /// Simulated time since creation
    now: Cell<Duration>,
    timers: RefCell<Vec<PendingTimer>>,
    next_seq: Cell<u64>,
    /// Durations passed to `sleep`
    sleeps: RefCell<Vec<Duration>>,
    /// Canned fetch bodies by URL
    responses: RefCell<BTreeMap<String, Vec<u8>>>,
    /// URLs fetched, in order
    fetched: RefCell<Vec<String>>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            timers: RefCell::new(Vec::new()),
            next_seq: Cell::new(0),
            sleeps: RefCell::new(Vec::new()),
            responses: RefCell::new(BTreeMap::new()),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Advance simulated time, running timers as they fall due
    ///
    /// Timers run in due order (ties in scheduling order). A timer scheduled
    /// by a running task fires in the same call if it falls due in time.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        while let Some(timer) = self.take_next_due(target) {
            self.now.set(timer.due);
            (timer.task)();
        }
        self.now.set(target);
    }

    fn take_next_due(&self, target: Duration) -> Option<PendingTimer> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= target)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(timers.remove(index))
    }

    /// Number of timers not yet fired
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Durations awaited through `sleep`
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Serve `body` for `url`
    pub fn respond(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.responses
            .borrow_mut()
            .insert(String::from(url), body.into());
    }

    /// URLs fetched so far
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl Platform for MockPlatform {
    fn set_timeout(&self, delay: Duration, task: TimerTask) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().push(PendingTimer {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }

    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + '_ {
        self.sleeps.borrow_mut().push(delay);
        self.advance(delay);
        ready(())
    }

    fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Vec<u8>, StageError>> + 'a {
        self.fetched.borrow_mut().push(String::from(url));
        let body = self.responses.borrow().get(url).cloned();
        ready(body.ok_or_else(|| StageError::fetch(url, "404 Not Found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timers_fire_in_order() {
        let platform = MockPlatform::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (delay, tag) in [(300, "c"), (100, "a"), (100, "b")] {
            let order = order.clone();
            platform.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || order.borrow_mut().push(tag)),
            );
        }

        platform.advance(Duration::from_millis(99));
        assert!(order.borrow().is_empty());

        platform.advance(Duration::from_millis(1));
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(platform.pending_timers(), 1);

        platform.advance(Duration::from_millis(500));
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        assert_eq!(platform.now(), Duration::from_millis(600));
    }

    #[test]
    fn test_fetch_canned_response() {
        let platform = MockPlatform::new();
        platform.respond("https://x/a.txt", "hello");

        let body = pollster::block_on(platform.fetch("https://x/a.txt")).unwrap();
        assert_eq!(body, b"hello");

        let err = pollster::block_on(platform.fetch("https://x/missing")).unwrap_err();
        assert!(matches!(err, StageError::Fetch { .. }));
        assert_eq!(platform.fetched().len(), 2);
    }
}
