//! Host platform services: timers and network fetches.

use std::future::Future;
use std::time::Duration;

use crate::error::StageError;

/// Deferred task run by [`Platform::set_timeout`].
pub type TimerTask = Box<dyn FnOnce()>;

/// Services the hosting page provides to the CLI layer.
///
/// On wasm32 this is `setTimeout` and `fetch`; tests use
/// [`crate::testing::MockPlatform`] with simulated time.
pub trait Platform {
    /// Run `task` once after `delay`.
    fn set_timeout(&self, delay: Duration, task: TimerTask);

    /// Suspend the calling task for `delay`.
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + '_;

    /// Fetch a URL and return the response body.
    fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Vec<u8>, StageError>> + 'a;
}
