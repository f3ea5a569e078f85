/*!
Test harness for Meteonet integration tests

Sets up logging once per test binary and offers polling helpers for
state that changes asynchronously (broker tables, station settings).
*/

use std::future::Future;
use std::time::{Duration, Instant};

/// Generous upper bound for anything a test waits on.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(3);

pub struct TestHarness {
    pub wait: Duration,
    poll_every: Duration,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok(); // logging for tests, RUST_LOG driven

        Self {
            wait: DEFAULT_WAIT,
            poll_every: Duration::from_millis(20),
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Polls `condition` until it holds or the harness wait elapses.
    pub async fn wait_until<F>(&self, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();
        while start.elapsed() < self.wait {
            if condition() {
                return true;
            }
            tokio::time::sleep(self.poll_every).await;
        }
        let last = condition();
        if !last {
            log::warn!("⏰ condition still false after {:?}", self.wait);
        }
        last
    }

    /// Runs `fut` and returns how long it took.
    pub async fn timed<F, T>(&self, fut: F) -> (T, Duration)
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let out = fut.await;
        (out, start.elapsed())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_wait_until_sees_late_change() {
        let harness = TestHarness::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let bump = counter.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            bump.store(1, Ordering::SeqCst);
        });
        assert!(harness.wait_until(|| counter.load(Ordering::SeqCst) == 1).await);
    }

    #[tokio::test]
    async fn test_wait_until_gives_up() {
        let harness = TestHarness::new().with_wait(Duration::from_millis(80));
        let ((), elapsed) = harness.timed(async {
            assert!(!harness.wait_until(|| false).await);
        })
        .await;
        assert!(elapsed >= Duration::from_millis(80));
    }
}
