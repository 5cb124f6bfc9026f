use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Global running flag shared by the producer threads and the driver.
///
/// Shutdown is cooperative: loops check `is_running()` between iterations and
/// every sleep is sliced so a stop request is noticed quickly.
#[derive(Debug, Clone, Default)]
pub struct RunFlag {
    token: CancellationToken,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Async side of the flag, for the tokio driver.
    pub async fn stopped(&self) {
        self.token.cancelled().await
    }

    /// Blocking sleep that returns early on stop.
    /// Returns `true` if the full duration elapsed while still running.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_returns_early_once_stopped() {
        let flag = RunFlag::new();
        let remote = flag.clone();
        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let completed = remote.sleep(Duration::from_secs(10));
            (completed, started.elapsed())
        });
        std::thread::sleep(Duration::from_millis(20));
        flag.stop();
        let (completed, elapsed) = handle.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(2));
        assert!(!flag.is_running());
    }
}
