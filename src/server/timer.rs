use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Activity timeout for one connection.
///
/// Armed once when the connection is accepted. Every [`touch`](Self::touch)
/// pushes the deadline forward; [`expired`](Self::expired) resolves once the
/// connection has been idle for the whole timeout. Clones share the same
/// deadline, so the writer can report progress while the connection waits.
#[derive(Debug, Clone)]
pub struct IdleTimer {
    origin: Instant,
    /// Milliseconds after `origin` of the last recorded activity
    last_activity: Arc<AtomicU64>,
    timeout: Duration,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            origin: Instant::now(),
            last_activity: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_activity.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn deadline(&self) -> Instant {
        let last = Duration::from_millis(self.last_activity.load(Ordering::Relaxed));
        self.origin + last + self.timeout
    }

    /// Resolves when no activity was recorded for a full timeout period.
    pub async fn expired(&self) {
        loop {
            let deadline = self.deadline();
            if Instant::now() >= deadline {
                return;
            }
            sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expires_after_idle_period() {
        let timer = IdleTimer::new(Duration::from_millis(50));
        let start = Instant::now();

        timer.expired().await;

        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn touch_pushes_deadline_forward() {
        let timer = IdleTimer::new(Duration::from_millis(100));
        let start = Instant::now();

        tokio::time::sleep(Duration::from_millis(60)).await;
        timer.touch();

        timer.expired().await;

        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
