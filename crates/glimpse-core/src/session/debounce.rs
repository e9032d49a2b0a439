//! Trailing-edge debounce for edit-triggered renders.

use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// (Re)arm: every call pushes the deadline out by the full delay.
    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes at the deadline and disarms. Pending forever while disarmed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_pushes_deadline() {
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();
        debounce.schedule();
        tokio::time::sleep(Duration::from_millis(60)).await;
        debounce.schedule();
        debounce.fired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(160));
        assert!(!debounce.is_pending());
    }
}
