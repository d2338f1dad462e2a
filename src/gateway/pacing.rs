//! Fixed-interval gate that keeps provider calls under a rate limit.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces call starts at least `interval` apart.
///
/// Callers that arrive early wait for the next free slot. A zero interval
/// disables pacing.
#[derive(Debug)]
pub struct IntervalGate {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot and reserve the one after it.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}
