//! Inter-navigation delay.

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Random delay in `[min, max)` between navigations, reduced by the time
/// already spent since the previous one.
#[derive(Debug)]
pub struct Throttle {
    min: Duration,
    max: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
            last: None,
        }
    }

    fn jitter(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..self.max)
    }

    /// Remaining delay for a drawn `target` given `elapsed` since the last
    /// navigation.
    pub fn remaining(target: Duration, elapsed: Option<Duration>) -> Duration {
        match elapsed {
            Some(elapsed) => target.saturating_sub(elapsed),
            None => Duration::ZERO,
        }
    }

    /// Sleep as needed, then mark a navigation as starting now.
    pub async fn wait(&mut self) {
        let target = self.jitter();
        let elapsed = self.last.map(|last| last.elapsed());
        let delay = Self::remaining(target, elapsed);
        if !delay.is_zero() {
            trace!("Throttling navigation for {:?}", delay);
            sleep(delay).await;
        }
        self.last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_navigation_is_immediate() {
        assert_eq!(
            Throttle::remaining(Duration::from_millis(500), None),
            Duration::ZERO
        );
    }

    #[test]
    fn test_elapsed_time_counts() {
        assert_eq!(
            Throttle::remaining(Duration::from_millis(500), Some(Duration::from_millis(200))),
            Duration::from_millis(300)
        );
        assert_eq!(
            Throttle::remaining(Duration::from_millis(500), Some(Duration::from_secs(2))),
            Duration::ZERO
        );
    }

    #[test]
    fn test_jitter_in_window() {
        let throttle = Throttle::new(100, 200);
        for _ in 0..50 {
            let j = throttle.jitter();
            assert!(j >= Duration::from_millis(100) && j < Duration::from_millis(200));
        }
        assert_eq!(Throttle::new(50, 50).jitter(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_between_navigations() {
        let mut throttle = Throttle::new(1_000, 1_001);
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_millis(10));
        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(1_000));
    }
}
