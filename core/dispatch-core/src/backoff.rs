use rand::Rng;
use std::cmp;
use std::time::Duration;

use crate::config::ReconnectConfig;

/// Delay schedule for push-channel reconnects: linear steps capped at a
/// maximum, plus random jitter so clients don't reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    config: ReconnectConfig,
    failures: u32,
}

impl ReconnectBackoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Records a failed attempt and returns how long to wait before the next.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        };
        Duration::from_millis(compute_backoff(&self.config, self.failures).saturating_add(jitter))
    }

    /// Called after a connection was established.
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

fn compute_backoff(config: &ReconnectConfig, failures: u32) -> u64 {
    if failures == 0 {
        return 0;
    }
    let backoff = config.step_ms.saturating_mul(u64::from(failures));
    cmp::min(backoff, config.max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter_ms: u64) -> ReconnectConfig {
        ReconnectConfig {
            step_ms: 100,
            max_ms: 350,
            jitter_ms,
        }
    }

    #[test]
    fn compute_backoff_grows_then_caps() {
        let config = config(0);
        assert_eq!(compute_backoff(&config, 0), 0);
        assert_eq!(compute_backoff(&config, 1), 100);
        assert_eq!(compute_backoff(&config, 3), 300);
        assert_eq!(compute_backoff(&config, 4), 350);
        assert_eq!(compute_backoff(&config, u32::MAX), 350);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let mut backoff = ReconnectBackoff::new(config(50));
        for attempt in 1..=10u64 {
            let delay = backoff.next_delay().as_millis() as u64;
            let base = cmp::min(100 * attempt, 350);
            assert!(delay >= base && delay <= base + 50, "delay {}", delay);
        }
    }

    #[test]
    fn reset_starts_over() {
        let mut backoff = ReconnectBackoff::new(config(0));
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.failures(), 2);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
