use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter (spec §4.7): `delay = min(maxDelay, base
/// * factor^retries) ± jitter%`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_retries: 5,
            jitter_pct: 0.2,
        }
    }
}

impl RetryPolicy {
    /// `retries` is the attempt number about to be scheduled (1-based).
    pub fn delay_for(&self, retries: u32) -> Duration {
        let unjittered = self.base.as_secs_f64() * self.factor.powi(retries as i32);
        let capped = unjittered.min(self.max_delay.as_secs_f64());
        let jitter_span = capped * self.jitter_pct;
        let jitter = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_retries_and_respects_cap() {
        let policy = RetryPolicy {
            jitter_pct: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        // factor^10 would blow past max_delay without the cap.
        assert_eq!(policy.delay_for(10), policy.max_delay);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay_for(3).as_secs_f64();
            let base = (policy.base.as_secs_f64() * policy.factor.powi(3)).min(policy.max_delay.as_secs_f64());
            assert!(d >= base * (1.0 - policy.jitter_pct) - 0.001);
            assert!(d <= base * (1.0 + policy.jitter_pct) + 0.001);
        }
    }
}
