use common::PingCode;

pub const BACKOFF_THRESHOLD: u32 = 3;
pub const MAX_SKIP_ROUNDS: u64 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Consecutive failures before an entity starts skipping rounds.
    pub threshold: u32,
    pub max_skip_rounds: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            threshold: BACKOFF_THRESHOLD,
            max_skip_rounds: MAX_SKIP_ROUNDS,
        }
    }
}

impl BackoffPolicy {
    /// `min(max, 2^(failures - threshold))` rounds once past the threshold.
    pub fn skip_rounds(&self, failures: u32) -> u64 {
        if failures < self.threshold {
            return 0;
        }
        1u64.checked_shl(failures - self.threshold)
            .unwrap_or(u64::MAX)
            .min(self.max_skip_rounds)
    }
}

/// Per-entity failure streak. Skip windows are measured in rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backoff {
    pub failures: u32,
    /// Last round (inclusive) this entity sits out.
    pub skip_until: Option<u64>,
}

impl Backoff {
    pub fn is_skipped(&self, round: u64) -> bool {
        self.skip_until.is_some_and(|last| round <= last)
    }

    pub fn record(&mut self, code: PingCode, round: u64, policy: &BackoffPolicy) {
        if code.is_reachable() {
            *self = Backoff::default();
            return;
        }
        self.failures = self.failures.saturating_add(1);
        let skip = policy.skip_rounds(self.failures);
        if skip > 0 {
            self.skip_until = Some(round.saturating_add(skip));
        }
    }

    pub fn reset(&mut self) {
        *self = Backoff::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_then_exponential_growth_capped() {
        let policy = BackoffPolicy::default();
        let mut b = Backoff::default();
        let round = 10;
        b.record(PingCode::Http(500), round, &policy);
        b.record(PingCode::Timeout, round, &policy);
        assert_eq!(b.skip_until, None);
        b.record(PingCode::Error, round, &policy);
        assert_eq!(b.failures, 3);
        assert_eq!(b.skip_until, Some(round + 1));

        let mut windows = Vec::new();
        for _ in 0..3 {
            b.record(PingCode::Timeout, round, &policy);
            windows.push(b.skip_until.unwrap() - round);
        }
        assert_eq!(windows, vec![2, 4, 8]);

        for _ in 0..10 {
            b.record(PingCode::Timeout, round, &policy);
        }
        assert_eq!(b.skip_until, Some(round + MAX_SKIP_ROUNDS));
    }

    #[test]
    fn counter_is_monotonic_until_success() {
        let policy = BackoffPolicy::default();
        let mut b = Backoff::default();
        let mut last_skip = 0;
        for (round, n) in (1..=8).zip(1u32..) {
            b.record(PingCode::Http(503), round, &policy);
            assert_eq!(b.failures, n);
            let skip = b.skip_until.unwrap_or(0);
            assert!(skip >= last_skip);
            last_skip = skip;
        }
        b.record(PingCode::Http(401), 9, &policy);
        assert_eq!(b, Backoff::default());
        assert!(!b.is_skipped(9));
    }

    #[test]
    fn skip_window_is_inclusive() {
        let b = Backoff {
            failures: 3,
            skip_until: Some(5),
        };
        assert!(b.is_skipped(4));
        assert!(b.is_skipped(5));
        assert!(!b.is_skipped(6));
    }
}
