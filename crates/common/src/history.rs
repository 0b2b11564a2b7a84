use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::model::PingOutcome;

pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Aggregates over the retained pings, maintained incrementally on append and
/// eviction so latency and uptime never need a rescan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollingStats {
    pub count: u64,
    pub ok_count: u64,
    pub sum_ok_ms: u64,
    /// History version this snapshot was last folded at.
    pub version: u64,
}

impl RollingStats {
    /// Full rescan; the reference every incremental snapshot must agree with.
    pub fn scan<'a>(pings: impl IntoIterator<Item = &'a PingOutcome>) -> Self {
        let mut stats = RollingStats::default();
        for ping in pings {
            stats.admit(ping);
        }
        stats
    }

    fn admit(&mut self, ping: &PingOutcome) {
        self.count += 1;
        if ping.code.is_ok() {
            self.ok_count += 1;
            self.sum_ok_ms += ping.elapsed_ms;
        }
    }

    // saturating: a diverged cache must not wrap
    fn evict(&mut self, ping: &PingOutcome) {
        self.count = self.count.saturating_sub(1);
        if ping.code.is_ok() {
            self.ok_count = self.ok_count.saturating_sub(1);
            self.sum_ok_ms = self.sum_ok_ms.saturating_sub(ping.elapsed_ms);
        }
    }

    /// Mean latency of successful pings; infinite when there are none.
    pub fn average_ms(&self) -> f64 {
        if self.ok_count == 0 {
            f64::INFINITY
        } else {
            self.sum_ok_ms as f64 / self.ok_count as f64
        }
    }

    pub fn uptime_percent(&self) -> u32 {
        if self.count == 0 {
            0
        } else {
            (100.0 * self.ok_count as f64 / self.count as f64).round() as u32
        }
    }

    /// Compares the aggregates, ignoring the version stamp.
    pub fn same_totals(&self, other: &RollingStats) -> bool {
        self.count == other.count
            && self.ok_count == other.ok_count
            && self.sum_ok_ms == other.sum_ok_ms
    }
}

/// Fixed-capacity FIFO of ping outcomes with an optional rolling snapshot.
#[derive(Debug, Clone)]
pub struct PingHistory {
    pings: VecDeque<PingOutcome>,
    cap: usize,
    version: u64,
    cache: Option<RollingStats>,
    cache_enabled: bool,
}

impl Default for PingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl PingHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            pings: VecDeque::with_capacity(cap),
            cap,
            version: 0,
            cache: Some(RollingStats::default()),
            cache_enabled: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PingOutcome> + '_ {
        self.pings.iter()
    }

    pub fn latest(&self) -> Option<&PingOutcome> {
        self.pings.back()
    }

    /// Appends a ping, evicting and returning the oldest when full.
    pub fn push(&mut self, ping: PingOutcome) -> Option<PingOutcome> {
        let evicted = if self.pings.len() >= self.cap {
            self.pings.pop_front()
        } else {
            None
        };
        self.version += 1;
        if let Some(cache) = self.cache.as_mut() {
            if let Some(old) = &evicted {
                cache.evict(old);
            }
            cache.admit(&ping);
            cache.version = self.version;
        }
        self.pings.push_back(ping);
        evicted
    }

    pub fn clear(&mut self) {
        self.pings.clear();
        self.version += 1;
        if self.cache_enabled {
            self.cache = Some(RollingStats {
                version: self.version,
                ..RollingStats::default()
            });
        }
    }

    /// The incremental snapshot, if present and current.
    pub fn snapshot(&self) -> Option<&RollingStats> {
        self.cache.as_ref().filter(|c| c.version == self.version)
    }

    /// Snapshot when usable, otherwise an O(history) scan.
    pub fn stats(&self) -> RollingStats {
        match self.snapshot() {
            Some(cached) => *cached,
            None => self.recompute(),
        }
    }

    pub fn recompute(&self) -> RollingStats {
        RollingStats {
            version: self.version,
            ..RollingStats::scan(&self.pings)
        }
    }

    /// Compares the snapshot against a rescan. Never patches the cache.
    pub fn check_consistency(&self) -> Result<()> {
        let Some(cached) = self.cache else {
            return Ok(());
        };
        let expected = self.recompute();
        if cached.same_totals(&expected) {
            Ok(())
        } else {
            Err(Error::CacheDivergence { cached, expected })
        }
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Disabling drops the snapshot; enabling rebuilds it from a scan.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        self.cache = enabled.then(|| self.recompute());
    }

    #[cfg(test)]
    fn corrupt_cache(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.sum_ok_ms += 1;
        }
    }
}
