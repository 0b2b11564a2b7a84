use std::time::Duration;

use tokio::time::Instant;

/// Minimum spacing between frames.
pub const RENDER_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// Coalesces render requests: the first request inside a window schedules
/// one trailing render, later requests in the same window ride along.
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    min: Duration,
    last: Option<Instant>,
    scheduled: Option<Instant>,
}

impl RenderThrottle {
    pub fn new(min: Duration) -> Self {
        Self {
            min,
            last: None,
            scheduled: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        if self.scheduled.is_some() {
            return;
        }
        let at = match self.last {
            Some(last) => (last + self.min).max(now),
            None => now,
        };
        self.scheduled = Some(at);
    }

    pub fn due(&self) -> Option<Instant> {
        self.scheduled
    }

    /// True when a scheduled render has come due; marks it as rendered.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.scheduled {
            Some(at) if at <= now => {
                self.scheduled = None;
                self.last = Some(now);
                true
            }
            _ => false,
        }
    }
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(RENDER_MIN_INTERVAL)
    }
}
