//! Probing engine: keep-alive pool, prober, bounded runner, backoff,
//! staleness guard and the round orchestration built on top of them.

mod backoff;
mod epoch;
mod limiter;
mod pool;
mod prober;
mod runner;
mod session;

pub use prober::{HttpProber, Probe};
pub use runner::{lock, probe_best, BestOptions, ProbeContext, ProbeLoop, RoundSummary};
pub use session::{Session, SessionConfig};

#[cfg(test)]
pub(crate) use prober::ProbeTarget;
#[cfg(test)]
pub(crate) use session::{tests as fixtures, ProbeDone};

use std::time::Duration;

pub const DEFAULT_INTERVAL_MS: u64 = 3_000;
/// Bounds on the pause between rounds, from config or live edits.
pub const MIN_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
