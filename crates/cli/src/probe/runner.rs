use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use common::{Catalog, CredentialResolver, EntityKey, Error, Status};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::limiter::run_pooled;
use super::prober::Probe;
use super::session::{Commit, ProbeDone, ProbeJob, Session};

/// Session shared between the probe loop and the UI. Guards are only held
/// for synchronous bookkeeping, never across an await.
pub type SharedSession = Arc<Mutex<Session>>;

pub fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collaborators a probe round needs.
#[derive(Clone)]
pub struct ProbeContext {
    pub session: SharedSession,
    pub prober: Arc<dyn Probe>,
    pub catalog: Arc<dyn Catalog>,
    pub credentials: Arc<dyn CredentialResolver>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u64,
    pub probed: usize,
    pub applied: usize,
    pub stale: usize,
    pub skipped: usize,
}

/// Runs one round: first-contact entities first, then the steady pass.
/// `active` is consulted before each commit; once it reports false results
/// are discarded.
pub async fn run_round<F, A>(ctx: &ProbeContext, mut active: A, mut on_probe: F) -> RoundSummary
where
    F: FnMut(&ProbeDone, Commit),
    A: FnMut() -> bool,
{
    let (plan, config) = {
        let mut session = lock(&ctx.session);
        let plan = session.plan_round(ctx.credentials.as_ref());
        (plan, session.config().clone())
    };
    let mut summary = RoundSummary {
        round: plan.round,
        probed: plan.len(),
        skipped: plan.skipped,
        ..RoundSummary::default()
    };
    if plan.is_empty() {
        debug!(round = plan.round, skipped = plan.skipped, "nothing to probe this round");
        return summary;
    }

    let passes = [
        (plan.first_contact, config.first_contact.concurrency),
        (plan.steady, config.steady.concurrency),
    ];
    for (jobs, concurrency) in passes {
        if jobs.is_empty() {
            continue;
        }
        let prober = ctx.prober.clone();
        run_pooled(
            jobs,
            concurrency,
            |job: ProbeJob| {
                let prober = prober.clone();
                async move {
                    let outcome = prober.probe(&job.target).await;
                    ProbeDone {
                        key: job.key,
                        round: job.round,
                        ticket: job.ticket,
                        outcome,
                    }
                }
            },
            |_, done| {
                if !active() {
                    return;
                }
                let commit = lock(&ctx.session).commit(done.clone());
                match commit {
                    Commit::Applied(_) => summary.applied += 1,
                    Commit::Stale => summary.stale += 1,
                    Commit::Vanished => {}
                }
                on_probe(done, commit);
            },
        )
        .await;
    }
    summary
}

/// Handle for the continuous probing loop. Dropping the handle ends the
/// loop at its next wait.
pub struct ProbeLoop {
    stop_tx: watch::Sender<bool>,
    interval_tx: watch::Sender<Duration>,
    handle: JoinHandle<()>,
}

impl ProbeLoop {
    /// Fires a round immediately, then again `interval` after each round
    /// completes. The catalog is re-read before every round.
    pub fn start<R, P>(ctx: ProbeContext, interval: Duration, mut on_round: R, mut on_probe: P) -> Self
    where
        R: FnMut(RoundSummary) + Send + 'static,
        P: FnMut(&ProbeDone, Commit) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (interval_tx, mut interval_rx) = watch::channel(interval);
        let handle = tokio::spawn(async move {
            loop {
                lock(&ctx.session).refresh(ctx.catalog.as_ref());
                let stop_flag = stop_rx.clone();
                let summary = run_round(&ctx, || !*stop_flag.borrow(), &mut on_probe).await;
                if *stop_rx.borrow() {
                    break;
                }
                debug!(round = summary.round, probed = summary.probed, stale = summary.stale, "probe round complete");
                on_round(summary);

                let wait = *interval_rx.borrow_and_update();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = interval_rx.changed() => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if *stop_rx.borrow() || stop_rx.has_changed().is_err() {
                    break;
                }
            }
            info!("probe loop stopped");
        });
        Self {
            stop_tx,
            interval_tx,
            handle,
        }
    }

    /// Takes effect for the next wait; a pending wait is cut short.
    pub fn set_interval(&self, interval: Duration) {
        let _ = self.interval_tx.send(interval);
    }

    /// Cooperative: no new round starts and in-flight results are ignored.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stops the loop, cancels any probes still in flight and waits for the
    /// task to wind down.
    pub async fn shutdown(self) {
        self.stop();
        self.handle.abort();
        match self.handle.await {
            Err(e) if e.is_panic() => warn!(error=%e, "probe loop panicked"),
            _ => {}
        }
    }
}

/// Early-exit rule for batch selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestOptions {
    pub passes: usize,
    /// Successful pings the leader needs before an early decision.
    pub min_confirmations: u64,
    pub max_avg_ms: f64,
    /// Runner-up must be at least this many times slower.
    pub margin: f64,
}

impl Default for BestOptions {
    fn default() -> Self {
        Self {
            passes: 4,
            min_confirmations: 3,
            max_avg_ms: 1_500.0,
            margin: 1.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Clearly superior and confirmed; no more passes needed.
    Decided(EntityKey),
    Leading(EntityKey),
    NoneUp,
}

/// Ranks up entities by average latency and applies the early-exit rule.
pub fn judge(session: &Session, opts: &BestOptions) -> Verdict {
    let mut ranked: Vec<(f64, u64, &EntityKey)> = session
        .entities()
        .iter()
        .filter(|e| e.status == Status::Up)
        .map(|e| {
            let stats = e.stats();
            (stats.average_ms(), stats.ok_count, &e.key)
        })
        .filter(|(avg, _, _)| avg.is_finite())
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let Some(&(avg, confirmations, leader)) = ranked.first() else {
        return Verdict::NoneUp;
    };
    let clear_margin = ranked
        .get(1)
        .map_or(true, |(runner_up, _, _)| *runner_up >= avg * opts.margin);
    if confirmations >= opts.min_confirmations && avg <= opts.max_avg_ms && clear_margin {
        Verdict::Decided(leader.clone())
    } else {
        Verdict::Leading(leader.clone())
    }
}

/// Probes everything, pass after pass, until a winner is clear or the pass
/// budget runs out.
pub async fn probe_best(ctx: &ProbeContext, opts: &BestOptions) -> Result<EntityKey, Error> {
    lock(&ctx.session).refresh(ctx.catalog.as_ref());
    let mut verdict = Verdict::NoneUp;
    for pass in 1..=opts.passes.max(1) {
        let summary = run_round(ctx, || true, |_, _| {}).await;
        verdict = judge(&lock(&ctx.session), opts);
        info!(pass, probed = summary.probed, verdict = ?verdict, "batch pass complete");
        if let Verdict::Decided(key) = verdict {
            return Ok(key);
        }
    }
    match verdict {
        Verdict::Decided(key) | Verdict::Leading(key) => Ok(key),
        Verdict::NoneUp => Err(Error::NoReachableEntity),
    }
}
