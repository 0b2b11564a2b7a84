use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::{EntityKey, Error, Tier};
use crossterm::{cursor, execute, terminal};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{CredentialStore, Settings};
use crate::export::{Exporters, Selection};
use crate::probe::{lock, Probe, ProbeContext, ProbeLoop, Session};

use super::draw::{self, Geometry};
use super::events::{handle_key, Action};
use super::input::{spawn_input, ESC_GRACE};
use super::state::{App, AppEvent};
use super::throttle::RenderThrottle;

const TICK: Duration = Duration::from_secs(1);

/// Everything the dashboard needs from the host.
pub struct Dashboard {
    pub ctx: ProbeContext,
    pub credentials: Arc<CredentialStore>,
    pub exporters: Exporters,
    pub settings: Settings,
    pub tier: Option<Tier>,
}

enum Flow {
    Idle,
    Redraw,
    Quit,
}

/// Raw mode plus alternate screen for as long as the guard lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enabling raw mode")?;
        let guard = Self;
        let mut stdout = std::io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)
            .context("entering alternate screen")?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Runs the interactive dashboard until the user quits. The terminal is
/// restored before this returns.
pub async fn run_dashboard(dash: Dashboard) -> anyhow::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    spawn_input(tx.clone(), ESC_GRACE);
    spawn_ticker(tx.clone());
    spawn_resize_watch(tx.clone());

    let probe_loop = {
        let round_tx = tx.clone();
        let probe_tx = tx.clone();
        ProbeLoop::start(
            dash.ctx.clone(),
            dash.settings.interval,
            move |summary| {
                let _ = round_tx.send(AppEvent::Round(summary));
            },
            move |_, _| {
                let _ = probe_tx.send(AppEvent::Probe);
            },
        )
    };
    info!(interval_ms = dash.settings.interval.as_millis() as u64, "dashboard started");

    let mut app = App::new(dash.settings.interval, dash.settings.notice);
    app.tier_filter = dash.tier;
    let mut throttle = RenderThrottle::default();
    throttle.request(Instant::now());
    let mut stdout = std::io::stdout();

    let result = loop {
        let due = throttle.due();
        tokio::select! {
            evt = rx.recv() => {
                let Some(evt) = evt else {
                    break Ok(());
                };
                match on_event(&mut app, evt, &dash, &probe_loop, Instant::now()) {
                    Flow::Quit => break Ok(()),
                    Flow::Redraw => throttle.request(Instant::now()),
                    Flow::Idle => {}
                }
            }
            _ = tokio::time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {}
        }
        if throttle.take_due(Instant::now()) {
            app.sync(&lock(&dash.ctx.session), &dash.credentials);
            let frame = draw::render(&mut app, Geometry::probe(), &dash.exporters, &clock());
            if let Err(e) = stdout.write_all(frame.as_bytes()).and_then(|_| stdout.flush()) {
                break Err(e).context("writing frame");
            }
        }
    };

    probe_loop.shutdown().await;
    dash.ctx.prober.shutdown().await;
    info!("dashboard closed");
    result
}

fn clock() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn on_event(app: &mut App, evt: AppEvent, dash: &Dashboard, probe_loop: &ProbeLoop, now: Instant) -> Flow {
    match evt {
        AppEvent::Key(key) => {
            app.sync(&lock(&dash.ctx.session), &dash.credentials);
            let action = handle_key(app, key, dash.exporters.len());
            apply(app, action, dash, |interval| probe_loop.set_interval(interval), now)
        }
        AppEvent::Round(summary) => {
            app.last_round = Some(summary);
            Flow::Redraw
        }
        AppEvent::Tick => {
            app.expire_notice(now);
            Flow::Redraw
        }
        AppEvent::Probe | AppEvent::Resize => Flow::Redraw,
    }
}

fn apply<F>(app: &mut App, action: Action, dash: &Dashboard, set_interval: F, now: Instant) -> Flow
where
    F: FnOnce(Duration),
{
    let session = &dash.ctx.session;
    match action {
        Action::None => return Flow::Idle,
        Action::Redraw => {}
        Action::Quit => return Flow::Quit,
        Action::SetInterval(interval) => {
            set_interval(interval);
            info!(interval_ms = interval.as_millis() as u64, "probe interval changed");
            app.notify(format!("probing every {:.1}s", interval.as_secs_f64()), now);
        }
        Action::ResetProbes => {
            let epoch = {
                let mut s = lock(session);
                s.invalidate();
                s.epoch()
            };
            info!(epoch, "probes reset");
            app.notify(format!("probes reset, epoch {epoch}"), now);
        }
        Action::ToggleCache => {
            let enabled = {
                let mut s = lock(session);
                let enabled = !s.cache_enabled();
                s.set_cache_enabled(enabled);
                enabled
            };
            let state = if enabled { "on" } else { "off, rescanning history" };
            app.notify(format!("metrics cache {state}"), now);
        }
        Action::CheckCaches => match lock(session).check_caches() {
            Ok(()) => app.notify("metrics cache matches full rescan", now),
            Err(e) => {
                warn!(error=%e, "metrics cache check failed");
                app.notify(e.to_string(), now);
            }
        },
        Action::Export { target, entity } => {
            let selection = selection_for(&lock(session), &entity);
            let outcome = selection
                .map_err(anyhow::Error::from)
                .and_then(|sel| dash.exporters.export(target, &sel));
            match outcome {
                Ok(msg) => {
                    info!(entity=%entity, target, "exported selection");
                    app.notify(msg, now);
                }
                Err(e) => {
                    warn!(entity=%entity, target, error=%format!("{e:#}"), "export failed");
                    app.notify(format!("export failed: {e:#}"), now);
                }
            }
        }
        Action::SetKey { provider, key } => {
            dash.credentials.set(&provider, key);
            app.notify(format!("key updated for {provider}"), now);
        }
        Action::ClearKey { provider } => {
            dash.credentials.clear(&provider);
            app.notify(format!("key cleared for {provider}"), now);
        }
    }
    Flow::Redraw
}

fn selection_for(session: &Session, key: &EntityKey) -> Result<Selection, Error> {
    let entity = session
        .entity(key)
        .ok_or_else(|| Error::UnknownEntity(key.to_string()))?;
    let provider = session.provider(&key.provider)?.clone();
    Ok(Selection {
        key: key.clone(),
        label: entity.meta.label.clone(),
        provider,
    })
}

fn spawn_ticker(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(TICK);
        loop {
            tick.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });
}

#[cfg(unix)]
fn spawn_resize_watch(tx: mpsc::UnboundedSender<AppEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error=%e, "resize signal unavailable, relying on ticks");
            return;
        }
    };
    tokio::spawn(async move {
        while winch.recv().await.is_some() {
            if tx.send(AppEvent::Resize).is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_resize_watch(_tx: mpsc::UnboundedSender<AppEvent>) {}
