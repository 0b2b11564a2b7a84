use crossterm::style::Stylize;

use crate::tui::state::App;

use super::{muted, ACCENT};

pub fn status_line(app: &App, clock: &str) -> String {
    let c = app.counters;
    let sep = muted(" │ ");
    let up = format!("{}/{} up", c.up, c.total);
    let up = if c.up > 0 { up.green().to_string() } else { up };
    let cache = if c.cache_enabled {
        "cache on".to_string()
    } else {
        "cache off".yellow().to_string()
    };
    let round = match app.last_round {
        Some(r) if r.skipped > 0 => format!("round {} ({} backing off)", c.round, r.skipped),
        _ => format!("round {}", c.round),
    };
    let parts = [
        up,
        round,
        format!("every {:.1}s", app.interval.as_secs_f64()),
        format!("epoch {}", c.epoch),
        format!("stale {}", c.stale_drops),
        cache,
        clock.to_string(),
    ];
    format!(" {}{sep}{}", "pulseboard".with(ACCENT).bold(), parts.join(sep.as_str()))
}

pub fn sort_bar(app: &App) -> String {
    let tier = app.tier_filter.map_or("all", |t| t.label());
    let search = if app.searching {
        format!("/{}_", app.search).yellow().to_string()
    } else if app.search.is_empty() {
        muted("none")
    } else {
        format!("/{}", app.search)
    };
    let shown = if app.rows.len() == app.counters.total {
        String::new()
    } else {
        muted(&format!("  ({} shown)", app.rows.len()))
    };
    format!(
        " sort {} {}   tier {}   search {}{}",
        app.sort.label().with(ACCENT),
        app.dir.arrow(),
        tier.with(ACCENT),
        search,
        shown
    )
}
