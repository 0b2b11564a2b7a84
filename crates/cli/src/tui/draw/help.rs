use crossterm::style::Stylize;

use crate::tui::text::pad;

use super::ACCENT;

const KEYS: &[(&str, &str)] = &[
    ("↑ ↓ j k", "move highlight"),
    ("PgUp PgDn", "move by page"),
    ("Home End", "first / last row"),
    ("t p n l a u s", "sort by tier, provider, name, latest, avg, uptime, status"),
    ("", "pressing the same key again flips the direction"),
    ("T", "cycle tier filter"),
    ("/", "search; Enter keeps the filter, Esc clears it"),
    ("w W", "shorter / longer probe interval"),
    ("R", "reset all probes"),
    ("C", "toggle the rolling metrics cache"),
    ("D", "verify cached metrics against a full rescan"),
    ("Enter", "export the highlighted model"),
    ("P", "manage API keys"),
    ("q Ctrl-C", "quit"),
];

pub fn lines() -> Vec<String> {
    let mut out = vec![" Keys".with(ACCENT).bold().to_string(), String::new()];
    out.extend(KEYS.iter().map(|(k, d)| format!("  {} {d}", pad(k, 14).with(ACCENT))));
    out
}
