use crossterm::style::Stylize;

use crate::export::Exporters;
use crate::tui::state::App;
use crate::tui::text::pad;

use super::{muted, ACCENT};

pub fn lines(app: &App, exporters: &Exporters) -> Vec<String> {
    let picked = app
        .picked
        .as_ref()
        .map_or_else(|| "nothing".to_string(), ToString::to_string);
    let mut out = vec![
        format!(" Export {}", picked.with(ACCENT).bold()),
        String::new(),
    ];
    if exporters.is_empty() {
        out.push(muted("  No export targets available."));
    }
    for (i, target) in exporters.iter().enumerate() {
        let marker = if i == app.target_cursor { "›" } else { " " };
        let line = format!(" {marker} {} {}", pad(target.name(), 10), muted(target.describe()));
        out.push(if i == app.target_cursor {
            line.bold().to_string()
        } else {
            line
        });
    }
    out
}
