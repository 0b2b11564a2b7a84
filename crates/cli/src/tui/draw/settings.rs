use crossterm::style::Stylize;

use crate::tui::state::App;
use crate::tui::text::pad;

use super::{muted, ACCENT};

pub fn lines(app: &App) -> Vec<String> {
    let mut out = vec![
        " API keys".with(ACCENT).bold().to_string(),
        muted(" Keys entered here last for this session and override config and environment."),
        String::new(),
    ];
    if app.providers.is_empty() {
        out.push(muted("  No providers configured."));
        return out;
    }
    for (i, p) in app.providers.iter().enumerate() {
        let marker = if i == app.settings_cursor { "›" } else { " " };
        let line = format!(" {marker} {} {} {}", pad(&p.name, 24), pad(&p.key, 14), p.masked);
        out.push(if i == app.settings_cursor {
            line.bold().to_string()
        } else {
            line
        });
    }
    if let (Some(buf), Some(p)) = (&app.editing, app.providers.get(app.settings_cursor)) {
        out.push(String::new());
        out.push(format!(
            " new key for {}: {}_",
            p.name.as_str().with(ACCENT),
            "•".repeat(buf.chars().count())
        ));
    }
    out
}
