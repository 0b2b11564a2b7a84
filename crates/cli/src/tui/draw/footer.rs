use crossterm::style::Stylize;

use crate::tui::state::{App, Screen};

use super::{muted, ACCENT};

pub fn notice_line(app: &App) -> String {
    match &app.notice {
        Some(n) => format!(" {}", n.text.as_str().yellow()),
        None => String::new(),
    }
}

pub fn hints(screen: Screen) -> String {
    let pairs: &[(&str, &str)] = match screen {
        Screen::Main => &[
            ("↑↓", "move"),
            ("t p n l a u s", "sort"),
            ("T", "tier"),
            ("/", "search"),
            ("w/W", "interval"),
            ("R", "reset"),
            ("Enter", "export"),
            ("P", "keys"),
            ("?", "help"),
            ("q", "quit"),
        ],
        Screen::Settings => &[("↑↓", "move"), ("Enter", "edit key"), ("d", "clear"), ("Esc", "back")],
        Screen::Targets => &[("↑↓", "move"), ("Enter", "export"), ("Esc", "back")],
        Screen::Help => &[("any key", "back")],
    };
    let spans: Vec<String> = pairs
        .iter()
        .map(|(k, d)| format!("{} {}", k.with(ACCENT).bold(), muted(d)))
        .collect();
    format!(" {}", spans.join("  "))
}
