//! Frame rendering. Every call produces one complete frame as a single
//! string: cursor home, one line per visible row padded to the visible
//! width, then clear-to-end so a taller previous frame leaves nothing behind.

use crossterm::style::{Color, Stylize};

use crate::export::Exporters;

use super::state::{App, Screen};
use super::text::pad;

mod footer;
mod header;
mod help;
mod settings;
mod table;
mod targets;

pub const ACCENT: Color = Color::Cyan;
pub const MUTED: Color = Color::DarkGrey;

/// Used when the terminal cannot report its size.
pub const FALLBACK: Geometry = Geometry {
    width: 80,
    height: 24,
    screen: (80, 24),
};
pub const MIN_WIDTH: usize = 40;
pub const MIN_HEIGHT: usize = 10;

/// Lines outside the scrolling table on the main screen.
const MAIN_CHROME: usize = 6;

/// Layout size plus the real terminal size. Layout never goes below the
/// minimums, but output is cut to what the terminal can show so nothing
/// wraps or scrolls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    screen: (usize, usize),
}

impl Geometry {
    /// Reads the current terminal size; unknown sizes use [`FALLBACK`] and
    /// tiny ones are raised to the minimums.
    pub fn probe() -> Self {
        match crossterm::terminal::size() {
            Ok((w, h)) if w > 0 && h > 0 => Self::clamped(w as usize, h as usize),
            _ => FALLBACK,
        }
    }

    pub fn clamped(width: usize, height: usize) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
            screen: (width, height),
        }
    }

    /// Columns and lines actually written.
    pub fn visible(&self) -> (usize, usize) {
        (self.width.min(self.screen.0), self.height.min(self.screen.1))
    }

    /// Rows available to the entity table.
    pub fn table_rows(&self) -> usize {
        self.height.saturating_sub(MAIN_CHROME)
    }
}

pub fn render(app: &mut App, geo: Geometry, exporters: &Exporters, clock: &str) -> String {
    let mut lines = vec![header::status_line(app, clock)];
    let body = geo.height.saturating_sub(3);
    let mut content = match app.screen {
        Screen::Main => {
            app.scroll_into_view(geo.table_rows());
            let mut out = vec![header::sort_bar(app), table::column_header(geo.width)];
            out.extend(table::rows(app, geo));
            out.push(table::detail_line(app));
            out
        }
        Screen::Settings => settings::lines(app),
        Screen::Targets => targets::lines(app, exporters),
        Screen::Help => help::lines(),
    };
    content.resize(body, String::new());
    lines.extend(content);
    lines.push(footer::notice_line(app));
    lines.push(footer::hints(app.screen));

    let (cols, rows) = geo.visible();
    let mut frame = String::from("\x1b[H");
    let joined: Vec<String> = lines.iter().take(rows).map(|l| pad(l, cols)).collect();
    frame.push_str(&joined.join("\r\n"));
    frame.push_str("\x1b[J");
    frame
}

/// Muted helper shared by the screens.
fn muted(s: &str) -> String {
    s.with(MUTED).to_string()
}
