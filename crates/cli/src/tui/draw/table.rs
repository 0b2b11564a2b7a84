use crossterm::style::{Color, Stylize};
use common::{PingCode, Status};

use crate::tui::state::{App, Row};
use crate::tui::text::{ellipsize, pad, pad_left};

use super::{muted, Geometry};

const RANK: usize = 4;
const TIER: usize = 3;
const PROVIDER: usize = 12;
const LATEST: usize = 7;
const AVG: usize = 7;
const UPTIME: usize = 6;
const STATUS: usize = 12;
/// Leading space plus one between each of the eight columns.
const GAPS: usize = 8;
const MIN_MODEL: usize = 12;

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn model_width(width: usize) -> usize {
    let fixed = RANK + TIER + PROVIDER + LATEST + AVG + UPTIME + STATUS + GAPS;
    width.saturating_sub(fixed).max(MIN_MODEL)
}

pub fn column_header(width: usize) -> String {
    let cells = [
        pad_left("#", RANK),
        pad("tier", TIER),
        pad("provider", PROVIDER),
        pad("model", model_width(width)),
        pad_left("latest", LATEST),
        pad_left("avg", AVG),
        pad_left("up%", UPTIME),
        pad("status", STATUS),
    ];
    format!(" {}", cells.join(" ")).bold().to_string()
}

pub fn rows(app: &App, geo: Geometry) -> Vec<String> {
    let height = geo.table_rows();
    if app.rows.is_empty() {
        let text = if app.counters.total == 0 {
            "  Loading catalog…"
        } else {
            "  No entities match the current filter."
        };
        return vec![muted(text)];
    }
    app.rows
        .iter()
        .enumerate()
        .skip(app.offset)
        .take(height)
        .map(|(i, row)| {
            let line = row_line(i + 1, row, geo.width);
            if i == app.cursor {
                pad(&line, geo.width).reverse().to_string()
            } else {
                line
            }
        })
        .collect()
}

fn row_line(rank: usize, row: &Row, width: usize) -> String {
    let latest = match row.latest {
        None => muted(&pad_left("—", LATEST)),
        Some((code, ms)) if code.is_ok() => pad_left(&format!("{ms}ms"), LATEST),
        Some((code, _)) => pad_left(&code.to_string(), LATEST).with(code_color(code)).to_string(),
    };
    let avg = if row.avg_ms.is_finite() {
        pad_left(&format!("{:.0}ms", row.avg_ms), AVG)
    } else {
        muted(&pad_left("—", AVG))
    };
    let uptime = if row.pings > 0 {
        pad_left(&format!("{}%", row.uptime), UPTIME)
    } else {
        muted(&pad_left("—", UPTIME))
    };
    let status = if row.backed_off {
        format!("{} skip", row.status.label())
    } else {
        row.status.label().to_string()
    };
    let cells = [
        pad_left(&rank.to_string(), RANK),
        pad(row.tier.label(), TIER),
        pad(&ellipsize(&row.provider, PROVIDER), PROVIDER),
        pad(&ellipsize(&row.label, model_width(width)), model_width(width)),
        latest,
        avg,
        uptime,
        pad(&status, STATUS).with(status_color(row.status)).to_string(),
    ];
    format!(" {}", cells.join(" "))
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Up => Color::Green,
        Status::NoAuth => Color::Yellow,
        Status::RateLimit => Color::Magenta,
        Status::Unavailable => Color::DarkYellow,
        Status::NotFound => Color::DarkGrey,
        Status::Timeout | Status::Down => Color::Red,
        Status::Pending => Color::Grey,
    }
}

fn code_color(code: PingCode) -> Color {
    status_color(Status::from_code(code))
}

/// `▁▃█·` style strip of recent latencies, scaled to the slowest sample.
pub fn sparkline(samples: &[Option<u64>]) -> String {
    let max = samples.iter().flatten().copied().max().unwrap_or(0).max(1);
    samples
        .iter()
        .map(|s| match s {
            Some(ms) => {
                let idx = (*ms as usize * (SPARK.len() - 1)) / max as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
            None => '·',
        })
        .collect()
}

pub fn detail_line(app: &App) -> String {
    let Some(row) = app.highlighted() else {
        return String::new();
    };
    let mut parts = vec![format!("{}", row.key).bold().to_string()];
    if let Some(ctx) = &row.context {
        parts.push(format!("ctx {ctx}"));
    }
    parts.push(format!("{} pings", row.pings));
    if row.failures > 0 {
        parts.push(format!("{} failing", row.failures).red().to_string());
    }
    if !row.spark.is_empty() {
        parts.push(sparkline(&row.spark).green().to_string());
    }
    format!(" {}", parts.join(muted(" · ").as_str()))
}
