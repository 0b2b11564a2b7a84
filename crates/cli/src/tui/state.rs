use std::cmp::Ordering;
use std::time::Duration;

use common::{EntityKey, PingCode, Status, Tier};
use tokio::time::Instant;

use crate::config::CredentialStore;
use crate::probe::{RoundSummary, Session};

use super::input::Key;

/// Samples kept for the detail-line sparkline.
pub const SPARK_LEN: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Main,
    Settings,
    Targets,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortColumn {
    Tier,
    Provider,
    Name,
    Latest,
    Avg,
    Uptime,
    Status,
}

impl SortColumn {
    pub fn label(self) -> &'static str {
        match self {
            SortColumn::Tier => "tier",
            SortColumn::Provider => "provider",
            SortColumn::Name => "name",
            SortColumn::Latest => "latest",
            SortColumn::Avg => "avg",
            SortColumn::Uptime => "uptime",
            SortColumn::Status => "status",
        }
    }

    /// Direction a column starts in when first selected.
    fn natural(self) -> SortDir {
        match self {
            SortColumn::Uptime => SortDir::Desc,
            _ => SortDir::Asc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn flip(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDir::Asc => "↑",
            SortDir::Desc => "↓",
        }
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(Key),
    /// A probe result was committed or dropped.
    Probe,
    Round(RoundSummary),
    Tick,
    Resize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub until: Instant,
}

/// One table line, copied out of the session so drawing never holds the lock.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub key: EntityKey,
    pub label: String,
    pub provider: String,
    pub tier: Tier,
    pub context: Option<String>,
    pub latest: Option<(PingCode, u64)>,
    pub avg_ms: f64,
    pub uptime: u32,
    pub pings: usize,
    pub status: Status,
    pub failures: u32,
    pub backed_off: bool,
    /// Recent latencies, `None` for failed pings. Oldest first.
    pub spark: Vec<Option<u64>>,
}

impl Row {
    fn latest_ok_ms(&self) -> Option<u64> {
        self.latest
            .and_then(|(code, ms)| code.is_ok().then_some(ms))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderRow {
    pub key: String,
    pub name: String,
    pub masked: String,
}

/// Header figures taken from the session at sync time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub up: usize,
    pub total: usize,
    pub round: u64,
    pub epoch: u64,
    pub stale_drops: u64,
    pub cache_enabled: bool,
}

pub struct App {
    pub screen: Screen,
    pub sort: SortColumn,
    pub dir: SortDir,
    pub tier_filter: Option<Tier>,
    pub search: String,
    pub searching: bool,
    pub cursor: usize,
    pub offset: usize,
    selected: Option<EntityKey>,
    pub rows: Vec<Row>,
    pub counters: Counters,
    pub providers: Vec<ProviderRow>,
    pub settings_cursor: usize,
    /// Key being typed on the settings screen.
    pub editing: Option<String>,
    pub target_cursor: usize,
    /// Entity the target picker exports.
    pub picked: Option<EntityKey>,
    pub interval: Duration,
    pub notice: Option<Notice>,
    notice_ttl: Duration,
    pub last_round: Option<RoundSummary>,
}

impl App {
    pub fn new(interval: Duration, notice_ttl: Duration) -> Self {
        Self {
            screen: Screen::Main,
            sort: SortColumn::Avg,
            dir: SortDir::Asc,
            tier_filter: None,
            search: String::new(),
            searching: false,
            cursor: 0,
            offset: 0,
            selected: None,
            rows: Vec::new(),
            counters: Counters::default(),
            providers: Vec::new(),
            settings_cursor: 0,
            editing: None,
            target_cursor: 0,
            picked: None,
            interval,
            notice: None,
            notice_ttl,
            last_round: None,
        }
    }

    /// Rebuilds the visible rows from the session, keeping the highlight on
    /// the same entity when it is still listed.
    pub fn sync(&mut self, session: &Session, credentials: &CredentialStore) {
        let entities = session.entities();
        self.counters = Counters {
            up: entities.iter().filter(|e| e.status == Status::Up).count(),
            total: entities.len(),
            round: session.round(),
            epoch: session.epoch(),
            stale_drops: session.stale_drops(),
            cache_enabled: session.cache_enabled(),
        };

        let needle = self.search.to_lowercase();
        let round = session.round();
        let mut rows: Vec<Row> = entities
            .iter()
            .filter(|e| self.tier_filter.map_or(true, |t| e.meta.tier == t))
            .filter(|e| {
                needle.is_empty()
                    || e.meta.label.to_lowercase().contains(&needle)
                    || e.key.id.to_lowercase().contains(&needle)
                    || e.key.provider.to_lowercase().contains(&needle)
            })
            .map(|e| {
                let stats = e.stats();
                let provider = session
                    .provider(&e.key.provider)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|_| e.key.provider.clone());
                let skip = e.history.len().saturating_sub(SPARK_LEN);
                Row {
                    key: e.key.clone(),
                    label: e.meta.label.clone(),
                    provider,
                    tier: e.meta.tier,
                    context: e.meta.context.clone(),
                    latest: e.latest().map(|p| (p.code, p.elapsed_ms)),
                    avg_ms: stats.average_ms(),
                    uptime: stats.uptime_percent(),
                    pings: e.history.len(),
                    status: e.status,
                    failures: e.backoff.failures,
                    backed_off: e.backoff.is_skipped(round + 1),
                    spark: e
                        .history
                        .iter()
                        .skip(skip)
                        .map(|p| p.code.is_ok().then_some(p.elapsed_ms))
                        .collect(),
                }
            })
            .collect();
        sort_rows(&mut rows, self.sort, self.dir);
        self.rows = rows;

        let mut providers: Vec<ProviderRow> = session
            .providers()
            .map(|p| ProviderRow {
                key: p.key.clone(),
                name: p.name.clone(),
                masked: credentials.masked(&p.key),
            })
            .collect();
        providers.sort_by(|a, b| a.key.cmp(&b.key));
        self.providers = providers;
        self.settings_cursor = self.settings_cursor.min(self.providers.len().saturating_sub(1));

        if let Some(key) = &self.selected {
            if let Some(i) = self.rows.iter().position(|r| &r.key == key) {
                self.cursor = i;
            }
        }
        self.cursor = self.cursor.min(self.rows.len().saturating_sub(1));
        self.selected = self.rows.get(self.cursor).map(|r| r.key.clone());
    }

    pub fn highlighted(&self) -> Option<&Row> {
        self.rows.get(self.cursor)
    }

    /// Moves the highlight by `delta` rows, clamped to the list.
    pub fn move_cursor(&mut self, delta: isize) {
        if self.rows.is_empty() {
            self.cursor = 0;
            self.selected = None;
            return;
        }
        let last = self.rows.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
        self.selected = Some(self.rows[self.cursor].key.clone());
    }

    pub fn jump_to(&mut self, index: usize) {
        self.cursor = 0;
        self.move_cursor(index.min(isize::MAX as usize) as isize);
    }

    /// Same column flips the direction; a new column starts in its natural one.
    pub fn sort_by(&mut self, column: SortColumn) {
        if self.sort == column {
            self.dir = self.dir.flip();
        } else {
            self.sort = column;
            self.dir = column.natural();
        }
        sort_rows(&mut self.rows, self.sort, self.dir);
        self.follow_selection();
    }

    pub fn cycle_tier(&mut self) {
        self.tier_filter = match self.tier_filter {
            None => Tier::ALL.first().copied(),
            Some(t) => Tier::ALL.iter().skip_while(|x| **x != t).nth(1).copied(),
        };
    }

    /// Keeps `cursor` inside the window `[offset, offset + height)`.
    pub fn scroll_into_view(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
        let max_offset = self.rows.len().saturating_sub(height);
        self.offset = self.offset.min(max_offset);
    }

    pub fn notify(&mut self, text: impl Into<String>, now: Instant) {
        self.notice = Some(Notice {
            text: text.into(),
            until: now + self.notice_ttl,
        });
    }

    /// Drops an expired notice; true when the screen changed.
    pub fn expire_notice(&mut self, now: Instant) -> bool {
        match &self.notice {
            Some(n) if now >= n.until => {
                self.notice = None;
                true
            }
            _ => false,
        }
    }

    fn follow_selection(&mut self) {
        if let Some(key) = &self.selected {
            if let Some(i) = self.rows.iter().position(|r| &r.key == key) {
                self.cursor = i;
            }
        }
    }
}

fn status_rank(status: Status) -> u8 {
    match status {
        Status::Up => 0,
        Status::NoAuth => 1,
        Status::RateLimit => 2,
        Status::Unavailable => 3,
        Status::NotFound => 4,
        Status::Timeout => 5,
        Status::Down => 6,
        Status::Pending => 7,
    }
}

/// Missing values sort last in either direction.
fn cmp_present<T: PartialOrd>(a: Option<T>, b: Option<T>, dir: SortDir) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            match dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable, so equal rows keep catalog order.
pub fn sort_rows(rows: &mut [Row], column: SortColumn, dir: SortDir) {
    rows.sort_by(|a, b| match column {
        SortColumn::Tier => cmp_present(Some(a.tier.rank()), Some(b.tier.rank()), dir),
        SortColumn::Provider => cmp_present(
            Some(a.provider.to_lowercase()),
            Some(b.provider.to_lowercase()),
            dir,
        ),
        SortColumn::Name => cmp_present(Some(a.label.to_lowercase()), Some(b.label.to_lowercase()), dir),
        SortColumn::Latest => cmp_present(a.latest_ok_ms(), b.latest_ok_ms(), dir),
        SortColumn::Avg => cmp_present(
            a.avg_ms.is_finite().then_some(a.avg_ms),
            b.avg_ms.is_finite().then_some(b.avg_ms),
            dir,
        ),
        SortColumn::Uptime => cmp_present(
            (a.pings > 0).then_some(a.uptime),
            (b.pings > 0).then_some(b.uptime),
            dir,
        ),
        SortColumn::Status => cmp_present(Some(status_rank(a.status)), Some(status_rank(b.status)), dir),
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use common::PingOutcome;

    use super::*;
    use crate::probe::fixtures::{entry, provider};
    use crate::probe::{ProbeDone, SessionConfig};

    pub(crate) fn session_with(pings: &[(&str, Tier, &[(u16, u64)])]) -> Session {
        let mut session = Session::new(SessionConfig::default());
        session.set_providers(vec![provider("groq")]);
        session.merge_catalog(pings.iter().map(|(id, tier, _)| entry("groq", id, *tier)).collect());
        for (id, _, codes) in pings {
            for &(code, ms) in codes.iter() {
                let creds: HashMap<String, String> = HashMap::new();
                let plan = session.plan_round(&creds);
                let job = plan
                    .first_contact
                    .iter()
                    .chain(plan.steady.iter())
                    .find(|j| j.key.id == *id)
                    .cloned()
                    .unwrap();
                session.commit(ProbeDone {
                    key: job.key,
                    round: job.round,
                    ticket: job.ticket,
                    outcome: PingOutcome::new(PingCode::Http(code), ms),
                });
            }
        }
        session
    }

    fn app_for(session: &Session) -> App {
        let mut app = App::new(Duration::from_secs(3), Duration::from_millis(2_500));
        app.sync(session, &CredentialStore::default());
        app
    }

    fn ids(app: &App) -> Vec<&str> {
        app.rows.iter().map(|r| r.key.id.as_str()).collect()
    }

    #[test]
    fn default_sort_is_fastest_first_with_unprobed_last() {
        let session = session_with(&[
            ("slow", Tier::A, &[(200, 900)]),
            ("fresh", Tier::S, &[]),
            ("fast", Tier::B, &[(200, 120)]),
        ]);
        let app = app_for(&session);
        assert_eq!(ids(&app), ["fast", "slow", "fresh"]);
    }

    #[test]
    fn repeating_a_sort_key_flips_direction_but_keeps_missing_last() {
        let session = session_with(&[
            ("slow", Tier::A, &[(200, 900)]),
            ("fresh", Tier::S, &[]),
            ("fast", Tier::B, &[(200, 120)]),
        ]);
        let mut app = app_for(&session);
        app.sort_by(SortColumn::Avg);
        assert_eq!(app.dir, SortDir::Desc);
        assert_eq!(ids(&app), ["slow", "fast", "fresh"]);

        app.sort_by(SortColumn::Tier);
        assert_eq!(app.dir, SortDir::Asc);
        assert_eq!(ids(&app), ["fresh", "slow", "fast"]);
    }

    #[test]
    fn highlight_follows_entity_across_resort() {
        let session = session_with(&[
            ("a", Tier::C, &[(200, 100)]),
            ("b", Tier::S, &[(200, 200)]),
        ]);
        let mut app = app_for(&session);
        app.move_cursor(1);
        assert_eq!(app.highlighted().unwrap().key.id, "b");
        app.sort_by(SortColumn::Tier);
        assert_eq!(app.highlighted().unwrap().key.id, "b");
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn tier_filter_cycles_through_every_tier_and_back() {
        let mut app = App::new(Duration::from_secs(3), Duration::from_secs(1));
        let mut seen = Vec::new();
        for _ in 0..=Tier::ALL.len() {
            app.cycle_tier();
            seen.push(app.tier_filter);
        }
        assert_eq!(seen.first(), Some(&Some(Tier::SPlus)));
        assert_eq!(seen.last(), Some(&None));
        assert_eq!(seen.len(), Tier::ALL.len() + 1);
    }

    #[test]
    fn search_and_tier_filter_narrow_rows() {
        let session = session_with(&[
            ("llama-70b", Tier::A, &[]),
            ("qwen-32b", Tier::A, &[]),
            ("llama-8b", Tier::C, &[]),
        ]);
        let mut app = App::new(Duration::from_secs(3), Duration::from_secs(1));
        app.search = "LLAMA".into();
        app.sync(&session, &CredentialStore::default());
        assert_eq!(app.rows.len(), 2);
        app.tier_filter = Some(Tier::C);
        app.sync(&session, &CredentialStore::default());
        assert_eq!(ids(&app), ["llama-8b"]);
    }

    #[test]
    fn scroll_window_tracks_cursor() {
        let session = session_with(&[
            ("a", Tier::A, &[]),
            ("b", Tier::A, &[]),
            ("c", Tier::A, &[]),
            ("d", Tier::A, &[]),
            ("e", Tier::A, &[]),
        ]);
        let mut app = app_for(&session);
        app.jump_to(4);
        app.scroll_into_view(2);
        assert_eq!((app.cursor, app.offset), (4, 3));
        app.move_cursor(-3);
        app.scroll_into_view(2);
        assert_eq!((app.cursor, app.offset), (1, 1));
        app.move_cursor(-10);
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn notices_expire() {
        let mut app = App::new(Duration::from_secs(3), Duration::from_millis(100));
        let t0 = Instant::now();
        app.notify("saved", t0);
        assert!(!app.expire_notice(t0 + Duration::from_millis(50)));
        assert!(app.expire_notice(t0 + Duration::from_millis(100)));
        assert!(app.notice.is_none());
    }

    #[test]
    fn rows_carry_sparkline_and_backoff_state() {
        let session = session_with(&[("m", Tier::A, &[(200, 100), (500, 50), (200, 300)])]);
        let app = app_for(&session);
        let row = &app.rows[0];
        assert_eq!(row.spark, vec![Some(100), None, Some(300)]);
        assert_eq!(row.uptime, 67);
        assert_eq!(row.avg_ms, 200.0);
        assert!(!row.backed_off);
    }
}
