use std::time::Duration;

use common::EntityKey;

use crate::probe::{MAX_INTERVAL, MIN_INTERVAL};

use super::input::Key;
use super::state::{App, Screen, SortColumn};

pub const INTERVAL_STEP: Duration = Duration::from_millis(500);

/// Work that reaches outside the screen state. The run loop owns the
/// collaborators and carries these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Screen state changed; redraw.
    Redraw,
    Quit,
    SetInterval(Duration),
    ResetProbes,
    ToggleCache,
    CheckCaches,
    Export { target: usize, entity: EntityKey },
    SetKey { provider: String, key: String },
    ClearKey { provider: String },
}

/// Routes a key to the active screen. Ctrl-C quits from anywhere.
pub fn handle_key(app: &mut App, key: Key, targets: usize) -> Action {
    if key == Key::Ctrl('c') {
        return Action::Quit;
    }
    match app.screen {
        Screen::Main if app.searching => search_key(app, key),
        Screen::Main => main_key(app, key),
        Screen::Settings => settings_key(app, key),
        Screen::Targets => targets_key(app, key, targets),
        Screen::Help => {
            app.screen = Screen::Main;
            Action::Redraw
        }
    }
}

fn main_key(app: &mut App, key: Key) -> Action {
    const PAGE: isize = 10;
    match key {
        Key::Char('q') => return Action::Quit,
        Key::Char('t') => app.sort_by(SortColumn::Tier),
        Key::Char('p') => app.sort_by(SortColumn::Provider),
        Key::Char('n') => app.sort_by(SortColumn::Name),
        Key::Char('l') => app.sort_by(SortColumn::Latest),
        Key::Char('a') => app.sort_by(SortColumn::Avg),
        Key::Char('u') => app.sort_by(SortColumn::Uptime),
        Key::Char('s') => app.sort_by(SortColumn::Status),
        Key::Char('T') => app.cycle_tier(),
        Key::Char('/') => app.searching = true,
        Key::Esc if !app.search.is_empty() => app.search.clear(),
        Key::Up | Key::Char('k') => app.move_cursor(-1),
        Key::Down | Key::Char('j') => app.move_cursor(1),
        Key::PageUp => app.move_cursor(-PAGE),
        Key::PageDown => app.move_cursor(PAGE),
        Key::Home | Key::Char('g') => app.jump_to(0),
        Key::End | Key::Char('G') => app.jump_to(usize::MAX),
        Key::Char('w') => {
            app.interval = app.interval.saturating_sub(INTERVAL_STEP).max(MIN_INTERVAL);
            return Action::SetInterval(app.interval);
        }
        Key::Char('W') => {
            app.interval = (app.interval + INTERVAL_STEP).min(MAX_INTERVAL);
            return Action::SetInterval(app.interval);
        }
        Key::Char('R') => return Action::ResetProbes,
        Key::Char('C') => return Action::ToggleCache,
        Key::Char('D') => return Action::CheckCaches,
        Key::Char('P') => app.screen = Screen::Settings,
        Key::Char('?') => app.screen = Screen::Help,
        Key::Enter => {
            let Some(row) = app.highlighted() else {
                return Action::None;
            };
            app.picked = Some(row.key.clone());
            app.target_cursor = 0;
            app.screen = Screen::Targets;
        }
        _ => return Action::None,
    }
    Action::Redraw
}

fn search_key(app: &mut App, key: Key) -> Action {
    match key {
        Key::Enter => app.searching = false,
        Key::Esc => {
            app.searching = false;
            app.search.clear();
        }
        Key::Backspace => {
            app.search.pop();
        }
        Key::Char(c) => app.search.push(c),
        Key::Up => app.move_cursor(-1),
        Key::Down => app.move_cursor(1),
        _ => return Action::None,
    }
    Action::Redraw
}

fn settings_key(app: &mut App, key: Key) -> Action {
    if let Some(buf) = &mut app.editing {
        match key {
            Key::Esc => app.editing = None,
            Key::Enter => {
                let typed = std::mem::take(buf);
                app.editing = None;
                if let Some(p) = app.providers.get(app.settings_cursor) {
                    return Action::SetKey {
                        provider: p.key.clone(),
                        key: typed,
                    };
                }
            }
            Key::Backspace => {
                buf.pop();
            }
            Key::Char(c) => buf.push(c),
            _ => return Action::None,
        }
        return Action::Redraw;
    }

    let last = app.providers.len().saturating_sub(1);
    match key {
        Key::Esc | Key::Char('q') => app.screen = Screen::Main,
        Key::Up | Key::Char('k') => app.settings_cursor = app.settings_cursor.saturating_sub(1),
        Key::Down | Key::Char('j') => app.settings_cursor = (app.settings_cursor + 1).min(last),
        Key::Enter if !app.providers.is_empty() => app.editing = Some(String::new()),
        Key::Char('d') => {
            if let Some(p) = app.providers.get(app.settings_cursor) {
                return Action::ClearKey {
                    provider: p.key.clone(),
                };
            }
        }
        _ => return Action::None,
    }
    Action::Redraw
}

fn targets_key(app: &mut App, key: Key, targets: usize) -> Action {
    match key {
        Key::Esc | Key::Char('q') => {
            app.screen = Screen::Main;
            app.picked = None;
        }
        Key::Up | Key::Char('k') => app.target_cursor = app.target_cursor.saturating_sub(1),
        Key::Down | Key::Char('j') => {
            app.target_cursor = (app.target_cursor + 1).min(targets.saturating_sub(1))
        }
        Key::Enter => {
            let Some(entity) = app.picked.take() else {
                app.screen = Screen::Main;
                return Action::Redraw;
            };
            app.screen = Screen::Main;
            return Action::Export {
                target: app.target_cursor,
                entity,
            };
        }
        _ => return Action::None,
    }
    Action::Redraw
}

#[cfg(test)]
mod tests {
    use common::Tier;

    use super::*;
    use crate::config::CredentialStore;
    use crate::tui::state::tests::session_with;
    use crate::tui::state::SortDir;

    fn app() -> App {
        let session = session_with(&[
            ("fast", Tier::B, &[(200, 100)]),
            ("slow", Tier::S, &[(200, 800)]),
        ]);
        let mut app = App::new(Duration::from_secs(3), Duration::from_secs(2));
        app.sync(&session, &CredentialStore::default());
        app
    }

    fn press(app: &mut App, keys: &[Key]) -> Vec<Action> {
        keys.iter().map(|k| handle_key(app, *k, 2)).collect()
    }

    #[test]
    fn ctrl_c_quits_from_any_screen() {
        let mut app = app();
        for screen in [Screen::Main, Screen::Settings, Screen::Targets, Screen::Help] {
            app.screen = screen;
            assert_eq!(handle_key(&mut app, Key::Ctrl('c'), 2), Action::Quit);
        }
        app.searching = true;
        app.screen = Screen::Main;
        assert_eq!(handle_key(&mut app, Key::Ctrl('c'), 2), Action::Quit);
    }

    #[test]
    fn sort_keys_toggle_direction() {
        let mut app = app();
        press(&mut app, &[Key::Char('t')]);
        assert_eq!((app.sort, app.dir), (SortColumn::Tier, SortDir::Asc));
        assert_eq!(app.rows[0].key.id, "slow");
        press(&mut app, &[Key::Char('t')]);
        assert_eq!(app.dir, SortDir::Desc);
        assert_eq!(app.rows[0].key.id, "fast");
    }

    #[test]
    fn search_typing_is_not_treated_as_commands() {
        let mut app = app();
        press(&mut app, &[Key::Char('/'), Key::Char('q'), Key::Char('w')]);
        assert!(app.searching);
        assert_eq!(app.search, "qw");
        assert_eq!(app.screen, Screen::Main);
        press(&mut app, &[Key::Backspace, Key::Enter]);
        assert!(!app.searching);
        assert_eq!(app.search, "q");
        press(&mut app, &[Key::Esc]);
        assert!(app.search.is_empty());
    }

    #[test]
    fn escape_in_search_clears_it() {
        let mut app = app();
        press(&mut app, &[Key::Char('/'), Key::Char('x'), Key::Esc]);
        assert!(!app.searching);
        assert!(app.search.is_empty());
    }

    #[test]
    fn interval_keys_clamp_and_report() {
        let mut app = app();
        let actions = press(&mut app, &[Key::Char('w'); 10]);
        assert_eq!(actions.last(), Some(&Action::SetInterval(MIN_INTERVAL)));
        assert_eq!(
            handle_key(&mut app, Key::Char('W'), 2),
            Action::SetInterval(MIN_INTERVAL + INTERVAL_STEP)
        );
    }

    #[test]
    fn shortening_at_the_floor_never_lengthens() {
        let mut app = app();
        app.interval = MIN_INTERVAL;
        assert_eq!(handle_key(&mut app, Key::Char('w'), 2), Action::SetInterval(MIN_INTERVAL));
        assert_eq!(app.interval, MIN_INTERVAL);
    }

    #[test]
    fn enter_picks_highlighted_entity_for_export() {
        let mut app = app();
        press(&mut app, &[Key::Down, Key::Enter]);
        assert_eq!(app.screen, Screen::Targets);
        assert_eq!(app.picked.as_ref().map(|k| k.id.as_str()), Some("slow"));
        let action = press(&mut app, &[Key::Down, Key::Down, Key::Enter]).pop();
        assert_eq!(
            action,
            Some(Action::Export {
                target: 1,
                entity: EntityKey::new("groq", "slow"),
            })
        );
        assert_eq!(app.screen, Screen::Main);
    }

    #[test]
    fn targets_escape_returns_without_export() {
        let mut app = app();
        press(&mut app, &[Key::Enter, Key::Esc]);
        assert_eq!(app.screen, Screen::Main);
        assert!(app.picked.is_none());
    }

    #[test]
    fn settings_edit_saves_typed_key() {
        let mut app = app();
        press(&mut app, &[Key::Char('P'), Key::Enter]);
        assert_eq!(app.editing.as_deref(), Some(""));
        let actions = press(&mut app, &[Key::Char('g'), Key::Char('s'), Key::Char('k'), Key::Enter]);
        assert_eq!(
            actions.last(),
            Some(&Action::SetKey {
                provider: "groq".into(),
                key: "gsk".into(),
            })
        );
        assert!(app.editing.is_none());
        assert_eq!(app.screen, Screen::Settings);
        assert_eq!(
            handle_key(&mut app, Key::Char('d'), 2),
            Action::ClearKey { provider: "groq".into() }
        );
        press(&mut app, &[Key::Esc]);
        assert_eq!(app.screen, Screen::Main);
    }

    #[test]
    fn settings_edit_escape_cancels() {
        let mut app = app();
        let actions = press(&mut app, &[Key::Char('P'), Key::Enter, Key::Char('x'), Key::Esc]);
        assert!(!actions.iter().any(|a| matches!(a, Action::SetKey { .. })));
        assert!(app.editing.is_none());
        assert_eq!(app.screen, Screen::Settings);
    }

    #[test]
    fn help_returns_on_any_key() {
        let mut app = app();
        press(&mut app, &[Key::Char('?')]);
        assert_eq!(app.screen, Screen::Help);
        press(&mut app, &[Key::Char('z')]);
        assert_eq!(app.screen, Screen::Main);
    }

    #[test]
    fn cross_cutting_keys_only_fire_on_main_screen() {
        let mut app = app();
        assert_eq!(handle_key(&mut app, Key::Char('R'), 2), Action::ResetProbes);
        app.screen = Screen::Settings;
        assert_eq!(handle_key(&mut app, Key::Char('R'), 2), Action::None);
        assert_eq!(handle_key(&mut app, Key::Char('w'), 2), Action::None);
    }
}
