//! Raw terminal byte stream to logical keys.
//!
//! Two ambiguities are resolved here: a lone ESC may be the start of a longer
//! sequence, so it is held for a short grace window; and a single read may
//! carry several keys (typing bursts, paste, key repeat), so every read is
//! split into one key per recognised sequence or literal character.

use std::io::Read;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::state::AppEvent;

pub const ESC_GRACE: Duration = Duration::from_millis(50);

const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Alt(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

enum Step {
    Key(Key, usize),
    /// Recognised framing but nothing we map; drop the bytes.
    Skip(usize),
    Incomplete,
}

/// Incremental decoder. Holds undecided bytes between reads together with
/// the instant at which they must be resolved.
#[derive(Debug)]
pub struct KeyDecoder {
    pending: Vec<u8>,
    deadline: Option<Instant>,
    grace: Duration,
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new(ESC_GRACE)
    }
}

impl KeyDecoder {
    pub fn new(grace: Duration) -> Self {
        Self {
            pending: Vec::new(),
            deadline: None,
            grace,
        }
    }

    /// When undecided bytes must be flushed, if any are buffered.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn feed(&mut self, bytes: &[u8], now: Instant) -> Vec<Key> {
        self.pending.extend_from_slice(bytes);
        let keys = self.drain(false);
        if self.pending.is_empty() {
            self.deadline = None;
        } else if self.deadline.is_none() {
            self.deadline = Some(now + self.grace);
        }
        keys
    }

    /// Resolves buffered bytes once the grace window has passed: an
    /// undecided ESC becomes a bare [`Key::Esc`].
    pub fn expire(&mut self, now: Instant) -> Vec<Key> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.drain(true)
            }
            _ => Vec::new(),
        }
    }

    fn drain(&mut self, force: bool) -> Vec<Key> {
        let mut keys = Vec::new();
        let mut at = 0;
        while at < self.pending.len() {
            match step(&self.pending[at..]) {
                Step::Key(key, used) => {
                    keys.push(key);
                    at += used;
                }
                Step::Skip(used) => at += used,
                Step::Incomplete if force => {
                    if self.pending[at] == ESC {
                        keys.push(Key::Esc);
                    }
                    at += 1;
                }
                Step::Incomplete => break,
            }
        }
        self.pending.drain(..at);
        keys
    }
}

fn step(buf: &[u8]) -> Step {
    match buf[0] {
        ESC => escape(buf),
        b'\r' | b'\n' => Step::Key(Key::Enter, 1),
        b'\t' => Step::Key(Key::Tab, 1),
        0x7f | 0x08 => Step::Key(Key::Backspace, 1),
        b @ 0x01..=0x1a => Step::Key(Key::Ctrl((b'a' + b - 1) as char), 1),
        0x00 | 0x1c..=0x1f => Step::Skip(1),
        lead => utf8(buf, lead),
    }
}

fn utf8(buf: &[u8], lead: u8) -> Step {
    let len = match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Step::Skip(1),
    };
    if buf.len() < len {
        return Step::Incomplete;
    }
    match std::str::from_utf8(&buf[..len]).ok().and_then(|s| s.chars().next()) {
        Some(c) => Step::Key(Key::Char(c), len),
        None => Step::Skip(1),
    }
}

fn escape(buf: &[u8]) -> Step {
    let Some(&next) = buf.get(1) else {
        return Step::Incomplete;
    };
    match next {
        b'[' => csi(buf),
        b'O' => ss3(buf),
        0x20..=0x7e => Step::Key(Key::Alt(next as char), 2),
        _ => Step::Key(Key::Esc, 1),
    }
}

/// `ESC [ params final`.
fn csi(buf: &[u8]) -> Step {
    let mut end = 2;
    while end < buf.len() && (0x20..=0x3f).contains(&buf[end]) {
        end += 1;
    }
    let Some(&last) = buf.get(end) else {
        return Step::Incomplete;
    };
    if !(0x40..=0x7e).contains(&last) {
        // not a CSI after all: bare ESC, the rest is literal input
        return Step::Key(Key::Esc, 1);
    }
    let params = std::str::from_utf8(&buf[2..end]).unwrap_or("");
    let first: Option<u16> = params.split(';').next().and_then(|p| p.parse().ok());
    let key = match last {
        b'A' => Some(Key::Up),
        b'B' => Some(Key::Down),
        b'C' => Some(Key::Right),
        b'D' => Some(Key::Left),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        b'Z' => Some(Key::BackTab),
        b'~' => first.and_then(tilde_key),
        _ => None,
    };
    match key {
        Some(key) => Step::Key(key, end + 1),
        None => {
            debug!(sequence = ?&buf[..=end], "unmapped escape sequence");
            Step::Skip(end + 1)
        }
    }
}

fn tilde_key(code: u16) -> Option<Key> {
    Some(match code {
        1 | 7 => Key::Home,
        2 => Key::Insert,
        3 => Key::Delete,
        4 | 8 => Key::End,
        5 => Key::PageUp,
        6 => Key::PageDown,
        11..=15 => Key::F((code - 10) as u8),
        17..=21 => Key::F((code - 11) as u8),
        23 | 24 => Key::F((code - 12) as u8),
        _ => return None,
    })
}

/// `ESC O final`, sent by terminals in application cursor mode.
fn ss3(buf: &[u8]) -> Step {
    let Some(&last) = buf.get(2) else {
        return Step::Incomplete;
    };
    let key = match last {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        b'P'..=b'S' => Key::F(last - b'P' + 1),
        _ => return Step::Skip(3),
    };
    Step::Key(key, 3)
}

/// Reads stdin on a dedicated OS thread (a blocked read must not hold up
/// runtime shutdown) and decodes on a task that owns the grace timer.
pub fn spawn_input(tx: mpsc::UnboundedSender<AppEvent>, grace: Duration) {
    let (bytes_tx, bytes_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if bytes_tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    tokio::spawn(decode_stream(bytes_rx, tx, grace));
}

async fn decode_stream(
    mut bytes_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    tx: mpsc::UnboundedSender<AppEvent>,
    grace: Duration,
) {
    let mut decoder = KeyDecoder::new(grace);
    loop {
        let keys = match decoder.deadline() {
            Some(deadline) => {
                tokio::select! {
                    chunk = bytes_rx.recv() => match chunk {
                        Some(bytes) => decoder.feed(&bytes, Instant::now()),
                        None => break,
                    },
                    _ = tokio::time::sleep_until(deadline) => decoder.expire(Instant::now()),
                }
            }
            None => match bytes_rx.recv().await {
                Some(bytes) => decoder.feed(&bytes, Instant::now()),
                None => break,
            },
        };
        for key in keys {
            if tx.send(AppEvent::Key(key)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Key> {
        let mut d = KeyDecoder::default();
        d.feed(bytes, Instant::now())
    }

    #[test]
    fn lone_escape_waits_for_grace_window() {
        let mut d = KeyDecoder::default();
        let t0 = Instant::now();
        assert!(d.feed(&[ESC], t0).is_empty());
        assert_eq!(d.deadline(), Some(t0 + ESC_GRACE));
        assert!(d.expire(t0 + Duration::from_millis(10)).is_empty());
        assert_eq!(d.expire(t0 + ESC_GRACE), vec![Key::Esc]);
        assert_eq!(d.deadline(), None);
    }

    #[test]
    fn split_sequence_completes_within_window() {
        let mut d = KeyDecoder::default();
        let t0 = Instant::now();
        assert!(d.feed(&[ESC], t0).is_empty());
        assert!(d.feed(b"[", t0 + Duration::from_millis(5)).is_empty());
        assert_eq!(d.deadline(), Some(t0 + ESC_GRACE));
        assert_eq!(d.feed(b"A", t0 + Duration::from_millis(8)), vec![Key::Up]);
        assert_eq!(d.deadline(), None);
        assert!(d.expire(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn expired_partial_csi_flushes_as_escape_then_literals() {
        let mut d = KeyDecoder::default();
        let t0 = Instant::now();
        assert!(d.feed(b"\x1b[", t0).is_empty());
        assert_eq!(d.expire(t0 + ESC_GRACE), vec![Key::Esc, Key::Char('[')]);
    }

    #[test]
    fn burst_is_split_in_order() {
        assert_eq!(
            decode_all(b"ab\x1b[B\x1b[5~\rq"),
            vec![
                Key::Char('a'),
                Key::Char('b'),
                Key::Down,
                Key::PageUp,
                Key::Enter,
                Key::Char('q'),
            ]
        );
    }

    #[test]
    fn key_repeat_yields_one_event_per_sequence() {
        assert_eq!(decode_all(b"\x1b[A\x1b[A\x1b[A"), vec![Key::Up; 3]);
    }

    #[test]
    fn application_mode_and_function_keys() {
        assert_eq!(decode_all(b"\x1bOB\x1bOP\x1b[15~\x1b[Z"), vec![
            Key::Down,
            Key::F(1),
            Key::F(5),
            Key::BackTab,
        ]);
    }

    #[test]
    fn modified_arrows_and_home_end() {
        assert_eq!(decode_all(b"\x1b[1;5C\x1b[H\x1b[4~"), vec![Key::Right, Key::Home, Key::End]);
    }

    #[test]
    fn control_and_backspace_bytes() {
        assert_eq!(
            decode_all(&[0x03, 0x7f, 0x08, b'\t']),
            vec![Key::Ctrl('c'), Key::Backspace, Key::Backspace, Key::Tab]
        );
    }

    #[test]
    fn escape_then_printable_is_alt() {
        assert_eq!(decode_all(b"\x1bx"), vec![Key::Alt('x')]);
    }

    #[test]
    fn utf8_split_across_reads() {
        let mut d = KeyDecoder::default();
        let t0 = Instant::now();
        let bytes = "é中".as_bytes();
        assert!(d.feed(&bytes[..1], t0).is_empty());
        assert_eq!(d.feed(&bytes[1..3], t0), vec![Key::Char('é')]);
        assert_eq!(d.feed(&bytes[3..], t0), vec![Key::Char('中')]);
    }

    #[test]
    fn unmapped_sequences_are_dropped() {
        assert_eq!(decode_all(b"\x1b[200~x"), vec![Key::Char('x')]);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_flushes_bare_escape_after_grace() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (bytes_tx, bytes_rx) = mpsc::unbounded_channel();
        tokio::spawn(decode_stream(bytes_rx, tx, ESC_GRACE));

        let started = Instant::now();
        bytes_tx.send(vec![ESC]).unwrap();
        let event = rx.recv().await;
        assert!(matches!(event, Some(AppEvent::Key(Key::Esc))));
        assert!(started.elapsed() >= ESC_GRACE);

        bytes_tx.send(b"\x1b[".to_vec()).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        bytes_tx.send(b"D".to_vec()).unwrap();
        assert!(matches!(rx.recv().await, Some(AppEvent::Key(Key::Left))));
    }
}
