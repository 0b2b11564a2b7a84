//! Column arithmetic for frame lines that carry ANSI styling.
//!
//! Widths are terminal columns: wide glyphs take two, combining marks take
//! none, and escape sequences take nothing and are always copied through.

use unicode_width::UnicodeWidthChar;

enum Piece<'a> {
    Escape(&'a str),
    Glyph(char, usize),
}

fn pieces(s: &str) -> impl Iterator<Item = Piece<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let c = rest.chars().next()?;
        if c == '\x1b' {
            let len = escape_len(rest.as_bytes());
            let (seq, tail) = rest.split_at(len);
            rest = tail;
            return Some(Piece::Escape(seq));
        }
        rest = &rest[c.len_utf8()..];
        Some(Piece::Glyph(c, c.width().unwrap_or(0)))
    })
}

/// Byte length of the escape sequence at the start of `b`.
fn escape_len(b: &[u8]) -> usize {
    match b.get(1) {
        Some(b'[') => {
            let mut i = 2;
            while i < b.len() && (0x20..=0x3f).contains(&b[i]) {
                i += 1;
            }
            // only an ASCII final byte belongs to the sequence
            match b.get(i) {
                Some(0x40..=0x7e) => i + 1,
                _ => i,
            }
        }
        // OSC, terminated by BEL or ST
        Some(b']') => {
            let mut i = 2;
            while i < b.len() {
                if b[i] == 0x07 {
                    return i + 1;
                }
                if b[i] == 0x1b && b.get(i + 1) == Some(&b'\\') {
                    return i + 2;
                }
                i += 1;
            }
            b.len()
        }
        Some(c) if c.is_ascii() => 2,
        _ => 1,
    }
}

pub fn display_width(s: &str) -> usize {
    pieces(s)
        .map(|p| match p {
            Piece::Escape(_) => 0,
            Piece::Glyph(_, w) => w,
        })
        .sum()
}

/// Cuts `s` to at most `width` columns. A wide glyph that would straddle
/// the edge is dropped. Escape sequences after the cut are still copied so
/// trailing resets take effect.
pub fn truncate(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(s.len());
    let mut used = 0;
    let mut full = false;
    for piece in pieces(s) {
        match piece {
            Piece::Escape(seq) => out.push_str(seq),
            Piece::Glyph(_, _) if full => {}
            Piece::Glyph(c, w) => {
                if used + w > width {
                    full = true;
                    continue;
                }
                used += w;
                out.push(c);
            }
        }
    }
    out
}

/// Truncates then fills with spaces so the line covers exactly `width`
/// columns, overwriting whatever a previous frame left there.
pub fn pad(s: &str, width: usize) -> String {
    let mut out = truncate(s, width);
    let used = display_width(&out);
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

/// Like [`pad`] but keeps the text flush right.
pub fn pad_left(s: &str, width: usize) -> String {
    let cut = truncate(s, width);
    let used = display_width(&cut);
    let mut out: String = std::iter::repeat(' ').take(width.saturating_sub(used)).collect();
    out.push_str(&cut);
    out
}

/// Truncates with a trailing `…` when the text does not fit.
pub fn ellipsize(s: &str, width: usize) -> String {
    if display_width(s) <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = truncate(s, width - 1);
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_take_no_columns() {
        assert_eq!(display_width("\x1b[1;32mup\x1b[0m"), 2);
        assert_eq!(display_width("\x1b]0;title\x07ok"), 2);
    }

    #[test]
    fn unterminated_csi_before_multibyte_text_is_cut_on_a_char_boundary() {
        assert_eq!(display_width("\x1b[é-model"), 7);
        assert_eq!(truncate("\x1b[12中x", 2), "\x1b[12中");
        assert_eq!(display_width(&pad("\x1b[é", 4)), 4);
    }

    #[test]
    fn wide_glyphs_take_two_columns() {
        assert_eq!(display_width("中文"), 4);
        assert_eq!(display_width("a中"), 3);
        assert_eq!(display_width("e\u{301}"), 1);
    }

    #[test]
    fn truncate_keeps_styling_bytes_verbatim() {
        let styled = "\x1b[31mabcdef\x1b[0m";
        assert_eq!(truncate(styled, 3), "\x1b[31mabc\x1b[0m");
        assert_eq!(display_width(&truncate(styled, 3)), 3);
    }

    #[test]
    fn truncate_never_splits_a_wide_glyph() {
        assert_eq!(truncate("a中b", 2), "a");
        assert_eq!(truncate("中中", 3), "中");
    }

    #[test]
    fn pad_fills_to_the_full_budget() {
        assert_eq!(pad("ab", 5), "ab   ");
        assert_eq!(pad("中", 3), "中 ");
        assert_eq!(pad("abcdef", 4), "abcd");
        assert_eq!(display_width(&pad("\x1b[1mx\x1b[0m", 6)), 6);
        assert_eq!(pad_left("7", 3), "  7");
    }

    #[test]
    fn ellipsize_marks_the_cut() {
        assert_eq!(ellipsize("llama-3.3-70b", 8), "llama-3…");
        assert_eq!(ellipsize("short", 8), "short");
    }
}
