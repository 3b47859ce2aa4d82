//! Turns raw PTY bytes into clean, line-oriented, escape-free UTF-8 text.
//!
//! `sanitize` is pure and idempotent: decode as UTF-8 with replacement,
//! strip ANSI/OSC escape sequences, collapse carriage-return overwrites,
//! then drop remaining control bytes (keeping `\n` and `\t`).

use std::sync::LazyLock;

use regex::Regex;

/// Matches ANSI/terminal escape sequences: CSI (`ESC [ params final`), OSC
/// terminated by BEL or `ESC \`, charset designators (`ESC ( X` / `ESC ) X`),
/// and keypad mode (`ESC =` / `ESC >`).
static ESCAPE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\x1b\[[0-9;?]*[@-~]|\x1b\][^\x07]*\x07|\x1b\][^\x1b]*\x1b\\|\x1b[()][0-9A-Za-z]|\x1b[=>]",
    )
    .expect("invalid escape-sequence regex")
});

/// Matches control bytes 0x00-0x1F (excluding `\n` at 0x0A and `\t` at 0x09)
/// and 0x7F. Applied after CR-overwrite collapsing has already consumed
/// every `\r`.
static CONTROL_BYTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0b-\x1f\x7f]").expect("invalid control-byte regex"));

/// Strip ANSI/terminal escape sequences from `text`, mirroring the
/// teacher's `output::strip_ansi` / the original's `strip_ansi_codes`.
fn strip_escapes(text: &str) -> String {
    ESCAPE_SEQUENCE.replace_all(text, "").to_string()
}

/// Collapse carriage-return overwrites within each `\n`-delimited line.
///
/// For each physical line, split on `\r` and keep the last non-empty
/// piece (or empty, if every piece is empty). This collapses progress
/// bars and repeated prompts while leaving a bare trailing `\r` harmless.
/// Unlike escape-stripping and control-byte removal, this needs per-line
/// state (the last non-empty piece) that a single substitution can't
/// express, so it stays hand-rolled.
fn collapse_cr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        let collapsed = collapse_cr_segment(line);
        out.push_str(&collapsed);
        if lines.peek().is_some() {
            out.push('\n');
        }
    }
    out
}

fn collapse_cr_segment(segment: &str) -> &str {
    if !segment.contains('\r') {
        return segment;
    }
    let mut last_non_empty: Option<&str> = None;
    let mut last_piece: &str = "";
    for piece in segment.split('\r') {
        last_piece = piece;
        if !piece.is_empty() {
            last_non_empty = Some(piece);
        }
    }
    last_non_empty.unwrap_or(last_piece)
}

/// Delete control bytes 0x00-0x1F and 0x7F, except `\n` and `\t`.
fn strip_control_bytes(text: &str) -> String {
    CONTROL_BYTE.replace_all(text, "").to_string()
}

/// Decode raw PTY bytes and reduce them to agent-readable text.
///
/// Applies, in order: UTF-8 decode with replacement, escape-sequence
/// removal, carriage-return overwrite collapsing, and control-byte
/// stripping. `sanitize(sanitize(x)) == sanitize(x)` for all inputs.
#[must_use]
pub fn sanitize(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let no_escapes = strip_escapes(&decoded);
    let collapsed = collapse_cr(&no_escapes);
    strip_control_bytes(&collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_on_plain_text() {
        let s = "hello world\nsecond line\n";
        assert_eq!(sanitize(s.as_bytes()), s);
        let once = sanitize(s.as_bytes());
        assert_eq!(sanitize(once.as_bytes()), once);
    }

    #[test]
    fn idempotent_on_escapes() {
        let raw = b"\x1b[31mRed\x1b[0m text";
        let once = sanitize(raw);
        assert!(!once.contains('\x1b'));
        let twice = sanitize(once.as_bytes());
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_csi_sgr() {
        assert_eq!(sanitize(b"\x1b[31mRed text\x1b[0m"), "Red text");
    }

    #[test]
    fn strips_csi_cursor_and_erase() {
        let out = sanitize(b"\x1b[2JClear\x1b[1;1HHome");
        assert!(out.contains("Clear"));
        assert!(out.contains("Home"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn strips_osc_with_bel() {
        assert_eq!(sanitize(b"\x1b]0;Title\x07Content"), "Content");
    }

    #[test]
    fn strips_osc_with_esc_backslash() {
        assert_eq!(sanitize(b"\x1b]0;Title\x1b\\Content"), "Content");
    }

    #[test]
    fn strips_charset_designators() {
        assert_eq!(sanitize(b"\x1b(BHello\x1b)0"), "Hello");
    }

    #[test]
    fn strips_keypad_mode() {
        assert_eq!(sanitize(b"\x1b=Hello\x1b>"), "Hello");
    }

    #[test]
    fn crlf_normalizes_to_lf() {
        assert_eq!(sanitize(b"line one\r\nline two\r\n"), "line one\nline two\n");
    }

    #[test]
    fn progress_bar_overwrite_collapses() {
        assert_eq!(
            sanitize(b"Downloading: 10%\rDownloading: 50%\rDownloading: 100%"),
            "Downloading: 100%"
        );
    }

    #[test]
    fn repeated_prompt_overwrite_collapses() {
        assert_eq!(
            sanitize(b"TCL_LEC> \rTCL_LEC> \rTCL_LEC> "),
            "TCL_LEC> "
        );
    }

    #[test]
    fn trailing_cr_preserves_content() {
        assert_eq!(sanitize(b"echo test\r"), "echo test");
        assert_eq!(sanitize(b"__PTY_DONE_abc123__\r"), "__PTY_DONE_abc123__");
    }

    #[test]
    fn preserves_printable_ascii_and_utf8() {
        let s = "café — naïve 日本語";
        assert_eq!(sanitize(s.as_bytes()), s);
    }

    #[test]
    fn drops_other_control_bytes_but_keeps_tab_and_newline() {
        let raw = [b'a', 0x07, b'\t', b'b', 0x1F, b'\n', 0x7F, b'c'];
        assert_eq!(sanitize(&raw), "a\tb\nc");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let raw = [b'a', 0xFF, b'b'];
        let out = sanitize(&raw);
        assert!(out.starts_with('a'));
        assert!(out.ends_with('b'));
        assert!(out.contains('\u{FFFD}'));
    }
}
