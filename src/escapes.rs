//! Decode textual escape sequences (`\n`, `\x03`, ...) in tool-call string
//! arguments into raw bytes, since JSON-RPC `keys` parameters arrive as
//! literal strings -- `\n` is two characters, not a newline byte.
//!
//! This is boundary glue: `send_keys`/`run_command` never interpret
//! escapes themselves, per spec §4.2; callers decode before handing bytes
//! to the session.

/// Decode `\n`, `\r`, `\t`, `\\`, and `\xNN` escapes into their byte values.
/// Anything else following a backslash (including an unrecognized escape
/// or a trailing lone backslash) is passed through unchanged.
#[must_use]
pub fn decode(input: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some('x') => {
                let mut hex = String::new();
                if let Some(h1) = chars.next() {
                    hex.push(h1);
                }
                if let Some(h2) = chars.next() {
                    hex.push(h2);
                }
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte);
                }
            }
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_newline() {
        assert_eq!(decode("echo hi\\n"), b"echo hi\n");
    }

    #[test]
    fn decodes_ctrl_c() {
        assert_eq!(decode("\\x03"), vec![0x03]);
    }

    #[test]
    fn decodes_tab_and_cr() {
        assert_eq!(decode("a\\tb\\r"), b"a\tb\r");
    }

    #[test]
    fn decodes_backslash_literal() {
        assert_eq!(decode("a\\\\b"), b"a\\b");
    }

    #[test]
    fn passes_through_unrecognized_escape() {
        assert_eq!(decode("\\q"), b"\\q");
    }

    #[test]
    fn trailing_backslash_passes_through() {
        assert_eq!(decode("abc\\"), b"abc\\");
    }

    #[test]
    fn passes_through_plain_text_and_utf8() {
        assert_eq!(decode("héllo"), "héllo".as_bytes());
    }
}
