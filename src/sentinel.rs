//! Pure helpers for the sentinel-based command-completion protocol.
//!
//! The protocol itself (writing to the PTY, polling the line buffer) lives
//! in [`crate::session`]; the pieces that can be reasoned about without a
//! PTY — sentinel materialization, scanning for the completion line, and
//! echo filtering — are isolated here so they're directly testable.

use uuid::Uuid;

/// Literal prefix every sentinel begins with.
pub const SENTINEL_PREFIX: &str = "__PTY_DONE_";

/// Literal suffix every sentinel ends with.
const SENTINEL_SUFFIX: &str = "__";

/// Literal placeholder substituted into a `sentinel_template`.
const PLACEHOLDER: &str = "{sentinel}";

/// Generate a sentinel unique to one `run_command` call: `__PTY_DONE_`
/// followed by at least 8 random hex characters and a trailing `__`.
#[must_use]
pub fn generate_sentinel() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{SENTINEL_PREFIX}{}{SENTINEL_SUFFIX}", &hex[..8])
}

/// Substitute the literal `{sentinel}` placeholder in `template` with `sentinel`.
#[must_use]
pub fn materialize(template: &str, sentinel: &str) -> String {
    template.replace(PLACEHOLDER, sentinel)
}

/// Scan `lines` in order for the first line whose stripped form contains
/// `sentinel` but is not the command echo (i.e. is not equal to, and does
/// not end with, the stripped `sentinel_cmd`).
///
/// Returns the index of that line within `lines`, if found.
#[must_use]
pub fn find_sentinel_line(lines: &[String], sentinel: &str, sentinel_cmd: &str) -> Option<usize> {
    let sentinel_cmd_stripped = sentinel_cmd.trim();
    lines.iter().position(|line| {
        let stripped = line.trim();
        stripped.contains(sentinel)
            && stripped != sentinel_cmd_stripped
            && !stripped.ends_with(sentinel_cmd_stripped)
    })
}

/// Drop lines that are shell echoes of `cmd` or `sentinel_cmd` rather than
/// genuine program output: lines whose stripped form equals, or ends with,
/// either command's stripped form.
#[must_use]
pub fn filter_echoes(lines: &[String], cmd: &str, sentinel_cmd: &str) -> Vec<String> {
    let cmd = cmd.trim();
    let sentinel_cmd = sentinel_cmd.trim();
    lines
        .iter()
        .filter(|line| {
            let stripped = line.trim();
            stripped != cmd
                && stripped != sentinel_cmd
                && !stripped.ends_with(cmd)
                && !stripped.ends_with(sentinel_cmd)
        })
        .cloned()
        .collect()
}
