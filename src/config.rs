//! Immutable records describing how a session is launched and how the
//! server as a whole is configured.

use serde::Deserialize;

/// Default idle timeout: 30 minutes, matching the original implementation's
/// `SessionConfig` defaults.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;

/// Default scrollback buffer size, in lines.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Default sentinel template for POSIX shells.
pub const DEFAULT_SENTINEL_TEMPLATE: &str = "echo {sentinel}";

/// Default command run when none is requested: the user's shell, or
/// `/bin/bash` if `$SHELL` is unset.
#[must_use]
pub fn default_command() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

/// Immutable record describing how to launch and interact with one session.
///
/// Every field is fixed at `start_session` time except `sentinel_template`,
/// which `set_sentinel` may change in place without affecting an in-flight
/// command or rewriting the buffer.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Absolute (or `$PATH`-resolved) executable to run as the session's
    /// child process.
    pub command: String,
    /// Additional arguments passed to `command`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child.
    pub cwd: String,
    /// Seconds of inactivity before the reaper destroys the session.
    pub idle_timeout_secs: u64,
    /// Line capacity of the session's output buffer.
    pub buffer_size: usize,
    /// Template containing the literal placeholder `{sentinel}`, used by
    /// the command-completion protocol.
    pub sentinel_template: String,
}

impl SessionConfig {
    /// Build a config from optional tool-call overrides, falling back to
    /// the documented defaults for anything omitted.
    #[must_use]
    pub fn from_overrides(
        command: Option<String>,
        args: Vec<String>,
        cwd: Option<String>,
        idle_timeout_secs: Option<u64>,
        buffer_size: Option<usize>,
        sentinel_template: Option<String>,
    ) -> Self {
        Self {
            command: command.unwrap_or_else(default_command),
            args,
            cwd: cwd.unwrap_or_else(|| {
                std::env::current_dir()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "/".to_string())
            }),
            idle_timeout_secs: idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS),
            buffer_size: buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1),
            sentinel_template: sentinel_template
                .unwrap_or_else(|| DEFAULT_SENTINEL_TEMPLATE.to_string()),
        }
    }
}

/// Server-wide configuration, set once at process startup from CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on concurrently open sessions.
    pub max_sessions: usize,
    /// Directory session logs are written under, if any.
    pub log_dir: Option<String>,
}
