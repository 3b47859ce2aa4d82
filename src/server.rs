//! MCP server: tool definitions using rmcp macros.
//!
//! Exposes the PTY session engine as seven tools: `start_session`,
//! `run_command`, `send_keys`, `get_buffer`, `stop_session`, `set_sentinel`,
//! `list_sessions`.

use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::schemars;
use rmcp::tool;
use rmcp::tool_handler;
use rmcp::tool_router;
use rmcp::{ErrorData as McpError, ServerHandler};

use crate::config::SessionConfig;
use crate::error::PtyError;
use crate::escapes;
use crate::registry::Registry;

/// Default timeout for `run_command`, in seconds.
const DEFAULT_RUN_TIMEOUT_SECS: f64 = 30.0;

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

/// Parameters for the `start_session` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StartSessionParams {
    /// Executable to run. Defaults to `$SHELL`, or `/bin/bash`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments passed to `command`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Working directory for the session. Defaults to the server's cwd.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Seconds of inactivity before the session is reaped. Defaults to 1800.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Line capacity of the session's scrollback buffer. Defaults to 1000.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<usize>,
    /// Sentinel command template containing the literal placeholder
    /// `{sentinel}`. Defaults to `echo {sentinel}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentinel_command: Option<String>,
}

/// Parameters for the `run_command` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct RunCommandParams {
    /// ID of the session to run the command in.
    pub session_id: String,
    /// The command line to submit to the session's shell.
    pub command: String,
    /// Seconds to wait for the sentinel before returning partial output.
    /// Defaults to 30.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// Parameters for the `send_keys` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SendKeysParams {
    /// ID of the target session.
    pub session_id: String,
    /// Raw keys to send. Supports `\n`, `\r`, `\t`, `\\`, and `\xNN` escapes
    /// (e.g. `\x03` for Ctrl-C).
    pub keys: String,
}

/// Parameters for the `get_buffer` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct GetBufferParams {
    /// ID of the target session.
    pub session_id: String,
    /// Number of trailing lines to return. Omit for the whole buffer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
}

/// Parameters for the `stop_session` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct StopSessionParams {
    /// ID of the session to stop.
    pub session_id: String,
}

/// Parameters for the `set_sentinel` tool.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
pub struct SetSentinelParams {
    /// ID of the target session.
    pub session_id: String,
    /// New sentinel template. Must contain the literal placeholder
    /// `{sentinel}`.
    pub sentinel_command: String,
}

// ---------------------------------------------------------------------------
// MCP server
// ---------------------------------------------------------------------------

/// Converts an uncaught [`PtyError`] into the exact tool-visible text: the
/// `NotFound`/`Capacity` variants are returned as-is (their `Display` text
/// already matches the spec'd wording), everything else is prefixed.
fn error_text(e: &PtyError) -> String {
    match e {
        PtyError::NotFound(_) | PtyError::Capacity(_) => e.to_string(),
        _ => format!("Error: {e}"),
    }
}

fn ok_text(text: impl Into<String>) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

fn err_text(e: &PtyError) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(error_text(e))]))
}

/// The PTY session MCP server.
#[derive(Clone)]
pub struct PtyMcpServer {
    registry: Arc<Registry>,
    tool_router: ToolRouter<PtyMcpServer>,
}

impl PtyMcpServer {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PtyMcpServer {
    #[tool(
        description = "Start a new PTY-attached shell session. The session persists across run_command/send_keys calls: working directory, environment variables, shell functions, and aliases carry over. Returns the new session's id."
    )]
    async fn start_session(
        &self,
        Parameters(params): Parameters<StartSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let config = SessionConfig::from_overrides(
            params.command,
            params.args.unwrap_or_default(),
            params.cwd,
            params.timeout_seconds,
            params.buffer_size,
            params.sentinel_command,
        );
        let id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();

        tracing::info!(id = %id, command = %config.command, "start_session");

        match self.registry.create(id.clone(), config).await {
            Ok(session) => ok_text(format!(
                "Session started: {}\nCommand: {}\nCWD: {}",
                session.id, session.summary().command, session.summary().cwd
            )),
            Err(e) => err_text(&e),
        }
    }

    #[tool(
        description = "Run a command to completion in an existing session using the sentinel-based completion protocol, and return its output. If the command doesn't finish within `timeout` seconds (default 30), returns the partial output collected so far prefixed with a TIMEOUT marker; the command keeps running in the background and its output can be retrieved with get_buffer."
    )]
    async fn run_command(
        &self,
        Parameters(params): Parameters<RunCommandParams>,
    ) -> Result<CallToolResult, McpError> {
        let Some(session) = self.registry.get(&params.session_id).await else {
            return err_text(&PtyError::NotFound(params.session_id));
        };

        let timeout_secs = params.timeout.unwrap_or(DEFAULT_RUN_TIMEOUT_SECS);
        let timeout = Duration::from_secs_f64(timeout_secs.max(0.0));

        tracing::info!(session = %params.session_id, command = %params.command, "run_command");

        match session.run_command(&params.command, timeout).await {
            Ok((output, true)) => ok_text(output),
            Ok((output, false)) => ok_text(format!(
                "[TIMEOUT: Command did not complete within {timeout_secs}s]\n{output}"
            )),
            Err(e) => err_text(&e),
        }
    }

    #[tool(
        description = "Send raw keys to a session without waiting for completion. Use for interactive input (answering prompts, Ctrl-C via \\x03, arrow keys). Escapes \\n, \\r, \\t, \\\\, and \\xNN are decoded before sending."
    )]
    async fn send_keys(
        &self,
        Parameters(params): Parameters<SendKeysParams>,
    ) -> Result<CallToolResult, McpError> {
        let Some(session) = self.registry.get(&params.session_id).await else {
            return err_text(&PtyError::NotFound(params.session_id));
        };

        let bytes = escapes::decode(&params.keys);
        match session.send_keys(&bytes).await {
            Ok(()) => ok_text("Keys sent"),
            Err(e) => err_text(&e),
        }
    }

    #[tool(
        description = "Read the buffered output of a session without running a new command. Pass `lines` to get only the last N lines, or omit it for the whole buffer."
    )]
    async fn get_buffer(
        &self,
        Parameters(params): Parameters<GetBufferParams>,
    ) -> Result<CallToolResult, McpError> {
        let Some(session) = self.registry.get(&params.session_id).await else {
            return err_text(&PtyError::NotFound(params.session_id));
        };
        ok_text(session.get_buffer(params.lines))
    }

    #[tool(
        description = "Stop a session and terminate its child process (SIGTERM, then SIGKILL after a short grace period). Idempotent."
    )]
    async fn stop_session(
        &self,
        Parameters(params): Parameters<StopSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(session = %params.session_id, "stop_session");
        if self.registry.remove(&params.session_id).await {
            ok_text(format!("Session stopped: {}", params.session_id))
        } else {
            err_text(&PtyError::NotFound(params.session_id))
        }
    }

    #[tool(
        description = "Change the sentinel command template used by future run_command calls in a session. The template must contain the literal placeholder {sentinel}, e.g. \"echo {sentinel}\" for a POSIX shell or \"print('{sentinel}')\" for a Python REPL. Does not affect a command already in flight."
    )]
    async fn set_sentinel(
        &self,
        Parameters(params): Parameters<SetSentinelParams>,
    ) -> Result<CallToolResult, McpError> {
        let Some(session) = self.registry.get(&params.session_id).await else {
            return err_text(&PtyError::NotFound(params.session_id));
        };
        if !params.sentinel_command.contains("{sentinel}") {
            return err_text(&PtyError::Config(
                "sentinel_command must contain the literal placeholder {sentinel}".to_string(),
            ));
        }
        session.set_sentinel(params.sentinel_command.clone());
        ok_text(format!(
            "Sentinel command updated to: {}",
            params.sentinel_command
        ))
    }

    #[tool(
        description = "List all tracked sessions with their id, command, working directory, and whether the underlying process is still alive."
    )]
    async fn list_sessions(&self) -> Result<CallToolResult, McpError> {
        let sessions = self.registry.list().await;
        if sessions.is_empty() {
            return ok_text("No active sessions");
        }
        let mut text = String::from("Active sessions:\n");
        for s in sessions {
            text.push_str(&format!(
                "  {}: {} (cwd: {}, alive: {})\n",
                s.id, s.command, s.cwd, s.is_alive
            ));
        }
        ok_text(text.trim_end().to_string())
    }
}

#[tool_handler]
impl ServerHandler for PtyMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "agentsh-pty".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Each session is a long-lived shell attached to a real PTY: working \
                 directory, environment variables, shell functions, and aliases persist \
                 across calls. Start one with start_session, then drive it with \
                 run_command.\n\n\
                 run_command submits a line to the shell and waits for it to finish using \
                 a sentinel protocol: after your command, a second line echoing a unique \
                 marker is submitted, and output up to (but not including) that marker is \
                 returned. If the command hasn't finished within `timeout` seconds, the \
                 partial output collected so far is returned with a TIMEOUT marker -- the \
                 command keeps running, and its output can be read later with get_buffer \
                 or waited on again with another run_command.\n\n\
                 Use send_keys for interactive input the command is waiting on (answering \
                 a prompt, Ctrl-C via \\x03) rather than run_command, since send_keys \
                 doesn't wait for a sentinel.\n\n\
                 set_sentinel changes the completion marker template for sessions whose \
                 shell doesn't understand `echo {sentinel}` (e.g. a Python REPL started as \
                 the session's command), as long as the template contains the literal \
                 placeholder {sentinel}.\n\n\
                 Sessions idle beyond their idle_timeout, or whose process has exited, are \
                 reaped automatically; stop_session reclaims one immediately."
                    .to_string(),
            ),
        }
    }
}
