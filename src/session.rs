//! A single PTY-attached child process: its lifecycle, its reader task, and
//! the sentinel-based command-completion protocol layered on top of it.
//!
//! This is the core of the crate. Everything else (the registry, the MCP
//! tool surface) is a thin layer of bookkeeping and translation around the
//! operations defined here.

use std::io::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use pty_process::{Command as PtyCommand, OwnedWritePty, Size};
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::buffer::LineBuffer;
use crate::config::SessionConfig;
use crate::error::{PtyError, PtyResult};
use crate::sanitizer::sanitize;
use crate::sentinel;

/// Bytes read from the master fd per chunk.
const READ_CHUNK_SIZE: usize = 4096;
/// Poll interval while waiting for a sentinel to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Grace period between SIGTERM and SIGKILL on stop.
const TERM_GRACE: Duration = Duration::from_millis(100);
/// Terminal geometry: wide, to minimize line-wrapping in captured output.
const PTY_SIZE: (u16, u16) = (24, 250);

/// Lifecycle state of a [`PtySession`]. See spec §4.2 for the transition
/// diagram: `Starting -> Running -> Stopping -> Stopped`, terminal at
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Snapshot used by `Registry::list` and the `list_sessions` tool.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub command: String,
    pub cwd: String,
    pub created_at_secs_ago: u64,
    pub last_activity_secs_ago: u64,
    pub is_alive: bool,
    pub state: SessionState,
}

/// A PTY-attached child process plus its output buffer and command protocol.
pub struct PtySession {
    pub id: String,
    command: String,
    cwd: String,
    idle_timeout: Duration,
    created_at: Instant,
    last_activity: Arc<StdMutex<Instant>>,
    state: StdMutex<SessionState>,
    buffer: Arc<StdMutex<LineBuffer>>,
    sentinel_template: StdMutex<String>,
    pid: StdMutex<Option<i32>>,
    writer: AsyncMutex<Option<OwnedWritePty>>,
    child: AsyncMutex<Option<tokio::process::Child>>,
    reader_handle: AsyncMutex<Option<JoinHandle<()>>>,
    /// Guards single-inflight `run_command` per session (spec §4.3).
    command_lock: AsyncMutex<()>,
}

impl PtySession {
    /// Fork a child attached to a new PTY and start draining its output.
    ///
    /// Fails with [`PtyError::Spawn`] if the PTY can't be opened/resized or
    /// the child can't be exec'd.
    pub async fn start(
        id: String,
        config: &SessionConfig,
        log_dir: Option<&str>,
    ) -> PtyResult<Arc<Self>> {
        let (pty, pts) = pty_process::open().map_err(|e| PtyError::Spawn(e.to_string()))?;
        pty.resize(Size::new(PTY_SIZE.0, PTY_SIZE.1))
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let mut cmd = PtyCommand::new(&config.command);
        cmd = cmd.args(&config.args);
        cmd = cmd.current_dir(&config.cwd);

        let child = cmd
            .spawn(pts)
            .map_err(|e| PtyError::Spawn(format!("failed to spawn '{}': {e}", config.command)))?;
        let pid = child.id().map(|p| p as i32);

        let (read_half, write_half) = pty.into_split();

        let log_sink = match log_dir {
            Some(dir) => Some(open_log_sink(dir, &config.command, &id)?),
            None => None,
        };

        let buffer = Arc::new(StdMutex::new(LineBuffer::new(config.buffer_size)));
        let last_activity = Arc::new(StdMutex::new(Instant::now()));

        let reader_handle = tokio::spawn(reader_loop(
            read_half,
            buffer.clone(),
            last_activity.clone(),
            log_sink,
        ));

        let session = Arc::new(Self {
            id,
            command: config.command.clone(),
            cwd: config.cwd.clone(),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            created_at: Instant::now(),
            last_activity,
            state: StdMutex::new(SessionState::Running),
            buffer,
            sentinel_template: StdMutex::new(config.sentinel_template.clone()),
            pid: StdMutex::new(pid),
            writer: AsyncMutex::new(Some(write_half)),
            child: AsyncMutex::new(Some(child)),
            reader_handle: AsyncMutex::new(Some(reader_handle)),
            command_lock: AsyncMutex::new(()),
        });

        Ok(session)
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn touch_activity(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    /// Write raw bytes to the master fd and mark the session active.
    async fn write_raw(&self, bytes: &[u8]) -> PtyResult<()> {
        if self.state() != SessionState::Running {
            return Err(PtyError::Io(format!("session {} is not running", self.id)));
        }
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| PtyError::Io(format!("session {} has no writer", self.id)))?;
        writer
            .write_all(bytes)
            .await
            .map_err(|e| PtyError::Io(e.to_string()))?;
        writer.flush().await.map_err(|e| PtyError::Io(e.to_string()))?;
        self.touch_activity();
        Ok(())
    }

    /// Send raw bytes (already decoded from any textual escapes by the
    /// caller) to the session's PTY.
    pub async fn send_keys(&self, bytes: &[u8]) -> PtyResult<()> {
        self.write_raw(bytes).await
    }

    /// Run `cmd` to completion using the sentinel protocol, or return the
    /// partial output with `completed = false` on timeout.
    ///
    /// At most one `run_command` may be in flight per session; an
    /// overlapping call fails fast with [`PtyError::Busy`].
    pub async fn run_command(&self, cmd: &str, timeout: Duration) -> PtyResult<(String, bool)> {
        if self.state() != SessionState::Running {
            return Err(PtyError::Io(format!("session {} is not running", self.id)));
        }

        let _guard = self
            .command_lock
            .try_lock()
            .map_err(|_| PtyError::Busy(self.id.clone()))?;

        let sentinel = sentinel::generate_sentinel();
        let template = self.sentinel_template.lock().unwrap().clone();
        let sentinel_cmd = sentinel::materialize(&template, &sentinel);

        let base = self.buffer.lock().unwrap().len();

        let payload = format!("{cmd}\n{sentinel_cmd}\n");
        self.write_raw(payload.as_bytes()).await?;

        let start = Instant::now();
        loop {
            let new_lines = self.buffer.lock().unwrap().snapshot_from(base);

            if let Some(idx) = sentinel::find_sentinel_line(&new_lines, &sentinel, &sentinel_cmd) {
                let raw_output = &new_lines[..idx];
                let filtered = sentinel::filter_echoes(raw_output, cmd, &sentinel_cmd);
                return Ok((filtered.join("\n"), true));
            }

            if start.elapsed() > timeout {
                return Ok((new_lines.join("\n"), false));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Return the last `n` buffered lines (or all of them), joined by `\n`.
    /// A pure read: does not affect `last_activity`.
    #[must_use]
    pub fn get_buffer(&self, n: Option<usize>) -> String {
        self.buffer.lock().unwrap().tail_joined(n)
    }

    /// Replace the sentinel template used by future `run_command` calls.
    /// Never affects an in-flight command or rewrites the buffer.
    pub fn set_sentinel(&self, template: String) {
        *self.sentinel_template.lock().unwrap() = template;
    }

    /// True iff the child pid is still signalable (`kill(pid, 0)`).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let pid = match *self.pid.lock().unwrap() {
            Some(pid) => pid,
            None => return false,
        };
        signal::kill(Pid::from_raw(pid), None).is_ok()
    }

    /// Idempotent teardown: cancel the reader, close the log sink and the
    /// master fd, SIGTERM then (after a grace period) SIGKILL the child,
    /// and reap it with a non-blocking wait.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state == SessionState::Stopped || *state == SessionState::Stopping {
                return;
            }
            *state = SessionState::Stopping;
        }

        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }

        // Dropping the write half closes the session's half of the master
        // fd; the reader task already dropped the read half on exit.
        self.writer.lock().await.take();

        if let Some(pid) = *self.pid.lock().unwrap() {
            let pid = Pid::from_raw(pid);
            let _ = signal::kill(pid, Signal::SIGTERM);
            tokio::time::sleep(TERM_GRACE).await;
            let _ = signal::kill(pid, Signal::SIGKILL);
        }

        if let Some(mut child) = self.child.lock().await.take() {
            // Non-blocking reap: don't let a wedged child hang shutdown.
            let _ = tokio::time::timeout(Duration::from_millis(500), child.wait()).await;
        }

        *self.state.lock().unwrap() = SessionState::Stopped;
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            created_at_secs_ago: self.created_at.elapsed().as_secs(),
            last_activity_secs_ago: self.last_activity.lock().unwrap().elapsed().as_secs(),
            is_alive: self.is_alive(),
            state: self.state(),
        }
    }

    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

fn open_log_sink(log_dir: &str, command: &str, id: &str) -> PtyResult<std::fs::File> {
    let basename = Path::new(command)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| command.to_string());
    let path = Path::new(log_dir).join(format!("pty_{basename}_{id}.log"));
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| PtyError::Config(format!("failed to open log sink {}: {e}", path.display())))
}

/// Continuously drain the master fd, sanitize each chunk, and move
/// completed lines into the shared buffer (and, if configured, the log
/// sink). Exits quietly on EOF or a fatal read error; the reaper notices
/// the resulting dead session on its next tick.
async fn reader_loop(
    mut read_half: pty_process::OwnedReadPty,
    buffer: Arc<StdMutex<LineBuffer>>,
    last_activity: Arc<StdMutex<Instant>>,
    mut log_sink: Option<std::fs::File>,
) {
    let mut partial = String::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match read_half.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let text = sanitize(&chunk[..n]);
                if text.is_empty() {
                    continue;
                }
                partial.push_str(&text);
                while let Some(pos) = partial.find('\n') {
                    let line: String = partial.drain(..=pos).collect();
                    let line = line.trim_end_matches('\n').to_string();
                    buffer.lock().unwrap().push(line.clone());
                    if let Some(f) = log_sink.as_mut() {
                        let _ = writeln!(f, "{line}");
                    }
                }
                *last_activity.lock().unwrap() = Instant::now();
            }
            Err(_) => break,
        }
    }

    if let Some(mut f) = log_sink.take() {
        let _ = f.flush();
    }
}
