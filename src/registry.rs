//! Session registry: creates, indexes, and removes sessions; enforces the
//! `max_sessions` cap; runs the periodic reaper for idle or dead sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::{PtyError, PtyResult};
use crate::session::{PtySession, SessionSummary};

/// How often the reaper wakes to check for idle or dead sessions.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Creates/indexes/removes [`PtySession`]s and runs the idle/dead reaper.
pub struct Registry {
    sessions: Arc<Mutex<HashMap<String, Arc<PtySession>>>>,
    max_sessions: usize,
    log_dir: Option<String>,
    reaper: StdMutex<Option<JoinHandle<()>>>,
}

impl Registry {
    /// Build a registry and start its background reaper task.
    #[must_use]
    pub fn new(max_sessions: usize, log_dir: Option<String>) -> Arc<Self> {
        let registry = Arc::new(Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions,
            log_dir,
            reaper: StdMutex::new(None),
        });

        let reaper_registry = registry.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(REAP_INTERVAL).await;
                reaper_registry.reap_once().await;
            }
        });
        *registry.reaper.lock().unwrap() = Some(handle);

        registry
    }

    async fn reap_once(&self) {
        let candidates: Vec<(String, Arc<PtySession>)> = {
            let sessions = self.sessions.lock().await;
            sessions.iter().map(|(id, s)| (id.clone(), s.clone())).collect()
        };

        for (id, session) in candidates {
            if session.idle_for() > session.idle_timeout() {
                tracing::info!(id = %id, "reaper: removing idle session");
                self.remove(&id).await;
                continue;
            }
            if !session.is_alive() {
                tracing::info!(id = %id, "reaper: removing dead session");
                self.remove(&id).await;
            }
        }
    }

    /// Create and start a new session. Fails with [`PtyError::Capacity`] if
    /// `max_sessions` has been reached.
    pub async fn create(&self, id: String, config: SessionConfig) -> PtyResult<Arc<PtySession>> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_sessions {
            return Err(PtyError::Capacity(self.max_sessions));
        }

        let session = PtySession::start(id.clone(), &config, self.log_dir.as_deref()).await?;
        sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Look up a session by id. Never blocks on PTY I/O.
    pub async fn get(&self, id: &str) -> Option<Arc<PtySession>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Stop and remove a session, if present.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id);
        match removed {
            Some(session) => {
                session.stop().await;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every tracked session, in unspecified order.
    pub async fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .await
            .values()
            .map(|s| s.summary())
            .collect()
    }

    /// Cancel the reaper and stop every remaining session.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.reaper.lock().unwrap().take() {
            handle.abort();
        }
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            self.remove(&id).await;
        }
    }
}
