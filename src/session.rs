//! Per-session state: conversation history, memory window, processed
//! sources, and the lifecycle of the on-disk index.
//!
//! One [`Session`] exists per browser tab for the process's lifetime; the
//! in-memory map is the only cross-request store. Only the vector index
//! survives a restart, and only until the next rebuild or reset.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::message::ChatMessage;
use crate::retry::retry_with_delay;
use crate::types::{AssistantError, QAExchange, SourceMetadata};

/// Number of chat messages folded into each prompt.
pub const MEMORY_WINDOW: usize = 8;

/// Bounded retries for index deletion under transient OS file locks.
pub const RESET_ATTEMPTS: usize = 3;

/// Fixed delay between deletion attempts.
pub const RESET_DELAY: Duration = Duration::from_secs(1);

/// One user's isolated working set.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub index_path: PathBuf,
    pub conversation_history: Vec<QAExchange>,
    pub memory: Vec<ChatMessage>,
    pub processed_sources: Vec<SourceMetadata>,
}

impl Session {
    fn new(data_dir: &Path) -> Self {
        let id = short_token();
        let index_path = data_dir.join(format!("index_{id}"));
        Self {
            id,
            index_path,
            conversation_history: Vec::new(),
            memory: Vec::new(),
            processed_sources: Vec::new(),
        }
    }

    /// The recent-memory slice used for prompt composition. Older entries
    /// stay in `conversation_history` but drop out of this window.
    pub fn memory_window(&self) -> &[ChatMessage] {
        let start = self.memory.len().saturating_sub(MEMORY_WINDOW);
        &self.memory[start..]
    }
}

fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// In-memory session map with explicit create/clear/destroy operations.
pub struct SessionStore {
    data_dir: PathBuf,
    sessions: Mutex<HashMap<String, Session>>,
    reset_delay: Duration,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            sessions: Mutex::new(HashMap::new()),
            reset_delay: RESET_DELAY,
        }
    }

    /// Same store with a custom retry delay (tests).
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// Creates a fresh session and returns a snapshot of it.
    pub fn create(&self) -> Session {
        let session = Session::new(&self.data_dir);
        info!(session_id = %session.id, "session created");
        self.sessions
            .lock()
            .insert(session.id.clone(), session.clone());
        session
    }

    /// Snapshot of a session, if it exists.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// Runs `f` against the live session entry.
    pub fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, AssistantError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AssistantError::InvalidInput(format!("unknown session {session_id}")))?;
        Ok(f(session))
    }

    /// Rotates to a new session id, dropping the old session's in-memory
    /// state. The old on-disk index is NOT deleted here: deletion happens on
    /// the next processing run against it or through an explicit reset.
    pub fn new_session(&self, old_session_id: &str) -> Session {
        let session = Session::new(&self.data_dir);
        let mut sessions = self.sessions.lock();
        if sessions.remove(old_session_id).is_some() {
            info!(old = old_session_id, new = %session.id, "session rotated");
        }
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// Empties history and memory; the index and processed-sources list are
    /// retained.
    pub fn clear_conversation(&self, session_id: &str) -> Result<(), AssistantError> {
        self.with_session(session_id, |session| {
            session.conversation_history.clear();
            session.memory.clear();
        })
    }

    /// Removes one processed source record by position.
    pub fn remove_source(&self, session_id: &str, position: usize) -> Result<(), AssistantError> {
        self.with_session(session_id, |session| {
            if position >= session.processed_sources.len() {
                return Err(AssistantError::InvalidInput(format!(
                    "no processed source at position {position}"
                )));
            }
            session.processed_sources.remove(position);
            Ok(())
        })?
    }

    /// Deletes the session's on-disk index, with bounded retries to ride out
    /// transient OS file locks. Idempotent: an absent index is a success.
    /// The processed-sources list is cleared alongside the index.
    pub async fn reset_index(&self, session_id: &str) -> Result<(), AssistantError> {
        let index_path = self.with_session(session_id, |session| session.index_path.clone())?;
        if index_path.exists() {
            retry_with_delay(RESET_ATTEMPTS, self.reset_delay, || {
                let path = index_path.clone();
                async move { fs::remove_dir_all(path).await }
            })
            .await
            .map_err(|err| {
                AssistantError::Index(format!(
                    "failed to reset index after {RESET_ATTEMPTS} attempts: {err}"
                ))
            })?;
            info!(session_id, path = %index_path.display(), "index reset");
        }
        self.with_session(session_id, |session| session.processed_sources.clear())
    }
}
