//! Session persistence and the shared session cell.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use thiserror::Error;

use tern_types::{Message, Session};
use tern_utils::atomic_write;

use crate::agent::TurnCompleteFn;
use crate::effect::Mailbox;
use crate::msg::Msg;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to encode session {id}: {source}")]
    Encode { id: String, source: serde_json::Error },
}

pub trait SessionStore: Send + Sync {
    /// All sessions, most recently updated first.
    fn list(&self) -> Result<Vec<Session>, StoreError>;

    fn most_recent(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.list()?.into_iter().next())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError>;

    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// One pretty-printed JSON file per session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl SessionStore for FileSessionStore {
    fn list(&self) -> Result<Vec<Session>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable session");
                    continue;
                }
            };
            match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping malformed session");
                }
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(session).map_err(|source| StoreError::Encode {
            id: session.id.clone(),
            source,
        })?;
        let path = self.path_for(&session.id);
        atomic_write(&path, &bytes).map_err(|source| StoreError::Write { path, source })
    }
}

/// The active session, shared between the loop and the worker's
/// turn-complete callback.
#[derive(Debug, Clone)]
pub struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.with(|s| s.clone())
    }

    #[must_use]
    pub fn id(&self) -> String {
        self.with(|s| s.id.clone())
    }

    /// Adopts every field of `session` in place.
    pub fn replace(&self, session: Session) {
        self.with(|s| *s = session);
    }
}

/// Callback that records the worker's history into `session` and saves it.
/// Save failures are reported to the loop as warnings.
#[must_use]
pub fn turn_complete_callback(
    session: SharedSession,
    store: Arc<dyn SessionStore>,
    mailbox: Mailbox,
) -> TurnCompleteFn {
    Arc::new(move |messages: &[Message]| {
        let snapshot = session.with(|s| {
            s.messages = messages.to_vec();
            s.updated_at = Utc::now();
            s.clone()
        });
        if let Err(err) = store.save(&snapshot) {
            tracing::warn!(session = %snapshot.id, %err, "session save failed");
            mailbox.post(Msg::StoreWarning(err.to_string()));
        }
    })
}
