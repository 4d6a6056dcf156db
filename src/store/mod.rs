//! Durable aggregate of every session and event ever recorded.
//!
//! The store is a single JSON document, loaded once and rewritten in full on
//! every mutation. Events are append-only: nothing is removed or reordered.
//! The in-memory state is authoritative; a failed write leaves it intact and
//! the next successful write carries everything.

mod document;

pub use document::PatternDocument;

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackerError};
use crate::models::{Event, Session, SessionStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug)]
pub struct PatternStore {
    path: PathBuf,
    document: PatternDocument,
    needs_flush: bool,
}

impl PatternStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        let mut document = PatternDocument::default();
        document.refresh_cached_stats();
        Self {
            path: path.into(),
            document,
            needs_flush: false,
        }
    }

    /// Reads the document at `path`. A missing file yields an empty store; a
    /// file that is not a valid document yields [`TrackerError::CorruptData`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            log_info!("No pattern document at {}; starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let contents = fs::read(&path)?;
        let mut document: PatternDocument =
            serde_json::from_slice(&contents).map_err(|source| TrackerError::CorruptData {
                path: path.clone(),
                source,
            })?;
        document.refresh_cached_stats();

        log_info!(
            "Loaded pattern document from {} ({} sessions, {} events)",
            path.display(),
            document.sessions.len(),
            document.events.len()
        );

        Ok(Self {
            path,
            document,
            needs_flush: false,
        })
    }

    /// Like [`load`](Self::load), but a corrupt document is moved aside and
    /// replaced by an empty store. The returned warning describes what
    /// happened so the caller can surface it.
    pub fn load_or_recover(path: impl Into<PathBuf>) -> Result<(Self, Option<String>)> {
        let path = path.into();
        match Self::load(path.clone()) {
            Ok(store) => Ok((store, None)),
            Err(TrackerError::CorruptData { source, .. }) => {
                let warning = match quarantine(&path) {
                    Ok(moved_to) => format!(
                        "pattern document {} was unreadable ({source}); moved to {} and started empty",
                        path.display(),
                        moved_to.display()
                    ),
                    Err(err) => {
                        log_error!("Failed to move corrupt document {} aside: {err}", path.display());
                        format!(
                            "pattern document {} was unreadable ({source}); started empty",
                            path.display()
                        )
                    }
                };
                log_warn!("{warning}");
                Ok((Self::empty(path), Some(warning)))
            }
            Err(other) => Err(other),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn events(&self) -> &[Event] {
        &self.document.events
    }

    pub fn sessions(&self) -> &[Session] {
        &self.document.sessions
    }

    pub fn document(&self) -> &PatternDocument {
        &self.document
    }

    pub fn snapshot(&self) -> PatternDocument {
        self.document.clone()
    }

    /// True when the last write failed and memory is ahead of disk.
    pub fn needs_flush(&self) -> bool {
        self.needs_flush
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.document.sessions.iter().find(|session| session.id == id)
    }

    pub fn event_count_for(&self, session_id: &str) -> usize {
        self.document.events_for_session(session_id).count()
    }

    pub fn last_event_for(&self, session_id: &str) -> Option<&Event> {
        self.document
            .events
            .iter()
            .rev()
            .find(|event| event.session_id == session_id)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.document.events.last().map(|event| event.timestamp)
    }

    /// Adds `event` and rewrites the document. On a write failure the event
    /// stays recorded in memory and the error is returned.
    pub fn append(&mut self, event: Event) -> Result<()> {
        self.push_event(event);
        self.save()
    }

    /// Adds an event without persisting; follow with [`persist`](Self::persist).
    pub(crate) fn push_event(&mut self, event: Event) {
        self.document.events.push(event);
    }

    /// Adds a session without persisting; follow with [`persist`](Self::persist).
    pub(crate) fn push_session(&mut self, session: Session) {
        self.document.sessions.push(session);
    }

    /// Closes the session with `id` if it is still open, without persisting.
    pub(crate) fn close_session(
        &mut self,
        id: &str,
        status: SessionStatus,
        at: DateTime<Utc>,
    ) -> Option<Session> {
        let session = self
            .document
            .sessions
            .iter_mut()
            .find(|session| session.id == id && session.is_open())?;
        session.close(status, at);
        Some(session.clone())
    }

    /// Recomputes cached statistics and writes the document, retrying once.
    pub fn save(&mut self) -> Result<()> {
        self.document.refresh_cached_stats();
        let result = write_with_retry(&self.path, &self.document);
        self.finish_write(result)
    }

    /// [`save`](Self::save) with the file IO moved onto the blocking pool.
    /// The caller keeps `&mut self` for the whole write, so writes stay
    /// serialized.
    pub async fn persist(&mut self) -> Result<()> {
        self.document.refresh_cached_stats();
        let path = self.path.clone();
        let document = self.document.clone();

        let result = tokio::task::spawn_blocking(move || write_with_retry(&path, &document))
            .await
            .unwrap_or_else(|join_err| Err(io::Error::new(io::ErrorKind::Other, join_err)));
        self.finish_write(result)
    }

    fn finish_write(&mut self, result: io::Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                if self.needs_flush {
                    log_info!("Pattern document at {} is current again", self.path.display());
                }
                self.needs_flush = false;
                Ok(())
            }
            Err(source) => {
                self.needs_flush = true;
                log_error!(
                    "Failed to persist pattern document to {}: {source}; keeping {} events in memory",
                    self.path.display(),
                    self.document.events.len()
                );
                Err(TrackerError::PersistenceWrite {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

fn write_with_retry(path: &Path, document: &PatternDocument) -> io::Result<()> {
    write_document(path, document).or_else(|err| {
        log_warn!("Write to {} failed ({err}); retrying", path.display());
        write_document(path, document)
    })
}

/// Writes to a sibling temp file and renames it into place, so the document
/// on disk is always either the old or the new version.
fn write_document(path: &Path, document: &PatternDocument) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let serialized = serde_json::to_vec_pretty(document)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    let tmp_path = sibling_with_suffix(path, "tmp");
    fs::write(&tmp_path, serialized)?;
    fs::rename(&tmp_path, path)
}

fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let target = sibling_with_suffix(path, &format!("corrupt-{}", Utc::now().timestamp()));
    fs::rename(path, &target)?;
    Ok(target)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "patterns.json".to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}
