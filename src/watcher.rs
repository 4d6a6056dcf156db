//! Turns raw file-change notifications into timeline snapshots.
//!
//! Any filesystem watcher can feed [`ProjectChangeFilter`]; only saves of NLE
//! project files survive, and repeated saves of the same file inside the
//! debounce window collapse into one event.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    error::{Result, TrackerError},
    ingest::IngestHandle,
    models::{Event, EventPayload, TimelineSnapshotPayload},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Resolve, Premiere, Final Cut and Avid project extensions.
pub const PROJECT_EXTENSIONS: &[&str] = &["drp", "prproj", "fcpxml", "avp"];

#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub is_directory: bool,
    pub size_bytes: Option<u64>,
    pub observed_at: DateTime<Utc>,
}

impl FileChange {
    pub fn modified(path: impl Into<PathBuf>, size_bytes: Option<u64>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            size_bytes,
            observed_at: Utc::now(),
        }
    }
}

pub struct ProjectChangeFilter {
    debounce: Duration,
    last_emitted: HashMap<PathBuf, DateTime<Utc>>,
}

impl ProjectChangeFilter {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_emitted: HashMap::new(),
        }
    }

    pub fn is_project_file(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                PROJECT_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Returns the payload to record for `change`, or `None` when the change
    /// is filtered out or debounced.
    pub fn observe(&mut self, change: &FileChange) -> Option<EventPayload> {
        if change.is_directory || !Self::is_project_file(&change.path) {
            return None;
        }

        if let Some(last) = self.last_emitted.get(&change.path) {
            // A notice stamped before the last emitted one is a repeat.
            let within_window = (change.observed_at - *last)
                .to_std()
                .map_or(true, |elapsed| elapsed <= self.debounce);
            if within_window {
                return None;
            }
        }
        self.last_emitted
            .insert(change.path.clone(), change.observed_at);

        let label = change.path.to_string_lossy().into_owned();
        EventPayload::timeline_snapshot(TimelineSnapshotPayload {
            label,
            size_bytes: change.size_bytes,
            ..TimelineSnapshotPayload::default()
        })
        .ok()
    }

    /// Filters `change` and submits the resulting snapshot through the
    /// ingest queue, stamped with the time the change was observed.
    pub async fn forward(
        &mut self,
        change: &FileChange,
        ingest: &IngestHandle,
    ) -> Option<Result<Event>> {
        let payload = self.observe(change)?;
        let result = ingest.submit(payload, Some(change.observed_at)).await;

        match &result {
            Ok(_) => log_info!("Project save recorded: {}", change.path.display()),
            Err(TrackerError::NoActiveSession) => {
                log_info!("Ignoring project save with no active session: {}", change.path.display())
            }
            Err(err) => log_warn!("Project save not recorded ({err}): {}", change.path.display()),
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn change_at(path: &str, at: DateTime<Utc>) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            is_directory: false,
            size_bytes: Some(2048),
            observed_at: at,
        }
    }

    #[test]
    fn test_only_project_files_pass() {
        let mut filter = ProjectChangeFilter::new(Duration::from_secs(2));
        let now = Utc::now();

        assert!(filter.observe(&change_at("/p/cut.DRP", now)).is_some());
        assert!(filter.observe(&change_at("/p/render.mov", now)).is_none());
        assert!(filter.observe(&change_at("/p/notes", now)).is_none());

        let mut dir = change_at("/p/bins.fcpxml", now);
        dir.is_directory = true;
        assert!(filter.observe(&dir).is_none());
    }

    #[test]
    fn test_repeated_saves_are_debounced() {
        let mut filter = ProjectChangeFilter::new(Duration::from_secs(2));
        let t0 = Utc::now();

        assert!(filter.observe(&change_at("/p/a.drp", t0)).is_some());
        assert!(filter
            .observe(&change_at("/p/a.drp", t0 + ChronoDuration::milliseconds(1500)))
            .is_none());
        assert!(filter
            .observe(&change_at("/p/b.drp", t0 + ChronoDuration::milliseconds(1500)))
            .is_some());
        assert!(filter
            .observe(&change_at("/p/a.drp", t0 + ChronoDuration::seconds(3)))
            .is_some());
    }

    #[test]
    fn test_large_debounce_is_honored() {
        let mut filter = ProjectChangeFilter::new(Duration::from_secs(u64::MAX));
        let t0 = Utc::now();

        assert!(filter.observe(&change_at("/p/a.drp", t0)).is_some());
        assert!(filter
            .observe(&change_at("/p/a.drp", t0 + ChronoDuration::days(3650)))
            .is_none());
    }

    #[test]
    fn test_out_of_order_notice_is_treated_as_repeat() {
        let mut filter = ProjectChangeFilter::new(Duration::from_secs(2));
        let t0 = Utc::now();

        assert!(filter.observe(&change_at("/p/a.drp", t0)).is_some());
        assert!(filter
            .observe(&change_at("/p/a.drp", t0 - ChronoDuration::seconds(30)))
            .is_none());
    }

    #[test]
    fn test_snapshot_carries_path_and_size() {
        let mut filter = ProjectChangeFilter::new(Duration::from_secs(2));
        let payload = filter
            .observe(&change_at("/p/doc.prproj", Utc::now()))
            .unwrap();

        match payload {
            EventPayload::TimelineSnapshot(snapshot) => {
                assert_eq!(snapshot.label, "/p/doc.prproj");
                assert_eq!(snapshot.size_bytes, Some(2048));
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
