use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    #[default]
    Idle,
    Active,
}

/// In-memory view of the controller: which session, if any, is open and how
/// many events it has collected so far.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub session_id: Option<String>,
    pub project_label: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub event_count: usize,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status == TrackerStatus::Active
    }

    pub fn active_session_id(&self) -> Option<&str> {
        match self.status {
            TrackerStatus::Active => self.session_id.as_deref(),
            TrackerStatus::Idle => None,
        }
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        project_label: String,
        started_at: DateTime<Utc>,
    ) {
        *self = Self {
            status: TrackerStatus::Active,
            session_id: Some(session_id),
            project_label: Some(project_label),
            started_at: Some(started_at),
            event_count: 0,
        };
    }

    pub fn note_event(&mut self) {
        self.event_count = self.event_count.saturating_add(1);
    }

    pub fn end_session(&mut self) {
        *self = Self::default();
    }
}
