//! Session data models.
//!
//! A `Session` brackets a period of observation for one project. Exactly one
//! session is open per tracker; everything recorded while it is open is tagged
//! with its id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    /// Force-closed because a new session started while this one was open.
    Superseded,
    /// Left open by a process that exited without stopping it.
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Superseded => "superseded",
            SessionStatus::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub project_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
}

impl Session {
    pub fn open(
        project_label: impl Into<String>,
        project_path: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_label: project_label.into(),
            project_path,
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes the session. `ended_at` never precedes `started_at`, even when
    /// the wall clock stepped backwards in between.
    pub fn close(&mut self, status: SessionStatus, at: DateTime<Utc>) {
        self.ended_at = Some(at.max(self.started_at));
        self.status = status;
    }

    /// Elapsed time; open sessions are measured up to `now`.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub duration_secs: f64,
    pub event_count: usize,
}

impl SessionSummary {
    pub fn new(session: Session, event_count: usize, now: DateTime<Utc>) -> Self {
        let duration = session.duration(now);
        let duration_secs = duration
            .num_microseconds()
            .map(|micros| micros as f64 / 1_000_000.0)
            .unwrap_or_else(|| duration.num_seconds() as f64);

        Self {
            session,
            duration_secs,
            event_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_clamps_to_start() {
        let start = Utc::now();
        let mut session = Session::open("doc-1", None, start);
        session.close(SessionStatus::Completed, start - Duration::seconds(5));

        assert_eq!(session.ended_at, Some(start));
        assert_eq!(session.duration(Utc::now()), Duration::zero());
    }

    #[test]
    fn test_summary_duration_in_seconds() {
        let start = Utc::now();
        let mut session = Session::open("doc-1", Some("/projects/doc".into()), start);
        session.close(
            SessionStatus::Completed,
            start + Duration::milliseconds(1500),
        );

        let summary = SessionSummary::new(session, 3, Utc::now());
        assert!((summary.duration_secs - 1.5).abs() < 1e-9);
        assert_eq!(summary.event_count, 3);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Superseded).unwrap();
        assert_eq!(json, "\"superseded\"");
        assert_eq!(SessionStatus::Interrupted.as_str(), "interrupted");
    }
}
