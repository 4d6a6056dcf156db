use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    config::TrackerConfig,
    error::{Result, TrackerError},
    insights::{InsightConfig, InsightReport, InsightScope},
    models::{Event, EventPayload, Session, SessionStatus, SessionSummary},
    store::{PatternDocument, PatternStore},
};

use super::{TrackerState, TrackerStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

struct ControllerInner {
    store: PatternStore,
    state: TrackerState,
}

/// Single point of serialization for everything that mutates the store.
///
/// Mutations take the write lock for their whole duration, including the
/// document write. Insight queries take the read lock and therefore never
/// observe a half-applied mutation.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<RwLock<ControllerInner>>,
    insight_config: Arc<InsightConfig>,
    startup_warnings: Arc<Vec<String>>,
}

impl SessionController {
    pub fn new(store: PatternStore) -> Self {
        Self::with_insight_config(store, InsightConfig::default())
    }

    pub fn with_insight_config(store: PatternStore, insight_config: InsightConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ControllerInner {
                store,
                state: TrackerState::new(),
            })),
            insight_config: Arc::new(insight_config),
            startup_warnings: Arc::new(Vec::new()),
        }
    }

    /// Loads the store named by `config`, recovering from a corrupt document
    /// and closing sessions a previous process left open.
    pub fn open(config: &TrackerConfig) -> Result<Self> {
        let (mut store, warning) = PatternStore::load_or_recover(&config.data_path)?;
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let recovered = recover_interrupted_sessions(&mut store);
        if recovered > 0 {
            if let Err(err) = store.save() {
                warnings.push(format!("recovered {recovered} interrupted sessions but could not save: {err}"));
            }
        }

        let mut controller = Self::with_insight_config(store, config.insights.clone());
        controller.startup_warnings = Arc::new(warnings);
        Ok(controller)
    }

    /// Problems found while opening the store that the caller should surface.
    pub fn startup_warnings(&self) -> &[String] {
        &self.startup_warnings
    }

    pub async fn state(&self) -> TrackerState {
        self.inner.read().await.state.clone()
    }

    pub async fn active_session(&self) -> Option<Session> {
        let guard = self.inner.read().await;
        guard
            .state
            .active_session_id()
            .and_then(|id| guard.store.session(id))
            .cloned()
    }

    /// Idle → Active. An already active session is closed as superseded and
    /// persisted together with the new one.
    pub async fn start_session(
        &self,
        project_label: impl Into<String>,
        project_path: Option<String>,
    ) -> Result<Session> {
        let project_label = project_label.into();
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let now = Utc::now();

        if let Some(prior_id) = inner.state.active_session_id().map(str::to_string) {
            if let Some(prior) = inner
                .store
                .close_session(&prior_id, SessionStatus::Superseded, now)
            {
                log_info!(
                    "Session {} ({}) superseded after {} events",
                    prior.id,
                    prior.project_label,
                    inner.store.event_count_for(&prior.id)
                );
            }
            inner.state.end_session();
        }

        let session = Session::open(project_label.clone(), project_path, now);
        inner.store.push_session(session.clone());
        inner
            .state
            .begin_session(session.id.clone(), project_label, session.started_at);

        log_info!("Session {} started for '{}'", session.id, session.project_label);

        inner.store.persist().await?;
        Ok(session)
    }

    /// Records one event in the active session. Fails with
    /// [`TrackerError::NoActiveSession`] while idle, leaving the store
    /// untouched.
    ///
    /// Timestamps never go backwards in insertion order: an explicit or
    /// wall-clock time earlier than the last stored event is raised to it.
    pub async fn record(
        &self,
        payload: EventPayload,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Event> {
        if payload.kind().is_none() {
            return Err(TrackerError::invalid(
                "event",
                format!("cannot record events of unrecognised kind '{}'", payload.kind_name()),
            ));
        }
        payload.validate()?;

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let session_id = inner
            .state
            .active_session_id()
            .ok_or(TrackerError::NoActiveSession)?
            .to_string();

        let requested = timestamp.unwrap_or_else(Utc::now);
        let stamped = match inner.store.last_timestamp() {
            Some(last) if last > requested => last,
            _ => requested,
        };

        let event = Event::new(session_id, stamped, payload);
        inner.state.note_event();

        inner.store.push_event(event.clone());
        match inner.store.persist().await {
            Ok(()) => Ok(event),
            Err(err) => {
                log_warn!("Event {} kept in memory only: {err}", event.id);
                Err(err)
            }
        }
    }

    /// Active → Idle. Returns the closed session with its duration and event
    /// count.
    pub async fn stop_session(&self) -> Result<SessionSummary> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let session_id = inner
            .state
            .active_session_id()
            .ok_or(TrackerError::NoActiveSession)?
            .to_string();

        let now = Utc::now();
        let session = inner
            .store
            .close_session(&session_id, SessionStatus::Completed, now)
            .ok_or(TrackerError::NoActiveSession)?;
        inner.state.end_session();

        let summary = SessionSummary::new(session, inner.store.event_count_for(&session_id), now);
        log_info!(
            "Session {} stopped after {:.1}s with {} events",
            summary.session.id,
            summary.duration_secs,
            summary.event_count
        );

        inner.store.persist().await?;
        Ok(summary)
    }

    /// Report over the active session, or over the whole store when idle.
    /// Scope and report come from the same read guard.
    pub async fn current_insights(&self) -> InsightReport {
        let guard = self.inner.read().await;
        let scope = match guard.state.active_session_id() {
            Some(id) => InsightScope::Session(id.to_string()),
            None => InsightScope::All,
        };
        self.build_report(&guard, scope, None)
    }

    pub async fn insights(&self, scope: InsightScope, current_phase: Option<&str>) -> InsightReport {
        let guard = self.inner.read().await;
        self.build_report(&guard, scope, current_phase)
    }

    fn build_report(
        &self,
        inner: &ControllerInner,
        scope: InsightScope,
        current_phase: Option<&str>,
    ) -> InsightReport {
        InsightReport::build(
            scope,
            inner.store.sessions(),
            inner.store.events(),
            current_phase,
            &self.insight_config,
        )
    }

    pub async fn session_summaries(&self) -> Vec<SessionSummary> {
        let guard = self.inner.read().await;
        let now = Utc::now();
        guard
            .store
            .sessions()
            .iter()
            .map(|session| {
                SessionSummary::new(session.clone(), guard.store.event_count_for(&session.id), now)
            })
            .collect()
    }

    pub async fn snapshot(&self) -> PatternDocument {
        self.inner.read().await.store.snapshot()
    }

    pub async fn needs_flush(&self) -> bool {
        self.inner.read().await.store.needs_flush()
    }

    /// Retries persistence after an earlier failed write. No-op when disk is
    /// already current.
    pub async fn flush(&self) -> Result<()> {
        let mut guard = self.inner.write().await;
        if guard.store.needs_flush() {
            guard.store.persist().await?;
        }
        Ok(())
    }

    /// Flush-and-close: completes the active session, if any, and writes the
    /// document.
    pub async fn shutdown(&self) -> Result<Option<SessionSummary>> {
        let summary = if self.state().await.status == TrackerStatus::Active {
            match self.stop_session().await {
                Ok(summary) => Some(summary),
                Err(TrackerError::NoActiveSession) => None,
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        self.flush().await?;
        log_info!("Tracker shut down");
        Ok(summary)
    }
}

/// Marks sessions left `Active` by an earlier process as interrupted, ending
/// them at their last event. Returns how many were closed.
fn recover_interrupted_sessions(store: &mut PatternStore) -> usize {
    let open: Vec<(String, DateTime<Utc>)> = store
        .sessions()
        .iter()
        .filter(|session| session.is_open())
        .map(|session| {
            let ended_at = store
                .last_event_for(&session.id)
                .map(|event| event.timestamp)
                .unwrap_or(session.started_at);
            (session.id.clone(), ended_at)
        })
        .collect();

    for (id, ended_at) in &open {
        if store
            .close_session(id, SessionStatus::Interrupted, *ended_at)
            .is_some()
        {
            log_warn!("Recovered incomplete session {id}; marking as interrupted");
        } else {
            log_error!("Session {id} vanished during recovery");
        }
    }
    open.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CutType;
    use tempfile::TempDir;

    fn controller_in(dir: &TempDir) -> SessionController {
        SessionController::new(PatternStore::empty(dir.path().join("patterns.json")))
    }

    #[tokio::test]
    async fn test_record_while_idle_fails_without_mutation() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);

        let payload = EventPayload::tool_use("Trim", None).unwrap();
        let err = controller.record(payload, None).await.unwrap_err();

        assert!(matches!(err, TrackerError::NoActiveSession));
        assert!(controller.snapshot().await.events.is_empty());
        assert!(!dir.path().join("patterns.json").exists());
    }

    #[tokio::test]
    async fn test_stop_while_idle_fails() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);
        assert!(matches!(
            controller.stop_session().await,
            Err(TrackerError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_timestamps_never_go_backwards() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);
        controller.start_session("doc-1", None).await.unwrap();

        let first = controller
            .record(EventPayload::tool_use("Trim", None).unwrap(), None)
            .await
            .unwrap();
        let earlier = first.timestamp - chrono::Duration::minutes(5);
        let second = controller
            .record(EventPayload::tool_use("Blade", None).unwrap(), Some(earlier))
            .await
            .unwrap();

        assert_eq!(second.timestamp, first.timestamp);
    }

    #[tokio::test]
    async fn test_unknown_kind_cannot_be_recorded() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);
        controller.start_session("doc-1", None).await.unwrap();

        let payload = EventPayload::Unknown {
            kind: "audio_mix".into(),
            payload: serde_json::Value::Null,
        };
        assert!(matches!(
            controller.record(payload, None).await,
            Err(TrackerError::InvalidPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_recovers_interrupted_session() {
        let dir = TempDir::new().unwrap();
        let config = TrackerConfig::with_data_path(dir.path().join("patterns.json"));

        {
            let controller = SessionController::open(&config).unwrap();
            controller.start_session("doc-1", None).await.unwrap();
            controller
                .record(
                    EventPayload::cut(CutType::Fade, Some(1.5), None).unwrap(),
                    None,
                )
                .await
                .unwrap();
            // dropped without stop_session or shutdown
        }

        let reopened = SessionController::open(&config).unwrap();
        let summaries = reopened.session_summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session.status, SessionStatus::Interrupted);
        assert_eq!(summaries[0].event_count, 1);
        assert!(!reopened.state().await.is_active());
    }

    #[tokio::test]
    async fn test_shutdown_completes_active_session() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);
        controller.start_session("doc-1", None).await.unwrap();

        let summary = controller.shutdown().await.unwrap().unwrap();
        assert_eq!(summary.session.status, SessionStatus::Completed);
        assert!(controller.shutdown().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flush_recovers_after_failed_write() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("patterns.json");
        let controller = SessionController::new(PatternStore::empty(&path));

        let err = controller.start_session("doc-1", None).await.unwrap_err();
        assert!(err.is_persistence());
        assert!(controller.needs_flush().await);
        assert!(controller.state().await.is_active());

        let recorded = controller
            .record(EventPayload::tool_use("Trim", None).unwrap(), None)
            .await;
        assert!(matches!(recorded, Err(TrackerError::PersistenceWrite { .. })));

        std::fs::remove_file(&blocker).unwrap();
        controller.flush().await.unwrap();
        assert!(!controller.needs_flush().await);

        let on_disk = PatternStore::load(&path).unwrap();
        assert_eq!(on_disk.sessions().len(), 1);
        assert_eq!(on_disk.events().len(), 1);
        assert!(on_disk.sessions()[0].is_open());
    }

    #[tokio::test]
    async fn test_current_insights_scope_follows_state() {
        let dir = TempDir::new().unwrap();
        let controller = controller_in(&dir);

        assert_eq!(controller.current_insights().await.scope, InsightScope::All);

        let session = controller.start_session("doc-1", None).await.unwrap();
        assert_eq!(
            controller.current_insights().await.scope,
            InsightScope::Session(session.id)
        );

        controller.stop_session().await.unwrap();
        assert_eq!(controller.current_insights().await.scope, InsightScope::All);
    }
}
