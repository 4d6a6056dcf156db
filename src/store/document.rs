use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::insights::{InsightConfig, InsightReport, InsightScope};
use crate::models::{Event, Session};

/// The whole persisted store: `{ sessions, events, cached_stats }`.
///
/// `sessions` and `events` are required; a document missing either is
/// treated as corrupt. `cached_stats` is derived and always recomputed after
/// loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatternDocument {
    pub sessions: Vec<Session>,
    pub events: Vec<Event>,
    #[serde(default)]
    pub cached_stats: BTreeMap<String, Value>,
}

impl PatternDocument {
    pub fn refresh_cached_stats(&mut self) {
        self.cached_stats = InsightReport::build(
            InsightScope::All,
            &self.sessions,
            &self.events,
            None,
            &InsightConfig::default(),
        )
        .named_statistics();
    }

    pub fn events_for_session<'a, 'b>(
        &'a self,
        session_id: &'b str,
    ) -> impl Iterator<Item = &'a Event> + 'b
    where
        'a: 'b,
    {
        self.events
            .iter()
            .filter(move |event| event.session_id == session_id)
    }
}
