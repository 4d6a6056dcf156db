use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::insights::config::InsightConfig;
use crate::insights::rules::{self, RuleInputs};
use crate::insights::statistics::{
    cut_statistics_with, dominant_transition, session_statistics, tool_usage_ranking,
    workflow_phase_counts, workflow_phase_sequence, CutStatistics, PhaseCount, PhaseTransition,
    SessionStatistics, ToolUsage,
};
use crate::models::{Event, Session};

/// Which slice of the store a report covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InsightScope {
    All,
    Session(String),
    Since(DateTime<Utc>),
}

impl InsightScope {
    pub fn includes_event(&self, event: &Event) -> bool {
        match self {
            InsightScope::All => true,
            InsightScope::Session(id) => &event.session_id == id,
            InsightScope::Since(since) => event.timestamp >= *since,
        }
    }

    pub fn includes_session(&self, session: &Session) -> bool {
        match self {
            InsightScope::All => true,
            InsightScope::Session(id) => &session.id == id,
            InsightScope::Since(since) => session.ended_at.map_or(true, |ended| ended >= *since),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightReport {
    pub scope: InsightScope,
    pub generated_at: DateTime<Utc>,
    pub event_count: usize,
    pub session_statistics: SessionStatistics,
    pub cut_statistics: CutStatistics,
    pub tool_usage: Vec<ToolUsage>,
    pub workflow_phases: Vec<String>,
    pub workflow_phase_counts: Vec<PhaseCount>,
    pub dominant_transition: Option<PhaseTransition>,
    pub suggestions: Vec<String>,
}

impl InsightReport {
    /// Builds a report over the events and sessions selected by `scope`.
    pub fn build(
        scope: InsightScope,
        sessions: &[Session],
        events: &[Event],
        current_phase: Option<&str>,
        config: &InsightConfig,
    ) -> Self {
        let scoped: Vec<&Event> = events.iter().filter(|e| scope.includes_event(e)).collect();
        let scoped_sessions: Vec<Session> = sessions
            .iter()
            .filter(|s| scope.includes_session(s))
            .cloned()
            .collect();

        let cut_stats = cut_statistics_with(scoped.iter().copied(), config);
        let tool_ranking = tool_usage_ranking(scoped.iter().copied());
        let recent_tool_ranking = tool_usage_ranking(recent_tool_uses(&scoped, config.recent_tool_window));
        let phases = workflow_phase_sequence(scoped.iter().copied());

        let suggestions = rules::evaluate(&RuleInputs {
            cut_stats: &cut_stats,
            tool_ranking: &tool_ranking,
            recent_tool_ranking: &recent_tool_ranking,
            phases: &phases,
            current_phase,
            config,
        });

        Self {
            generated_at: Utc::now(),
            event_count: scoped.len(),
            session_statistics: session_statistics(&scoped_sessions, scoped.iter().copied()),
            workflow_phase_counts: workflow_phase_counts(scoped.iter().copied()),
            dominant_transition: dominant_transition(&phases),
            cut_statistics: cut_stats,
            tool_usage: tool_ranking,
            workflow_phases: phases,
            suggestions,
            scope,
        }
    }

    /// Flat name→value view of the headline figures.
    pub fn named_statistics(&self) -> BTreeMap<String, Value> {
        let cuts = &self.cut_statistics;
        let mut stats = BTreeMap::new();

        stats.insert("total_events".into(), json!(self.event_count));
        stats.insert("total_sessions".into(), json!(self.session_statistics.total_sessions));
        stats.insert(
            "average_events_per_session".into(),
            json!(self.session_statistics.average_events_per_session),
        );
        stats.insert("cut_count".into(), json!(cuts.count));
        stats.insert("mean_cut_duration".into(), json!(cuts.mean_duration));
        stats.insert("median_cut_duration".into(), json!(cuts.median_duration));
        stats.insert("cut_pace".into(), json!(cuts.pace));
        stats.insert(
            "top_tool".into(),
            json!(self.tool_usage.first().map(|usage| usage.tool_name.clone())),
        );
        stats.insert(
            "top_tool_count".into(),
            json!(self.tool_usage.first().map_or(0, |usage| usage.count)),
        );
        stats.insert(
            "dominant_transition".into(),
            json!(self
                .dominant_transition
                .as_ref()
                .map(|t| format!("{} -> {}", t.from, t.to))),
        );
        stats
    }
}

fn recent_tool_uses<'a>(
    scoped: &[&'a Event],
    window: usize,
) -> impl Iterator<Item = &'a Event> + 'a {
    let tool_events: Vec<&'a Event> = scoped
        .iter()
        .copied()
        .filter(|event| event.as_tool_use().is_some())
        .collect();
    let skip = tool_events.len().saturating_sub(window);
    tool_events.into_iter().skip(skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CutType, EventPayload};
    use chrono::Duration;

    fn events_for(session_id: &str, durations: &[f64]) -> Vec<Event> {
        durations
            .iter()
            .map(|d| {
                Event::new(
                    session_id,
                    Utc::now(),
                    EventPayload::cut(CutType::HardCut, Some(*d), None).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_session_scope_filters_events() {
        let mut events = events_for("a", &[2.0, 4.0]);
        events.extend(events_for("b", &[10.0]));

        let report = InsightReport::build(
            InsightScope::Session("a".into()),
            &[],
            &events,
            None,
            &InsightConfig::default(),
        );
        assert_eq!(report.event_count, 2);
        assert_eq!(report.cut_statistics.mean_duration, 3.0);
    }

    #[test]
    fn test_since_scope_drops_older_events() {
        let now = Utc::now();
        let old = Event::new(
            "a",
            now - Duration::hours(2),
            EventPayload::tool_use("Blade", None).unwrap(),
        );
        let fresh = Event::new("a", now, EventPayload::tool_use("Trim", None).unwrap());

        let report = InsightReport::build(
            InsightScope::Since(now - Duration::minutes(30)),
            &[],
            &[old, fresh],
            None,
            &InsightConfig::default(),
        );
        assert_eq!(report.tool_usage.len(), 1);
        assert_eq!(report.tool_usage[0].tool_name, "Trim");
    }

    #[test]
    fn test_recent_window_feeds_drift_rule() {
        let mut events = Vec::new();
        for _ in 0..6 {
            events.push(Event::new("a", Utc::now(), EventPayload::tool_use("Trim", None).unwrap()));
        }
        for _ in 0..4 {
            events.push(Event::new("a", Utc::now(), EventPayload::tool_use("Blade", None).unwrap()));
        }

        let config = InsightConfig {
            recent_tool_window: 4,
            ..InsightConfig::default()
        };
        let report = InsightReport::build(InsightScope::All, &[], &events, None, &config);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("reaching for Blade")));
    }

    #[test]
    fn test_named_statistics_on_empty_store() {
        let report =
            InsightReport::build(InsightScope::All, &[], &[], None, &InsightConfig::default());
        let stats = report.named_statistics();

        assert_eq!(stats["total_events"], json!(0));
        assert_eq!(stats["mean_cut_duration"], json!(0.0));
        assert_eq!(stats["top_tool"], Value::Null);
        assert_eq!(report.suggestions, vec![rules::STILL_LEARNING.to_string()]);
    }
}
