//! Read-only analysis over recorded events.
//!
//! Nothing here mutates the store and nothing here fails: every aggregate has
//! a defined value for an empty scope.

pub mod config;
pub mod report;
pub mod rules;
pub mod statistics;

pub use config::InsightConfig;
pub use report::{InsightReport, InsightScope};
pub use statistics::{
    cut_statistics, cut_statistics_with, dominant_transition, session_statistics,
    tool_usage_ranking, workflow_phase_counts, workflow_phase_sequence, CutStatistics,
    DurationBucket, Pace, PhaseCount, PhaseTransition, SessionStatistics, ToolUsage,
};

use crate::models::Event;

/// Ranked suggestions using the last recorded workflow phase as "current".
pub fn suggest_next_action(events: &[Event]) -> Vec<String> {
    suggest_next_action_with(events, None, &InsightConfig::default())
}

pub fn suggest_next_action_with(
    events: &[Event],
    current_phase: Option<&str>,
    config: &InsightConfig,
) -> Vec<String> {
    InsightReport::build(InsightScope::All, &[], events, current_phase, config).suggestions
}
