use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::insights::config::InsightConfig;
use crate::models::{CutType, Event, Session};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationBucket {
    pub lower_secs: f64,
    /// `None` for the open-ended last bucket.
    pub upper_secs: Option<f64>,
    pub count: usize,
}

impl DurationBucket {
    fn contains(&self, value: f64) -> bool {
        value >= self.lower_secs && self.upper_secs.map_or(true, |upper| value < upper)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutTypeCount {
    pub cut_type: CutType,
    pub count: usize,
}

/// Cut-length figures over the cuts in scope. Every field has a defined value
/// for an empty scope: zero counts, zero durations, no pace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutStatistics {
    /// Cuts with a recorded positive duration.
    pub count: usize,
    pub mean_duration: f64,
    pub median_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
    pub pace: Option<Pace>,
    pub distribution_buckets: Vec<DurationBucket>,
    /// Every cut in scope, with or without a duration.
    pub cut_type_preferences: Vec<CutTypeCount>,
}

impl CutStatistics {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolUsage {
    pub tool_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseCount {
    pub phase_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: String,
    pub to: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStatistics {
    pub total_sessions: usize,
    pub average_events_per_session: f64,
}

pub fn cut_statistics<'a>(events: impl IntoIterator<Item = &'a Event>) -> CutStatistics {
    cut_statistics_with(events, &InsightConfig::default())
}

pub fn cut_statistics_with<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    config: &InsightConfig,
) -> CutStatistics {
    let cuts: Vec<_> = events.into_iter().filter_map(Event::as_cut).collect();

    let mut durations: Vec<f64> = cuts
        .iter()
        .filter_map(|cut| cut.duration)
        .filter(|duration| *duration > 0.0)
        .collect();
    durations.sort_by(|a, b| a.total_cmp(b));

    let mut buckets = empty_buckets(&config.bucket_edges_secs);
    for duration in &durations {
        if let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.contains(*duration)) {
            bucket.count += 1;
        }
    }

    let cut_type_preferences = rank_by_first_seen(cuts.iter().map(|cut| cut.cut_type))
        .into_iter()
        .map(|(cut_type, count)| CutTypeCount { cut_type, count })
        .collect();

    if durations.is_empty() {
        return CutStatistics {
            count: 0,
            mean_duration: 0.0,
            median_duration: 0.0,
            min_duration: 0.0,
            max_duration: 0.0,
            std_dev: 0.0,
            coefficient_of_variation: 0.0,
            pace: None,
            distribution_buckets: buckets,
            cut_type_preferences,
        };
    }

    let count = durations.len();
    let mean = durations.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 1 {
        durations[count / 2]
    } else {
        (durations[count / 2 - 1] + durations[count / 2]) / 2.0
    };
    let variance = durations
        .iter()
        .map(|d| (d - mean).powi(2))
        .sum::<f64>()
        / count as f64;
    let std_dev = variance.sqrt();

    let pace = if mean < config.fast_pace_max_secs {
        Pace::Fast
    } else if mean < config.medium_pace_max_secs {
        Pace::Medium
    } else {
        Pace::Slow
    };

    CutStatistics {
        count,
        mean_duration: mean,
        median_duration: median,
        min_duration: durations[0],
        max_duration: durations[count - 1],
        std_dev,
        coefficient_of_variation: if mean > 0.0 { std_dev / mean } else { 0.0 },
        pace: Some(pace),
        distribution_buckets: buckets,
        cut_type_preferences,
    }
}

fn empty_buckets(edges: &[f64]) -> Vec<DurationBucket> {
    edges
        .iter()
        .enumerate()
        .map(|(i, lower)| DurationBucket {
            lower_secs: *lower,
            upper_secs: edges.get(i + 1).copied(),
            count: 0,
        })
        .collect()
}

/// Descending by count; equal counts keep first-seen order.
pub fn tool_usage_ranking<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<ToolUsage> {
    let names = events
        .into_iter()
        .filter_map(Event::as_tool_use)
        .map(|tool| tool.tool_name.as_str());

    rank_by_first_seen(names)
        .into_iter()
        .map(|(tool_name, count)| ToolUsage {
            tool_name: tool_name.to_string(),
            count,
        })
        .collect()
}

/// Workflow phases in timestamp order. Equal timestamps keep insertion order.
pub fn workflow_phase_sequence<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<String> {
    let mut steps: Vec<&Event> = events
        .into_iter()
        .filter(|event| event.as_workflow_step().is_some())
        .collect();
    steps.sort_by_key(|event| event.timestamp);

    steps
        .into_iter()
        .filter_map(Event::as_workflow_step)
        .map(|step| step.phase_name.clone())
        .collect()
}

pub fn workflow_phase_counts<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<PhaseCount> {
    let phases = events
        .into_iter()
        .filter_map(Event::as_workflow_step)
        .map(|step| step.phase_name.as_str());

    rank_by_first_seen(phases)
        .into_iter()
        .map(|(phase_name, count)| PhaseCount {
            phase_name: phase_name.to_string(),
            count,
        })
        .collect()
}

/// Most frequent adjacent phase change. Repeats of the same phase are not
/// transitions; ties go to the pair seen first.
pub fn dominant_transition(phases: &[String]) -> Option<PhaseTransition> {
    let pairs = phases
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .map(|pair| (pair[0].as_str(), pair[1].as_str()));

    rank_by_first_seen(pairs)
        .into_iter()
        .next()
        .map(|((from, to), count)| PhaseTransition {
            from: from.to_string(),
            to: to.to_string(),
            count,
        })
}

pub fn session_statistics<'a>(
    sessions: &[Session],
    events: impl IntoIterator<Item = &'a Event>,
) -> SessionStatistics {
    let total_sessions = sessions.len();
    let total_events = events.into_iter().count();

    SessionStatistics {
        total_sessions,
        average_events_per_session: if total_sessions > 0 {
            total_events as f64 / total_sessions as f64
        } else {
            0.0
        },
    }
}

pub(crate) fn rank_by_first_seen<K, I>(items: I) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();

    for item in items {
        match index.get(&item) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(item.clone(), counts.len());
                counts.push((item, 1));
            }
        }
    }

    // sort_by is stable, so first-seen order survives among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventPayload;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn cut(duration: f64) -> Event {
        Event::new(
            "s-1",
            Utc::now(),
            EventPayload::cut(CutType::HardCut, Some(duration), None).unwrap(),
        )
    }

    fn tool(name: &str) -> Event {
        Event::new("s-1", Utc::now(), EventPayload::tool_use(name, None).unwrap())
    }

    fn ranking(events: &[Event]) -> Vec<(String, usize)> {
        tool_usage_ranking(events)
            .into_iter()
            .map(|usage| (usage.tool_name, usage.count))
            .collect()
    }

    #[test]
    fn test_cut_statistics_empty_scope() {
        let events: Vec<Event> = Vec::new();
        let stats = cut_statistics(&events);

        assert!(stats.is_empty());
        assert_eq!(stats.mean_duration, 0.0);
        assert_eq!(stats.median_duration, 0.0);
        assert_eq!(stats.pace, None);
        assert_eq!(stats.distribution_buckets.len(), 5);
        assert!(stats.distribution_buckets.iter().all(|b| b.count == 0));
        assert!(stats.cut_type_preferences.is_empty());
    }

    #[test]
    fn test_cut_statistics_mean_median_buckets() {
        let events = vec![cut(2.0), cut(4.0), cut(6.0)];
        let stats = cut_statistics(&events);

        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_duration, 4.0);
        assert_eq!(stats.median_duration, 4.0);
        assert_eq!(stats.min_duration, 2.0);
        assert_eq!(stats.max_duration, 6.0);
        assert_eq!(stats.pace, Some(Pace::Medium));

        let counts: Vec<usize> = stats.distribution_buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 0, 1, 2, 0]);
    }

    #[test]
    fn test_median_of_even_count() {
        let events = vec![cut(1.0), cut(3.0), cut(5.0), cut(9.0)];
        assert_eq!(cut_statistics(&events).median_duration, 4.0);
    }

    #[test]
    fn test_cuts_without_duration_count_only_as_types() {
        let events = vec![
            Event::new(
                "s-1",
                Utc::now(),
                EventPayload::cut(CutType::Dissolve, None, Some("soften".into())).unwrap(),
            ),
            cut(3.0),
        ];
        let stats = cut_statistics(&events);

        assert_eq!(stats.count, 1);
        assert_eq!(
            stats.cut_type_preferences,
            vec![
                CutTypeCount { cut_type: CutType::Dissolve, count: 1 },
                CutTypeCount { cut_type: CutType::HardCut, count: 1 },
            ]
        );
    }

    #[test]
    fn test_tool_ranking_count_dominates() {
        let forward = vec![tool("A"), tool("A"), tool("B")];
        let reversed = vec![tool("B"), tool("A"), tool("A")];

        let expected = vec![("A".to_string(), 2), ("B".to_string(), 1)];
        assert_eq!(ranking(&forward), expected);
        assert_eq!(ranking(&reversed), expected);
    }

    #[test]
    fn test_tool_ranking_ties_keep_first_seen() {
        let events = vec![tool("Color"), tool("Trim"), tool("Blade"), tool("Trim"), tool("Blade")];
        assert_eq!(
            ranking(&events),
            vec![
                ("Trim".to_string(), 2),
                ("Blade".to_string(), 2),
                ("Color".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_tool_ranking_scenario() {
        let events = vec![tool("Trim"), tool("Trim"), tool("Color"), tool("Trim")];
        assert_eq!(
            ranking(&events),
            vec![("Trim".to_string(), 3), ("Color".to_string(), 1)]
        );
    }

    #[test]
    fn test_phase_sequence_orders_by_timestamp() {
        let now = Utc::now();
        let step = |name: &str, offset: i64| {
            Event::new(
                "s-1",
                now + Duration::seconds(offset),
                EventPayload::workflow_step(name, None).unwrap(),
            )
        };
        let events = vec![step("rough_cut", 5), step("import", 0), step("color", 9)];

        assert_eq!(
            workflow_phase_sequence(&events),
            vec!["import", "rough_cut", "color"]
        );
    }

    #[test]
    fn test_dominant_transition() {
        let phases: Vec<String> = ["import", "rough_cut", "import", "rough_cut", "color", "color"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let transition = dominant_transition(&phases).unwrap();
        assert_eq!(transition.from, "import");
        assert_eq!(transition.to, "rough_cut");
        assert_eq!(transition.count, 2);

        assert_eq!(dominant_transition(&phases[..1]), None);
        assert_eq!(dominant_transition(&[]), None);
    }

    #[test]
    fn test_session_statistics_empty() {
        let events: Vec<Event> = Vec::new();
        let stats = session_statistics(&[], &events);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.average_events_per_session, 0.0);
    }
}
