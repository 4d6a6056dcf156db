//! Suggestion rules.
//!
//! Each rule is a pure predicate over precomputed statistics. All rules run;
//! their output is concatenated in table order, most specific first.

use crate::insights::config::InsightConfig;
use crate::insights::statistics::{
    rank_by_first_seen, CutStatistics, Pace, ToolUsage,
};

pub const STILL_LEARNING: &str =
    "Continue with your normal workflow - still learning your editing patterns";

pub struct RuleInputs<'a> {
    pub cut_stats: &'a CutStatistics,
    /// Whole-scope ranking.
    pub tool_ranking: &'a [ToolUsage],
    /// Ranking over the trailing `recent_tool_window` tool uses.
    pub recent_tool_ranking: &'a [ToolUsage],
    pub phases: &'a [String],
    pub current_phase: Option<&'a str>,
    pub config: &'a InsightConfig,
}

type Rule = fn(&RuleInputs<'_>) -> Vec<String>;

const RULES: &[Rule] = &[
    next_phase,
    tool_drift,
    keyboard_shortcuts,
    pacing_variance,
    cut_length_style,
];

pub fn evaluate(inputs: &RuleInputs<'_>) -> Vec<String> {
    let suggestions: Vec<String> = RULES.iter().flat_map(|rule| rule(inputs)).collect();

    if suggestions.is_empty() {
        vec![STILL_LEARNING.to_string()]
    } else {
        suggestions
    }
}

fn next_phase(inputs: &RuleInputs<'_>) -> Vec<String> {
    let current = match inputs.current_phase.or_else(|| inputs.phases.last().map(String::as_str)) {
        Some(phase) => phase,
        None => return Vec::new(),
    };

    let followers = inputs
        .phases
        .windows(2)
        .filter(|pair| pair[0] == current && pair[1] != current)
        .map(|pair| pair[1].as_str());

    match rank_by_first_seen(followers).first() {
        Some((next, count)) => vec![format!(
            "After {current} you typically move to {next} next ({count} times so far)"
        )],
        None => Vec::new(),
    }
}

fn tool_drift(inputs: &RuleInputs<'_>) -> Vec<String> {
    match (inputs.recent_tool_ranking.first(), inputs.tool_ranking.first()) {
        (Some(recent), Some(overall)) if recent.tool_name != overall.tool_name => vec![format!(
            "You've been reaching for {} lately more than your usual {}; worth re-examining your muscle memory",
            recent.tool_name, overall.tool_name
        )],
        _ => Vec::new(),
    }
}

fn keyboard_shortcuts(inputs: &RuleInputs<'_>) -> Vec<String> {
    inputs
        .tool_ranking
        .iter()
        .filter(|usage| usage.count > inputs.config.frequent_tool_threshold)
        .map(|usage| {
            format!(
                "Consider learning the keyboard shortcut for {} (used {} times)",
                usage.tool_name, usage.count
            )
        })
        .collect()
}

fn pacing_variance(inputs: &RuleInputs<'_>) -> Vec<String> {
    let stats = inputs.cut_stats;
    if stats.count < inputs.config.pacing_min_cuts
        || stats.coefficient_of_variation <= inputs.config.pacing_cv_threshold
    {
        return Vec::new();
    }

    vec![format!(
        "Your cut lengths vary widely ({:.1}s to {:.1}s); review the pacing of this edit",
        stats.min_duration, stats.max_duration
    )]
}

fn cut_length_style(inputs: &RuleInputs<'_>) -> Vec<String> {
    let stats = inputs.cut_stats;
    let pace = match stats.pace {
        Some(pace) => pace,
        None => return Vec::new(),
    };
    let pace = match pace {
        Pace::Fast => "fast",
        Pace::Medium => "medium",
        Pace::Slow => "slow",
    };

    vec![format!(
        "Based on your style, consider {:.2}s cuts ({pace} pacing)",
        stats.mean_duration
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::statistics::cut_statistics;
    use crate::models::Event;

    fn usage(name: &str, count: usize) -> ToolUsage {
        ToolUsage {
            tool_name: name.to_string(),
            count,
        }
    }

    fn run(
        cut_stats: &CutStatistics,
        tools: &[ToolUsage],
        recent: &[ToolUsage],
        phases: &[String],
        current: Option<&str>,
    ) -> Vec<String> {
        let config = InsightConfig::default();
        evaluate(&RuleInputs {
            cut_stats,
            tool_ranking: tools,
            recent_tool_ranking: recent,
            phases,
            current_phase: current,
            config: &config,
        })
    }

    fn no_cuts() -> CutStatistics {
        let events: Vec<Event> = Vec::new();
        cut_statistics(&events)
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let suggestions = run(&no_cuts(), &[], &[], &[], None);
        assert_eq!(suggestions, vec![STILL_LEARNING.to_string()]);
    }

    #[test]
    fn test_next_phase_uses_caller_phase() {
        let phases: Vec<String> = ["import", "rough_cut", "color", "import", "rough_cut"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let suggestions = run(&no_cuts(), &[], &[], &phases, Some("import"));
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("move to rough_cut"));
    }

    #[test]
    fn test_tool_drift_detected() {
        let overall = vec![usage("Trim", 8), usage("Blade", 5)];
        let recent = vec![usage("Blade", 4), usage("Trim", 1)];

        let suggestions = run(&no_cuts(), &overall, &recent, &[], None);
        assert!(suggestions[0].contains("reaching for Blade"));
        assert!(suggestions[0].contains("usual Trim"));
    }

    #[test]
    fn test_shortcut_threshold_is_exclusive() {
        let tools = vec![usage("Trim", 11), usage("Blade", 10)];
        let suggestions = run(&no_cuts(), &tools, &tools, &[], None);

        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains("shortcut for Trim"));
    }

    #[test]
    fn test_specific_rules_come_first() {
        use crate::models::{CutType, EventPayload};
        use chrono::Utc;

        let events: Vec<Event> = [0.5, 1.0, 9.0]
            .iter()
            .map(|d| {
                Event::new(
                    "s-1",
                    Utc::now(),
                    EventPayload::cut(CutType::HardCut, Some(*d), None).unwrap(),
                )
            })
            .collect();
        let stats = cut_statistics(&events);
        let phases = vec!["import".to_string(), "rough_cut".to_string()];

        let suggestions = run(&stats, &[], &[], &phases, Some("import"));
        assert_eq!(suggestions.len(), 3);
        assert!(suggestions[0].contains("move to rough_cut"));
        assert!(suggestions[1].contains("vary widely"));
        assert!(suggestions[2].contains("consider 3.50s cuts"));
    }
}
