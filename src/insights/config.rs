/// Tunable thresholds for statistics and suggestion rules.
#[derive(Debug, Clone)]
pub struct InsightConfig {
    /// Lower edges (seconds) of the cut-length distribution buckets; the last
    /// bucket is open-ended.
    pub bucket_edges_secs: Vec<f64>,

    /// Number of most recent tool uses compared against the historical ranking
    pub recent_tool_window: usize,

    /// Pacing rule: coefficient of variation above this is "high variance"
    pub pacing_cv_threshold: f64,
    pub pacing_min_cuts: usize,

    /// Shortcut rule: tools used more often than this get a shortcut hint
    pub frequent_tool_threshold: usize,

    /// Mean cut length (seconds) below which pacing is fast / medium
    pub fast_pace_max_secs: f64,
    pub medium_pace_max_secs: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            bucket_edges_secs: vec![0.0, 1.0, 2.0, 4.0, 8.0],
            recent_tool_window: 10,
            pacing_cv_threshold: 0.5,
            pacing_min_cuts: 3,
            frequent_tool_threshold: 10,
            fast_pace_max_secs: 2.0,
            medium_pace_max_secs: 6.0,
        }
    }
}
