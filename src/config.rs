use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};

use crate::insights::InsightConfig;

pub const DATA_PATH_ENV: &str = "EDITING_TRACKER_DATA";
pub const DEBUG_ENV: &str = "EDITING_TRACKER_DEBUG";
pub const WATCH_DEBOUNCE_ENV: &str = "EDITING_TRACKER_WATCH_DEBOUNCE_MS";

const DEFAULT_FILE_NAME: &str = "editing_patterns.json";
const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub data_path: PathBuf,
    pub debug: bool,
    pub watch_debounce: Duration,
    pub insights: InsightConfig,
}

impl TrackerConfig {
    pub fn with_data_path(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            debug: false,
            watch_debounce: Duration::from_millis(DEFAULT_WATCH_DEBOUNCE_MS),
            insights: InsightConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_path = lookup(DATA_PATH_ENV)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_path);

        let debug = lookup(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let debounce_ms = match lookup(WATCH_DEBOUNCE_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{WATCH_DEBOUNCE_ENV} must be milliseconds, got {raw:?}"))?,
            None => DEFAULT_WATCH_DEBOUNCE_MS,
        };

        Ok(Self {
            debug,
            watch_debounce: Duration::from_millis(debounce_ms),
            ..Self::with_data_path(data_path)
        })
    }
}

/// `<data dir>/editing-tracker/editing_patterns.json`, or the bare file name
/// in the working directory when the platform has no data dir.
pub fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("editing-tracker").join(DEFAULT_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME))
}
