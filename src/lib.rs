//! Editing-behavior tracking for video-editing assistants.
//!
//! Sessions and editing events are recorded through [`SessionController`],
//! persisted by [`PatternStore`] as a single JSON document, and analysed by
//! the pure functions in [`insights`].

pub mod config;
pub mod driver;
pub mod error;
pub mod ingest;
pub mod insights;
pub mod models;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod watcher;

pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use insights::{InsightConfig, InsightReport, InsightScope};
pub use models::{Event, EventKind, EventPayload, Session, SessionStatus, SessionSummary};
pub use store::{PatternDocument, PatternStore};
pub use tracker::{SessionController, ToolCall, ToolResult, ToolRouter};

use tokio::io::BufReader;

use driver::Driver;
use watcher::ProjectChangeFilter;

const ENABLE_LOGS: bool = true;

/// Development driver over stdin/stdout. Runs until stdin closes, then
/// drains the ingest queue and shuts the controller down. Shutdown also runs
/// when the streams fail.
pub async fn run() -> anyhow::Result<()> {
    let config = TrackerConfig::from_env()?;
    utils::logging::init(config.debug);

    log_info!("editing-tracker starting, data at {}", config.data_path.display());

    let open_config = config.clone();
    let controller =
        tokio::task::spawn_blocking(move || SessionController::open(&open_config)).await??;
    for warning in controller.startup_warnings() {
        log_warn!("{warning}");
    }

    let (ingest, worker) = ingest::spawn(controller.clone());
    let mut driver = Driver::new(
        ToolRouter::new(controller.clone(), ingest.clone()),
        ingest,
        ProjectChangeFilter::new(config.watch_debounce),
    );
    log_info!("Accepting tools: {}", tracker::TOOL_NAMES.join(", "));

    let served = driver
        .serve(BufReader::new(tokio::io::stdin()), &mut tokio::io::stdout())
        .await;
    if let Err(err) = &served {
        log_error!("Driver stopped: {err}");
    }

    worker.shutdown().await;
    match controller.shutdown().await {
        Ok(Some(summary)) => log_info!(
            "Closed session {} on exit ({} events)",
            summary.session.id,
            summary.event_count
        ),
        Ok(None) => {}
        Err(err) => {
            log_error!("Final flush failed: {err}");
            return Err(err.into());
        }
    }

    served?;
    Ok(())
}
