use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    ingest::IngestHandle,
    insights::InsightScope,
    models::{CutType, EventPayload, ResolvePage, TimelineSnapshotPayload},
    tracker::SessionController,
};

/// A named tool invocation with JSON arguments.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Structured outcome handed back to the host. Failures are results too.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolResult {
    pub is_error: bool,
    pub content: Value,
}

impl ToolResult {
    pub(crate) fn ok(content: Value) -> Self {
        Self {
            is_error: false,
            content,
        }
    }

    pub(crate) fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: json!({ "error": message.into() }),
        }
    }
}

#[derive(Deserialize)]
struct StartSessionArgs {
    project_path: String,
    project_name: Option<String>,
}

#[derive(Deserialize)]
struct TrackCutArgs {
    cut_type: CutType,
    duration: Option<f64>,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct TrackToolUsageArgs {
    tool_name: String,
    page: Option<ResolvePage>,
}

#[derive(Deserialize)]
struct TrackWorkflowStepArgs {
    step: String,
    duration_minutes: Option<f64>,
}

#[derive(Deserialize)]
struct TrackTimelineSnapshotArgs {
    timeline_name: String,
    track_count: Option<u32>,
    clip_count: Option<u32>,
    /// Seconds.
    duration: Option<f64>,
}

#[derive(Deserialize, Default)]
struct InsightArgs {
    session_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct SuggestArgs {
    current_step: Option<String>,
}

pub const TOOL_NAMES: &[&str] = &[
    "start_learning_session",
    "stop_learning_session",
    "track_cut",
    "track_tool_usage",
    "track_workflow_step",
    "track_timeline_snapshot",
    "get_editing_insights",
    "suggest_next_action",
];

/// Maps tool calls onto the controller. Event-recording tools go through the
/// ingest queue so they share ordering with watcher-originated events.
#[derive(Clone)]
pub struct ToolRouter {
    controller: SessionController,
    ingest: IngestHandle,
}

impl ToolRouter {
    pub fn new(controller: SessionController, ingest: IngestHandle) -> Self {
        Self { controller, ingest }
    }

    pub async fn dispatch(&self, call: ToolCall) -> ToolResult {
        let arguments = call.arguments;
        let result = match call.name.as_str() {
            "start_learning_session" => self.start_learning_session(arguments).await,
            "stop_learning_session" => self.stop_learning_session().await,
            "track_cut" => self.track_cut(arguments).await,
            "track_tool_usage" => self.track_tool_usage(arguments).await,
            "track_workflow_step" => self.track_workflow_step(arguments).await,
            "track_timeline_snapshot" => self.track_timeline_snapshot(arguments).await,
            "get_editing_insights" => self.get_editing_insights(arguments).await,
            "suggest_next_action" => self.suggest_next_action(arguments).await,
            other => Err(format!("Unknown tool: {other}")),
        };

        match result {
            Ok(content) => ToolResult::ok(content),
            Err(message) => ToolResult::error(message),
        }
    }

    async fn start_learning_session(&self, arguments: Value) -> Result<Value, String> {
        let args: StartSessionArgs = parse_args(arguments)?;
        let label = args.project_name.unwrap_or_else(|| {
            Path::new(&args.project_path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| args.project_path.clone())
        });

        let session = self
            .controller
            .start_session(label, Some(args.project_path))
            .await
            .map_err(|e| e.to_string())?;

        Ok(json!({
            "message": format!(
                "Started learning session {} for '{}'",
                session.id, session.project_label
            ),
            "session": session,
        }))
    }

    async fn stop_learning_session(&self) -> Result<Value, String> {
        let summary = self
            .controller
            .stop_session()
            .await
            .map_err(|e| e.to_string())?;
        let report = self
            .controller
            .insights(InsightScope::Session(summary.session.id.clone()), None)
            .await;

        Ok(json!({
            "message": format!(
                "Stopped learning session for '{}' ({} events)",
                summary.session.project_label, summary.event_count
            ),
            "summary": summary,
            "insights": report,
        }))
    }

    async fn track_cut(&self, arguments: Value) -> Result<Value, String> {
        let args: TrackCutArgs = parse_args(arguments)?;
        let payload = EventPayload::cut(args.cut_type, args.duration, args.reason)
            .map_err(|e| e.to_string())?;
        self.submit(payload, format!("Tracked {} cut", args.cut_type.as_str()))
            .await
    }

    async fn track_tool_usage(&self, arguments: Value) -> Result<Value, String> {
        let args: TrackToolUsageArgs = parse_args(arguments)?;
        let message = match args.page {
            Some(page) => format!("Tracked usage of {} in {} page", args.tool_name, page.as_str()),
            None => format!("Tracked usage of {}", args.tool_name),
        };
        let payload =
            EventPayload::tool_use(args.tool_name, args.page).map_err(|e| e.to_string())?;
        self.submit(payload, message).await
    }

    async fn track_workflow_step(&self, arguments: Value) -> Result<Value, String> {
        let args: TrackWorkflowStepArgs = parse_args(arguments)?;
        let message = format!("Tracked {} workflow step", args.step);
        let payload = EventPayload::workflow_step(args.step, args.duration_minutes)
            .map_err(|e| e.to_string())?;
        self.submit(payload, message).await
    }

    async fn track_timeline_snapshot(&self, arguments: Value) -> Result<Value, String> {
        let args: TrackTimelineSnapshotArgs = parse_args(arguments)?;
        let message = format!("Tracked snapshot of timeline {}", args.timeline_name);
        let payload = EventPayload::timeline_snapshot(TimelineSnapshotPayload {
            label: args.timeline_name,
            track_count: args.track_count,
            clip_count: args.clip_count,
            duration: args.duration,
            size_bytes: None,
        })
        .map_err(|e| e.to_string())?;
        self.submit(payload, message).await
    }

    async fn get_editing_insights(&self, arguments: Value) -> Result<Value, String> {
        let args: InsightArgs = parse_args(arguments)?;
        let report = match args.session_id {
            Some(id) => {
                self.controller
                    .insights(InsightScope::Session(id), None)
                    .await
            }
            None => self.controller.current_insights().await,
        };

        Ok(json!({
            "statistics": report.named_statistics(),
            "report": report,
        }))
    }

    async fn suggest_next_action(&self, arguments: Value) -> Result<Value, String> {
        let args: SuggestArgs = parse_args(arguments)?;
        let report = self
            .controller
            .insights(InsightScope::All, args.current_step.as_deref())
            .await;

        Ok(json!({
            "current_step": args.current_step,
            "suggestions": report.suggestions,
        }))
    }

    async fn submit(&self, payload: EventPayload, message: String) -> Result<Value, String> {
        let event = self
            .ingest
            .submit(payload, None)
            .await
            .map_err(|e| e.to_string())?;
        Ok(json!({ "message": message, "event": event }))
    }
}

/// Missing or `null` arguments are treated as an empty object.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, String> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {e}"))
}
