//! Observed editing actions.
//!
//! Every event carries exactly the payload defined for its kind. Payloads are
//! checked when constructed and again when a persisted document is read back.
//! Kinds this build does not know about are kept verbatim as
//! [`EventPayload::Unknown`] so newer documents survive a round trip through
//! an older tracker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Cut,
    ToolUse,
    WorkflowStep,
    TimelineSnapshot,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Cut => "cut",
            EventKind::ToolUse => "tool_use",
            EventKind::WorkflowStep => "workflow_step",
            EventKind::TimelineSnapshot => "timeline_snapshot",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cut" => Some(EventKind::Cut),
            "tool_use" => Some(EventKind::ToolUse),
            "workflow_step" => Some(EventKind::WorkflowStep),
            "timeline_snapshot" => Some(EventKind::TimelineSnapshot),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CutType {
    #[default]
    HardCut,
    Fade,
    Dissolve,
    JumpCut,
}

impl CutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CutType::HardCut => "hard_cut",
            CutType::Fade => "fade",
            CutType::Dissolve => "dissolve",
            CutType::JumpCut => "jump_cut",
        }
    }
}

/// Resolve page a tool was used on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResolvePage {
    Media,
    Cut,
    Edit,
    Fusion,
    Color,
    Fairlight,
    Deliver,
}

impl ResolvePage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvePage::Media => "media",
            ResolvePage::Cut => "cut",
            ResolvePage::Edit => "edit",
            ResolvePage::Fusion => "fusion",
            ResolvePage::Color => "color",
            ResolvePage::Fairlight => "fairlight",
            ResolvePage::Deliver => "deliver",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CutPayload {
    #[serde(default)]
    pub cut_type: CutType,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolUsePayload {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<ResolvePage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkflowStepPayload {
    pub phase_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TimelineSnapshotPayload {
    /// Timeline name, or the project file path for file-save snapshots.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_count: Option<u32>,
    /// Seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Cut(CutPayload),
    ToolUse(ToolUsePayload),
    WorkflowStep(WorkflowStepPayload),
    TimelineSnapshot(TimelineSnapshotPayload),
    /// A kind written by a newer tracker. Preserved, never counted.
    Unknown { kind: String, payload: Value },
}

impl EventPayload {
    pub fn cut(cut_type: CutType, duration: Option<f64>, reasoning: Option<String>) -> Result<Self> {
        let payload = EventPayload::Cut(CutPayload {
            cut_type,
            duration,
            reasoning,
        });
        payload.validate()?;
        Ok(payload)
    }

    pub fn tool_use(tool_name: impl Into<String>, page: Option<ResolvePage>) -> Result<Self> {
        let payload = EventPayload::ToolUse(ToolUsePayload {
            tool_name: tool_name.into(),
            page,
        });
        payload.validate()?;
        Ok(payload)
    }

    pub fn workflow_step(
        phase_name: impl Into<String>,
        duration_minutes: Option<f64>,
    ) -> Result<Self> {
        let payload = EventPayload::WorkflowStep(WorkflowStepPayload {
            phase_name: phase_name.into(),
            duration_minutes,
        });
        payload.validate()?;
        Ok(payload)
    }

    pub fn timeline_snapshot(snapshot: TimelineSnapshotPayload) -> Result<Self> {
        let payload = EventPayload::TimelineSnapshot(snapshot);
        payload.validate()?;
        Ok(payload)
    }

    pub fn kind(&self) -> Option<EventKind> {
        match self {
            EventPayload::Cut(_) => Some(EventKind::Cut),
            EventPayload::ToolUse(_) => Some(EventKind::ToolUse),
            EventPayload::WorkflowStep(_) => Some(EventKind::WorkflowStep),
            EventPayload::TimelineSnapshot(_) => Some(EventKind::TimelineSnapshot),
            EventPayload::Unknown { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            EventPayload::Unknown { kind, .. } => kind.as_str(),
            other => other.kind().map(|kind| kind.as_str()).unwrap_or("unknown"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            EventPayload::Cut(cut) => {
                check_seconds("cut", "duration", cut.duration)?;
            }
            EventPayload::ToolUse(tool) => {
                if tool.tool_name.trim().is_empty() {
                    return Err(TrackerError::invalid("tool_use", "tool_name must not be blank"));
                }
            }
            EventPayload::WorkflowStep(step) => {
                if step.phase_name.trim().is_empty() {
                    return Err(TrackerError::invalid(
                        "workflow_step",
                        "phase_name must not be blank",
                    ));
                }
                check_seconds("workflow_step", "duration_minutes", step.duration_minutes)?;
            }
            EventPayload::TimelineSnapshot(snapshot) => {
                if snapshot.label.trim().is_empty() {
                    return Err(TrackerError::invalid(
                        "timeline_snapshot",
                        "label must not be blank",
                    ));
                }
                check_seconds("timeline_snapshot", "duration", snapshot.duration)?;
            }
            EventPayload::Unknown { .. } => {}
        }
        Ok(())
    }

    fn to_value(&self) -> Value {
        // Payload structs hold only strings, numbers and enums.
        let encoded = match self {
            EventPayload::Cut(cut) => serde_json::to_value(cut),
            EventPayload::ToolUse(tool) => serde_json::to_value(tool),
            EventPayload::WorkflowStep(step) => serde_json::to_value(step),
            EventPayload::TimelineSnapshot(snapshot) => serde_json::to_value(snapshot),
            EventPayload::Unknown { payload, .. } => Ok(payload.clone()),
        };
        encoded.unwrap_or(Value::Null)
    }

    fn from_parts(kind: &str, payload: Value) -> Result<Self> {
        let decoded = match EventKind::parse(kind) {
            Some(EventKind::Cut) => EventPayload::Cut(decode(EventKind::Cut, payload)?),
            Some(EventKind::ToolUse) => EventPayload::ToolUse(decode(EventKind::ToolUse, payload)?),
            Some(EventKind::WorkflowStep) => {
                EventPayload::WorkflowStep(decode(EventKind::WorkflowStep, payload)?)
            }
            Some(EventKind::TimelineSnapshot) => {
                EventPayload::TimelineSnapshot(decode(EventKind::TimelineSnapshot, payload)?)
            }
            None => EventPayload::Unknown {
                kind: kind.to_string(),
                payload,
            },
        };
        decoded.validate()?;
        Ok(decoded)
    }
}

fn decode<T: DeserializeOwned>(kind: EventKind, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|err| TrackerError::invalid(kind.as_str(), err.to_string()))
}

fn check_seconds(kind: &'static str, field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(TrackerError::invalid(
            kind,
            format!("{field} must be a finite, non-negative number (got {v})"),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct Event {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(session_id: impl Into<String>, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            timestamp,
            payload,
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.payload.kind()
    }

    pub fn as_cut(&self) -> Option<&CutPayload> {
        match &self.payload {
            EventPayload::Cut(cut) => Some(cut),
            _ => None,
        }
    }

    pub fn as_tool_use(&self) -> Option<&ToolUsePayload> {
        match &self.payload {
            EventPayload::ToolUse(tool) => Some(tool),
            _ => None,
        }
    }

    pub fn as_workflow_step(&self) -> Option<&WorkflowStepPayload> {
        match &self.payload {
            EventPayload::WorkflowStep(step) => Some(step),
            _ => None,
        }
    }
}

/// On-disk shape: `{ id, session_id, timestamp, kind, payload }`.
#[derive(Serialize, Deserialize)]
struct RawEvent {
    id: String,
    session_id: String,
    timestamp: DateTime<Utc>,
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawEvent> for Event {
    type Error = TrackerError;

    fn try_from(raw: RawEvent) -> Result<Self> {
        Ok(Event {
            payload: EventPayload::from_parts(&raw.kind, raw.payload)?,
            id: raw.id,
            session_id: raw.session_id,
            timestamp: raw.timestamp,
        })
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        RawEvent {
            kind: event.payload.kind_name().to_string(),
            payload: event.payload.to_value(),
            id: event.id,
            session_id: event.session_id,
            timestamp: event.timestamp,
        }
    }
}
