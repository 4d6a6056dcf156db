pub mod event;
pub mod session;

pub use event::{
    CutPayload, CutType, Event, EventKind, EventPayload, ResolvePage, TimelineSnapshotPayload,
    ToolUsePayload, WorkflowStepPayload,
};
pub use session::{Session, SessionStatus, SessionSummary};
