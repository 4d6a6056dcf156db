pub mod commands;
pub mod controller;
pub mod state;

pub use commands::{ToolCall, ToolResult, ToolRouter, TOOL_NAMES};
pub use controller::SessionController;
pub use state::{TrackerState, TrackerStatus};
