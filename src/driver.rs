//! Line-oriented development driver: one JSON tool call in, one JSON result
//! out. Any line that is not a usable call, including non-UTF-8 input, is
//! answered with an error result; only IO failure on the streams ends it.

use std::{io, path::PathBuf};

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    ingest::IngestHandle,
    tracker::{ToolCall, ToolResult, ToolRouter},
    watcher::{FileChange, ProjectChangeFilter},
};

/// Call name routed to the project-file filter instead of the tool router.
pub const FILE_CHANGED_CALL: &str = "project_file_changed";

#[derive(Deserialize)]
struct FileChangedArgs {
    path: PathBuf,
    size_bytes: Option<u64>,
}

pub struct Driver {
    router: ToolRouter,
    ingest: IngestHandle,
    change_filter: ProjectChangeFilter,
}

impl Driver {
    pub fn new(router: ToolRouter, ingest: IngestHandle, change_filter: ProjectChangeFilter) -> Self {
        Self {
            router,
            ingest,
            change_filter,
        }
    }

    /// Serves calls from `input` until EOF.
    pub async fn serve<R, W>(&mut self, mut input: R, output: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = Vec::new();
        loop {
            line.clear();
            if input.read_until(b'\n', &mut line).await? == 0 {
                return Ok(());
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let result = self.handle_line(&line).await;
            let mut encoded = serde_json::to_vec(&result)?;
            encoded.push(b'\n');
            output.write_all(&encoded).await?;
            output.flush().await?;
        }
    }

    pub async fn handle_line(&mut self, line: &[u8]) -> ToolResult {
        match serde_json::from_slice::<ToolCall>(line) {
            Ok(call) if call.name == FILE_CHANGED_CALL => self.file_changed(call).await,
            Ok(call) => self.router.dispatch(call).await,
            Err(err) => ToolResult::error(format!("Malformed tool call: {err}")),
        }
    }

    async fn file_changed(&mut self, call: ToolCall) -> ToolResult {
        let args: FileChangedArgs = match serde_json::from_value(call.arguments) {
            Ok(args) => args,
            Err(err) => return ToolResult::error(format!("Invalid arguments: {err}")),
        };

        let change = FileChange::modified(args.path, args.size_bytes);
        match self.change_filter.forward(&change, &self.ingest).await {
            None => ToolResult::ok(json!({ "recorded": false })),
            Some(Ok(event)) => ToolResult::ok(json!({ "recorded": true, "event": event })),
            Some(Err(err)) => ToolResult::error(err.to_string()),
        }
    }
}
