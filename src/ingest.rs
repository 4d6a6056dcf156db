//! Serialized inbound queue.
//!
//! Tool handlers and the project-file watcher submit events here instead of
//! calling the controller directly. A single worker task drains the queue in
//! arrival order and answers each submission over its own oneshot channel.

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Result, TrackerError},
    models::{Event, EventPayload},
    tracker::SessionController,
};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

struct IngestRequest {
    payload: EventPayload,
    timestamp: Option<DateTime<Utc>>,
    reply: oneshot::Sender<Result<Event>>,
}

#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestRequest>,
}

impl IngestHandle {
    pub async fn submit(
        &self,
        payload: EventPayload,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Event> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(IngestRequest {
                payload,
                timestamp,
                reply,
            })
            .await
            .map_err(|_| TrackerError::IngestClosed)?;

        response.await.map_err(|_| TrackerError::IngestClosed)?
    }
}

pub struct IngestWorker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl IngestWorker {
    /// Stops accepting new submissions, records whatever is already queued,
    /// then waits for the worker to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        if let Err(err) = self.handle.await {
            log_error!("Ingest worker failed to join: {err}");
        }
    }
}

pub fn spawn(controller: SessionController) -> (IngestHandle, IngestWorker) {
    spawn_with_capacity(controller, DEFAULT_QUEUE_CAPACITY)
}

pub fn spawn_with_capacity(
    controller: SessionController,
    capacity: usize,
) -> (IngestHandle, IngestWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let cancel_token = CancellationToken::new();

    let handle = tokio::spawn(ingest_loop(controller, receiver, cancel_token.clone()));

    (
        IngestHandle { sender },
        IngestWorker {
            handle,
            cancel_token,
        },
    )
}

async fn ingest_loop(
    controller: SessionController,
    mut receiver: mpsc::Receiver<IngestRequest>,
    cancel_token: CancellationToken,
) {
    log_info!("Ingest worker started");

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            request = receiver.recv() => match request {
                Some(request) => handle_request(&controller, request).await,
                None => break,
            },
        }
    }

    // Drain: nothing already accepted is dropped.
    receiver.close();
    while let Ok(request) = receiver.try_recv() {
        handle_request(&controller, request).await;
    }

    log_info!("Ingest worker stopped");
}

async fn handle_request(controller: &SessionController, request: IngestRequest) {
    let result = controller.record(request.payload, request.timestamp).await;
    // The submitter may have given up waiting; the event is recorded either way.
    let _ = request.reply.send(result);
}
