//! Message RPC between the host and a worker.
//!
//! Every call carries its own one-shot reply port. A call that gets no reply
//! within the channel's timeout fails with `CONTROL_TIMEOUT`.

use std::time::Duration;

use offgrid_core::{CacheDb, ControlMessage, ControlReply, Error, Generation};
use tokio::sync::{mpsc, oneshot, watch};

use crate::worker::WorkerEvent;

pub(crate) struct ControlEnvelope {
    pub message: ControlMessage,
    pub reply: Option<oneshot::Sender<ControlReply>>,
}

#[derive(Clone)]
pub struct ControlChannel {
    events: mpsc::Sender<WorkerEvent>,
    timeout: Duration,
}

impl ControlChannel {
    pub(crate) fn new(events: mpsc::Sender<WorkerEvent>, timeout: Duration) -> Self {
        Self { events, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a message without a reply port.
    pub async fn post(&self, message: ControlMessage) -> Result<(), Error> {
        let envelope = ControlEnvelope { message, reply: None };
        tokio::time::timeout(self.timeout, self.events.send(WorkerEvent::Control(envelope)))
            .await
            .map_err(|_| Error::ControlTimeout(self.timeout))?
            .map_err(|_| Error::WorkerTerminated(format!("{message:?} not delivered")))
    }

    /// Send a message and wait for the worker's reply.
    pub async fn request(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        let (tx, rx) = oneshot::channel();
        let envelope = ControlEnvelope { message, reply: Some(tx) };

        let call = async {
            self.events
                .send(WorkerEvent::Control(envelope))
                .await
                .map_err(|_| Error::WorkerTerminated(format!("{message:?} not delivered")))?;
            rx.await
                .map_err(|_| Error::ControlClosed(format!("{message:?} port closed without a reply")))
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| Error::ControlTimeout(self.timeout))?
    }

    pub async fn skip_waiting(&self) -> Result<(), Error> {
        self.post(ControlMessage::SkipWaiting).await
    }

    pub async fn get_version(&self) -> Result<String, Error> {
        match self.request(ControlMessage::GetVersion).await? {
            ControlReply::Version { version } => Ok(version),
            other => Err(Error::ControlFailed(format!("unexpected reply to GET_VERSION: {other:?}"))),
        }
    }

    pub async fn clear_cache(&self) -> Result<(), Error> {
        match self.request(ControlMessage::ClearCache).await? {
            ControlReply::Outcome { success: true, .. } => Ok(()),
            ControlReply::Outcome { success: false, error } => {
                Err(Error::ControlFailed(error.unwrap_or_else(|| "cache clear failed".into())))
            }
            other => Err(Error::ControlFailed(format!("unexpected reply to CLEAR_CACHE: {other:?}"))),
        }
    }
}

/// Worker side of a control message. Returns the reply to send, if any.
pub(crate) async fn dispatch(
    message: ControlMessage, cache: &CacheDb, generation: &Generation, skip_waiting: &watch::Sender<bool>,
) -> Option<ControlReply> {
    match message {
        ControlMessage::SkipWaiting => {
            tracing::info!(generation = %generation, "skip waiting requested");
            skip_waiting.send_replace(true);
            None
        }
        ControlMessage::GetVersion => Some(ControlReply::version(generation.id())),
        ControlMessage::ClearCache => match cache.delete_all_partitions().await {
            Ok(count) => {
                tracing::info!(partitions = count, "cleared all partitions");
                Some(ControlReply::success())
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache clear failed");
                Some(ControlReply::failure(e.to_string()))
            }
        },
    }
}
