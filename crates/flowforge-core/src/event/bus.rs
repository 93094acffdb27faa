//! Broadcast channel carrying [`PipelineEvent`]s from a pipeline run to its
//! renderers.
//!
//! Events for one run are delivered in publish order. A full or unobserved
//! channel drops events instead of blocking, so rendering can never stall or
//! fail a run.

use chrono::Utc;
use flowforge_types::event::{PipelineEvent, PipelineState};
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: PipelineEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("pipeline event dropped, no subscribers");
        }
    }

    /// Publish a state transition stamped with the current time.
    pub fn publish_state(&self, run_id: Uuid, state: PipelineState, attempt: u32) {
        self.publish(PipelineEvent::State {
            run_id,
            state,
            attempt,
            at: Utc::now(),
        });
    }

    /// Publish a terminal error message for a run.
    pub fn publish_error(&self, run_id: Uuid, message: impl Into<String>) {
        self.publish(PipelineEvent::Error {
            run_id,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
