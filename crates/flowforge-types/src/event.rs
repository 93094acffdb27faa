//! Event types for the FlowForge pipeline event bus.
//!
//! `PipelineEvent` is the unified event type broadcast while a pipeline run
//! progresses. All variants are Clone + Send + Sync for use with tokio
//! broadcast channels. On the wire every event is an object of the form
//! `{"kind": ..., "payload": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::report::ExecutionReport;
use crate::workflow::Workflow;

/// States of the self-correcting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Generating,
    Validating,
    Executing,
    Correcting,
    Succeeded,
    Persisted,
    Exhausted,
    Failed,
    Cancelled,
}

impl PipelineState {
    /// Whether the run ends in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded
                | PipelineState::Persisted
                | PipelineState::Exhausted
                | PipelineState::Failed
                | PipelineState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Generating => "generating",
            PipelineState::Validating => "validating",
            PipelineState::Executing => "executing",
            PipelineState::Correcting => "correcting",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Persisted => "persisted",
            PipelineState::Exhausted => "exhausted",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted during a pipeline run, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The pipeline entered a new state.
    State {
        run_id: Uuid,
        state: PipelineState,
        /// 1-based generation attempt the state belongs to.
        attempt: u32,
        at: DateTime<Utc>,
    },

    /// A generator event forwarded verbatim.
    Generation {
        run_id: Uuid,
        attempt: u32,
        kind: String,
        payload: Value,
    },

    /// A candidate workflow passed schema validation.
    Workflow {
        run_id: Uuid,
        attempt: u32,
        workflow: Workflow,
    },

    /// The result of executing a candidate.
    ExecutionReport {
        run_id: Uuid,
        attempt: u32,
        report: ExecutionReport,
        markdown: String,
    },

    /// A diagnostic is being fed back to the generator.
    Correction {
        run_id: Uuid,
        attempt: u32,
        diagnostic: String,
    },

    /// The accepted workflow was written to the store.
    WorkflowSaved {
        run_id: Uuid,
        workflow_id: String,
        team: String,
        version: u32,
    },

    /// The run ended with an error.
    Error { run_id: Uuid, message: String },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::State { run_id, .. }
            | PipelineEvent::Generation { run_id, .. }
            | PipelineEvent::Workflow { run_id, .. }
            | PipelineEvent::ExecutionReport { run_id, .. }
            | PipelineEvent::Correction { run_id, .. }
            | PipelineEvent::WorkflowSaved { run_id, .. }
            | PipelineEvent::Error { run_id, .. } => *run_id,
        }
    }

    /// The wire `kind` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::State { .. } => "state",
            PipelineEvent::Generation { .. } => "generation",
            PipelineEvent::Workflow { .. } => "workflow",
            PipelineEvent::ExecutionReport { .. } => "execution_report",
            PipelineEvent::Correction { .. } => "correction",
            PipelineEvent::WorkflowSaved { .. } => "workflow_saved",
            PipelineEvent::Error { .. } => "error",
        }
    }
}
