//! Action invocation contract.
//!
//! The executor never talks to services directly. Each execution attempt opens
//! a fresh session from an [`ActionProvider`]; the session owns whatever state
//! the backing services need and is dropped when the attempt ends.

use flowforge_types::catalog::Capability;
use serde_json::{Map, Value};
use thiserror::Error;

/// A fully resolved call to one catalog capability.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    pub node_id: String,
    pub capability: Capability,
    /// Parameters after template substitution.
    pub parameters: Map<String, Value>,
}

/// Business-level result of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action ran. `outputs` become available to downstream templates.
    Success { outputs: Map<String, Value> },
    /// The action was rejected by the service. Recorded on the node.
    Failure { error: String },
}

impl ActionOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        ActionOutcome::Failure {
            error: error.into(),
        }
    }
}

/// The invoker itself broke its contract. Aborts the whole execution.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no handler for capability {0}")]
    Unsupported(Capability),

    #[error("action backend unavailable: {0}")]
    Unavailable(String),
}

/// One execution attempt's view of the services.
pub trait ActionInvoker: Send {
    fn invoke(
        &mut self,
        call: &ActionCall,
    ) -> impl std::future::Future<Output = Result<ActionOutcome, InvokeError>> + Send;
}

/// Factory for per-attempt action sessions.
pub trait ActionProvider: Send + Sync {
    type Session: ActionInvoker;

    /// Open a session with fresh state.
    fn open_session(&self) -> Self::Session;
}
