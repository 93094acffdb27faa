//! WorkflowGenerator trait definition.
//!
//! A generator turns a natural-language request (plus, on retries, the
//! previous attempt's diagnostic) into candidate workflow text. Its output is
//! a stream so intermediate events can reach subscribers while generation is
//! still running.

use std::pin::Pin;

use flowforge_types::report::ExecutionReport;
use flowforge_types::workflow::Workflow;
use futures_util::Stream;
use serde_json::Value;
use thiserror::Error;

/// Why the previous attempt was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The candidate could not be parsed or failed schema validation.
    Schema { message: String },
    /// The candidate executed but the report was not clean.
    Execution {
        report: Box<ExecutionReport>,
        markdown: String,
    },
}

impl Diagnostic {
    /// Text fed back to the generator.
    pub fn feedback(&self) -> &str {
        match self {
            Diagnostic::Schema { message } => message,
            Diagnostic::Execution { markdown, .. } => markdown,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Schema { message } => write!(f, "schema error: {message}"),
            Diagnostic::Execution { report, .. } => write!(
                f,
                "execution failed: {} failed, {} skipped, {} dependency violation(s)",
                report.failed,
                report.skipped,
                report.dependency_violations.len()
            ),
        }
    }
}

/// Input to one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// The user's natural-language request.
    pub request: String,
    /// Team the generated workflow belongs to.
    pub team: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Diagnostic from the previous attempt, if this is a retry.
    pub diagnostic: Option<Diagnostic>,
    /// Workflow being modified, if any.
    pub existing: Option<Workflow>,
    /// Extra user context (free text) appended to the prompt.
    pub context: Option<String>,
}

impl GenerationRequest {
    pub fn new(request: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            team: team.into(),
            attempt: 1,
            diagnostic: None,
            existing: None,
            context: None,
        }
    }
}

/// One item of a generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationChunk {
    /// An intermediate event, forwarded to subscribers verbatim.
    Passthrough { kind: String, payload: Value },
    /// The candidate workflow text. The first one ends the attempt.
    Workflow(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generator request failed: {0}")]
    Request(String),

    #[error("generator authentication failed: {0}")]
    Authentication(String),

    #[error("generator response invalid: {0}")]
    InvalidResponse(String),
}

pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationChunk, GenerationError>> + Send + 'static>>;

/// Trait for workflow generation backends.
///
/// Returns a boxed stream (not RPITIT) so implementations can be wrapped and
/// swapped behind the pipeline without naming their stream types.
pub trait WorkflowGenerator: Send + Sync {
    /// Human-readable backend name (e.g., "anthropic").
    fn name(&self) -> &str;

    fn generate(&self, request: GenerationRequest) -> GenerationStream;
}
