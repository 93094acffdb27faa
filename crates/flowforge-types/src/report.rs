//! Execution trace and report types.
//!
//! A report is produced once per execution attempt and never mutated after
//! construction. Rendering is pure: identical inputs produce byte-identical
//! markdown.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflow::Workflow;

/// Outcome of one node in an execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn glyph(&self) -> &'static str {
        match self {
            StepStatus::Success => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Skipped => "↷",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// One entry of the execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub node_id: String,
    pub service: String,
    pub action: String,
    /// Parameters after template substitution. Empty for skipped nodes.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Action payload on success.
    #[serde(default)]
    pub result: Option<Value>,
    pub status: StepStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl TraceStep {
    /// A trace step for a node that was never invoked.
    pub fn skipped(
        node_id: impl Into<String>,
        service: impl Into<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            service: service.into(),
            action: action.into(),
            parameters: Map::new(),
            result: None,
            status: StepStatus::Skipped,
            error: Some(reason.into()),
        }
    }

    /// One-line detail used in rendered reports.
    pub fn detail(&self) -> String {
        match (&self.status, &self.result, &self.error) {
            (StepStatus::Success, Some(Value::Object(fields)), _) => fields
                .iter()
                .filter(|(k, _)| k.as_str() != "status")
                .map(|(k, v)| format!("{k}={}", display_value(v)))
                .collect::<Vec<_>>()
                .join(", "),
            (StepStatus::Success, Some(other), _) => display_value(other),
            (_, _, Some(err)) => err.clone(),
            _ => String::new(),
        }
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Summary of a workflow execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub workflow_id: String,
    pub workflow_name: String,
    pub total_steps: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Trace steps in execution order.
    pub trace: Vec<TraceStep>,
    #[serde(default)]
    pub dependency_violations: Vec<String>,
}

impl ExecutionReport {
    /// Fold a trace into counts and attach the graph's violations.
    pub fn build(workflow: &Workflow, trace: Vec<TraceStep>, violations: Vec<String>) -> Self {
        let count = |status: StepStatus| trace.iter().filter(|s| s.status == status).count();
        Self {
            workflow_id: workflow.id.clone(),
            workflow_name: workflow.name.clone(),
            total_steps: trace.len(),
            successful: count(StepStatus::Success),
            failed: count(StepStatus::Failed),
            skipped: count(StepStatus::Skipped),
            trace,
            dependency_violations: violations,
        }
    }

    /// True iff nothing failed, nothing was skipped, and the graph was sound.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0 && self.dependency_violations.is_empty()
    }

    pub fn step(&self, node_id: &str) -> Option<&TraceStep> {
        self.trace.iter().find(|s| s.node_id == node_id)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String is infallible.
        let _ = writeln!(out, "# Execution Report: {}", self.workflow_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "**Workflow ID:** `{}`", self.workflow_id);
        let _ = writeln!(out, "**Total steps:** {}", self.total_steps);
        let _ = writeln!(out, "**Successful:** {}", self.successful);
        let _ = writeln!(out, "**Failed:** {}", self.failed);
        let _ = writeln!(out, "**Skipped:** {}", self.skipped);
        let _ = writeln!(out);
        let _ = writeln!(out, "## Steps");
        let _ = writeln!(out);
        for (i, step) in self.trace.iter().enumerate() {
            let _ = write!(
                out,
                "{}. {} `{}` ({}.{}) {}",
                i + 1,
                step.status.glyph(),
                step.node_id,
                step.service,
                step.action,
                step.status.as_str()
            );
            let detail = step.detail();
            if !detail.is_empty() {
                let _ = write!(out, ": {detail}");
            }
            let _ = writeln!(out);
        }

        if !self.dependency_violations.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Dependency Violations");
            let _ = writeln!(out);
            for v in &self.dependency_violations {
                let _ = writeln!(out, "- {v}");
            }
        }
        out
    }
}
