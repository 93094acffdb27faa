//! Workflow parsing and schema validation.
//!
//! `parse_workflow` turns generator text into a [`Workflow`]; `validate_workflow`
//! applies the structural checks that make a workflow executable. Fatal
//! problems are returned as [`SchemaError`]; softer inconsistencies are
//! collected as warnings on the [`ValidatedWorkflow`].

use std::collections::{BTreeSet, HashSet};

use flowforge_types::catalog::Capability;
use flowforge_types::workflow::{Workflow, WorkflowEdge};
use thiserror::Error;

use super::dag::DependencyGraph;
use super::template::{TemplateRef, value_references};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid workflow JSON: {0}")]
    Parse(String),

    #[error("workflow has no nodes")]
    NoNodes,

    #[error("node at position {0} has an empty id")]
    EmptyNodeId(usize),

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("{field} '{value}' must be non-empty and contain only letters, digits, '-' or '_'")]
    UnsafeIdentifier { field: &'static str, value: String },

    #[error("node '{node_id}' uses unknown capability {service}.{action}")]
    UnknownCapability {
        node_id: String,
        service: String,
        action: String,
    },

    #[error("node '{node_id}' declares parameter '{name}' more than once")]
    DuplicateParameter { node_id: String, name: String },
}

/// A workflow that passed schema validation.
///
/// Carries the capability each node maps onto, the analysed dependency graph,
/// and non-fatal warnings.
#[derive(Debug, Clone)]
pub struct ValidatedWorkflow {
    workflow: Workflow,
    capabilities: Vec<Capability>,
    graph: DependencyGraph,
    warnings: Vec<String>,
}

impl ValidatedWorkflow {
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn into_workflow(self) -> Workflow {
        self.workflow
    }

    /// Capability of the node at `idx`.
    pub fn capability(&self, idx: usize) -> Capability {
        self.capabilities[idx]
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Whether a string is safe to use as a path component.
pub fn is_path_safe(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Skip the info string (e.g. "json") up to the end of the fence line.
    let body = match after.find('\n') {
        Some(nl) => &after[nl + 1..],
        None => after,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parse workflow JSON. Accepts a bare object or one wrapped in a markdown fence.
pub fn parse_workflow(text: &str) -> Result<Workflow, SchemaError> {
    serde_json::from_str(strip_fence(text)).map_err(|e| SchemaError::Parse(e.to_string()))
}

/// Run the fatal checks and collect warnings.
pub fn validate_workflow(workflow: Workflow) -> Result<ValidatedWorkflow, SchemaError> {
    if !is_path_safe(&workflow.id) {
        return Err(SchemaError::UnsafeIdentifier {
            field: "workflow id",
            value: workflow.id.clone(),
        });
    }
    if !is_path_safe(&workflow.team) {
        return Err(SchemaError::UnsafeIdentifier {
            field: "team",
            value: workflow.team.clone(),
        });
    }
    if workflow.nodes.is_empty() {
        return Err(SchemaError::NoNodes);
    }

    let mut seen_ids = HashSet::new();
    let mut capabilities = Vec::with_capacity(workflow.nodes.len());
    for (i, node) in workflow.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            return Err(SchemaError::EmptyNodeId(i));
        }
        if !seen_ids.insert(node.id.as_str()) {
            return Err(SchemaError::DuplicateNodeId(node.id.clone()));
        }
        let capability = Capability::resolve(&node.service, &node.action).ok_or_else(|| {
            SchemaError::UnknownCapability {
                node_id: node.id.clone(),
                service: node.service.clone(),
                action: node.action.clone(),
            }
        })?;
        capabilities.push(capability);

        let mut seen_params = HashSet::new();
        for param in &node.parameters {
            if !seen_params.insert(param.name.as_str()) {
                return Err(SchemaError::DuplicateParameter {
                    node_id: node.id.clone(),
                    name: param.name.clone(),
                });
            }
        }
    }

    let graph = DependencyGraph::build(&workflow.nodes);
    let mut warnings = edge_warnings(&workflow);
    warnings.extend(template_warnings(&workflow, &graph));

    for warning in &warnings {
        tracing::debug!(workflow_id = %workflow.id, warning = %warning, "workflow validation warning");
    }

    Ok(ValidatedWorkflow {
        workflow,
        capabilities,
        graph,
        warnings,
    })
}

fn edge_warnings(workflow: &Workflow) -> Vec<String> {
    if workflow.edges.is_empty() {
        return Vec::new();
    }
    let declared: BTreeSet<&WorkflowEdge> = workflow.edges.iter().collect();
    let derived_owned = workflow.derived_edges();
    let derived: BTreeSet<&WorkflowEdge> = derived_owned.iter().collect();

    let mut warnings = Vec::new();
    for edge in declared.difference(&derived) {
        warnings.push(format!(
            "edge {} -> {} has no matching depends_on entry",
            edge.source, edge.target
        ));
    }
    for edge in derived.difference(&declared) {
        warnings.push(format!(
            "depends_on {} -> {} is missing from edges",
            edge.source, edge.target
        ));
    }
    warnings
}

fn template_warnings(workflow: &Workflow, graph: &DependencyGraph) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, node) in workflow.nodes.iter().enumerate() {
        let upstream = graph.transitive_upstream(i);
        for param in &node.parameters {
            for r in value_references(&param.value) {
                let TemplateRef::NodeOutput { node_id, key } = r else {
                    continue;
                };
                let target = workflow.nodes.iter().position(|n| n.id == node_id);
                match target {
                    Some(t) if upstream.contains(&t) => {
                        if !workflow.nodes[t].outputs.contains_key(key) {
                            warnings.push(format!(
                                "node {} parameter '{}' references output '{key}' which node {node_id} does not declare",
                                node.id, param.name
                            ));
                        }
                    }
                    _ => warnings.push(format!(
                        "node {} parameter '{}' references node {node_id} which is not an upstream dependency",
                        node.id, param.name
                    )),
                }
            }
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
