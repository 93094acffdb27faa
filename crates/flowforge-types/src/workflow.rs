//! Workflow domain types for FlowForge.
//!
//! `Workflow` is the canonical representation of a generated automation: an
//! ordered list of service-call nodes whose `depends_on` lists form a DAG.
//! It is the JSON shape emitted by the generator, executed by the engine, and
//! written to the workflow store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow DAG.
///
/// `nodes` order is significant: it is the authoring order and breaks ties
/// between nodes that become ready at the same time during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow identifier (kebab-case by convention). Stable across versions.
    pub id: String,
    /// Human-readable workflow name.
    pub name: String,
    /// What this workflow accomplishes.
    pub description: String,
    /// Team namespace the workflow belongs to.
    pub team: String,
    /// Ordered node list forming the DAG.
    pub nodes: Vec<WorkflowNode>,
    /// Explicit edges. Informational only; `depends_on` is authoritative.
    #[serde(default)]
    pub edges: Vec<WorkflowEdge>,
    /// Global parameters referenced by `{{name}}` templates.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Monotonic version number, starting at 1.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl Workflow {
    /// Edges implied by every node's `depends_on` list, in authoring order.
    pub fn derived_edges(&self) -> Vec<WorkflowEdge> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.depends_on.iter().map(move |dep| WorkflowEdge {
                    source: dep.clone(),
                    target: node.id.clone(),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single service action step in the workflow DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Node ID, unique within the workflow (snake_case by convention).
    pub id: String,
    /// Display name.
    pub name: String,
    /// What this step does.
    pub description: String,
    /// Capability group, e.g. "slack". Checked against the catalog.
    pub service: String,
    /// Action within the service, e.g. "invite_user". Checked against the catalog.
    pub action: String,
    /// Responsible role. Free text, never validated.
    pub actor: String,
    /// Ordered parameter list passed to the action.
    #[serde(default)]
    pub parameters: Vec<NodeParameter>,
    /// IDs of upstream nodes.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Declared outputs: key -> description. Values only exist after execution.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// A single parameter of a workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameter {
    /// Parameter name as the action expects it.
    pub name: String,
    /// Literal value or template string (`{{param}}`, `{{node_id.output_key}}`).
    pub value: Value,
    /// Human-readable description.
    pub description: String,
    /// Whether resolution must produce a value.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// An explicit edge between two workflow nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub source: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
