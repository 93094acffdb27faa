//! Template resolution for node parameters.
//!
//! Two reference forms are recognised inside string values:
//! - `{{name}}` -- a workflow-level parameter
//! - `{{node_id.output_key}}` -- an output of an upstream node
//!
//! A string that is exactly one template keeps the referenced JSON type. A
//! string with embedded templates interpolates their textual forms. Whitespace
//! inside the braces is ignored and an unterminated `{{` is literal text.

use std::collections::{BTreeMap, HashMap};

use flowforge_types::report::StepStatus;
use flowforge_types::workflow::NodeParameter;
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A single `{{...}}` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateRef<'a> {
    Param(&'a str),
    NodeOutput { node_id: &'a str, key: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Ref(TemplateRef<'a>),
}

fn parse_ref(inner: &str) -> Option<TemplateRef<'_>> {
    let inner = inner.trim();
    if inner.is_empty() {
        return None;
    }
    match inner.split_once('.') {
        Some((node_id, key)) => {
            let (node_id, key) = (node_id.trim(), key.trim());
            if node_id.is_empty() || key.is_empty() {
                None
            } else {
                Some(TemplateRef::NodeOutput { node_id, key })
            }
        }
        None => Some(TemplateRef::Param(inner)),
    }
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            break;
        };
        match parse_ref(&after_open[..close]) {
            Some(r) => {
                if open > 0 {
                    out.push(Segment::Literal(&rest[..open]));
                }
                out.push(Segment::Ref(r));
            }
            None => out.push(Segment::Literal(&rest[..open + 2 + close + 2])),
        }
        rest = &after_open[close + 2..];
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

/// All template references in a string, in order of appearance.
pub fn references(s: &str) -> Vec<TemplateRef<'_>> {
    segments(s)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Ref(r) => Some(r),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// All template references anywhere inside a JSON value.
pub fn value_references(value: &Value) -> Vec<TemplateRef<'_>> {
    match value {
        Value::String(s) => references(s),
        Value::Array(items) => items.iter().flat_map(value_references).collect(),
        Value::Object(fields) => fields.values().flat_map(value_references).collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Resolution context
// ---------------------------------------------------------------------------

/// What templates can see: workflow parameters plus the status and outputs
/// of nodes executed so far.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    parameters: BTreeMap<String, Value>,
    statuses: HashMap<String, StepStatus>,
    outputs: HashMap<String, Map<String, Value>>,
}

impl ResolutionContext {
    pub fn new(parameters: BTreeMap<String, Value>) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    /// Record a successful node and its outputs.
    pub fn record_success(&mut self, node_id: &str, outputs: Map<String, Value>) {
        self.statuses.insert(node_id.to_string(), StepStatus::Success);
        self.outputs.insert(node_id.to_string(), outputs);
    }

    /// Record a node that failed or was skipped.
    pub fn record_status(&mut self, node_id: &str, status: StepStatus) {
        self.statuses.insert(node_id.to_string(), status);
        if status != StepStatus::Success {
            self.outputs.remove(node_id);
        }
    }

    pub fn status(&self, node_id: &str) -> Option<StepStatus> {
        self.statuses.get(node_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("workflow parameter '{0}' is not defined")]
    MissingParameter(String),

    #[error("node '{0}' has not been executed")]
    NodeNotExecuted(String),

    #[error("node '{node_id}' did not succeed (status: {status})")]
    NodeNotSucceeded { node_id: String, status: &'static str },

    #[error("node '{node_id}' produced no output '{key}'")]
    MissingOutput { node_id: String, key: String },

    #[error("required value resolved to null")]
    NoValue,
}

fn lookup(
    r: TemplateRef<'_>,
    required: bool,
    ctx: &ResolutionContext,
) -> Result<Value, ResolutionError> {
    match r {
        TemplateRef::Param(name) => match ctx.parameters.get(name) {
            Some(v) => Ok(v.clone()),
            None if required => Err(ResolutionError::MissingParameter(name.to_string())),
            None => Ok(Value::Null),
        },
        TemplateRef::NodeOutput { node_id, key } => match ctx.status(node_id) {
            None => Err(ResolutionError::NodeNotExecuted(node_id.to_string())),
            Some(StepStatus::Success) => ctx
                .outputs
                .get(node_id)
                .and_then(|o| o.get(key))
                .cloned()
                .ok_or_else(|| ResolutionError::MissingOutput {
                    node_id: node_id.to_string(),
                    key: key.to_string(),
                }),
            Some(other) => Err(ResolutionError::NodeNotSucceeded {
                node_id: node_id.to_string(),
                status: other.as_str(),
            }),
        },
    }
}

fn textual(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn resolve_str(s: &str, required: bool, ctx: &ResolutionContext) -> Result<Value, ResolutionError> {
    let segs = segments(s);
    if let [Segment::Ref(r)] = segs.as_slice() {
        return lookup(*r, required, ctx);
    }
    if !segs.iter().any(|seg| matches!(seg, Segment::Ref(_))) {
        return Ok(Value::String(s.to_string()));
    }
    let mut out = String::with_capacity(s.len());
    for seg in segs {
        match seg {
            Segment::Literal(text) => out.push_str(text),
            Segment::Ref(r) => out.push_str(&textual(&lookup(r, required, ctx)?)),
        }
    }
    Ok(Value::String(out))
}

fn resolve_inner(
    value: &Value,
    required: bool,
    ctx: &ResolutionContext,
) -> Result<Value, ResolutionError> {
    match value {
        Value::String(s) => resolve_str(s, required, ctx),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_inner(v, required, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(fields) => fields
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_inner(v, required, ctx)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Resolve every template inside `value`.
///
/// Strings nested in arrays and objects are resolved too. A required value
/// that ends up null is an error.
pub fn resolve_value(
    value: &Value,
    required: bool,
    ctx: &ResolutionContext,
) -> Result<Value, ResolutionError> {
    let resolved = resolve_inner(value, required, ctx)?;
    if required && resolved.is_null() {
        return Err(ResolutionError::NoValue);
    }
    Ok(resolved)
}

pub fn resolve_parameter(
    param: &NodeParameter,
    ctx: &ResolutionContext,
) -> Result<Value, ResolutionError> {
    resolve_value(&param.value, param.required, ctx)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
