//! Workflow engine core: validation, DAG analysis, execution, and self-correction.
//!
//! - `schema` -- JSON parsing and structural validation against the catalog
//! - `dag` -- dependency graph, cycle detection, deterministic ordering
//! - `template` -- `{{param}}` / `{{node_id.output_key}}` resolution
//! - `executor` -- sequential executor producing an `ExecutionReport`
//! - `prompt` -- generation prompt composition
//! - `pipeline` -- generate / validate / execute / correct state machine

pub mod dag;
pub mod executor;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod template;
