//! Infrastructure implementations for FlowForge.
//!
//! Implements the ports defined in `flowforge-core`: the simulated service
//! backend (`ActionProvider`), the file-backed `WorkflowRepository`, and the
//! Anthropic-backed `WorkflowGenerator`. Also hosts the global config loader.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod simulator;
