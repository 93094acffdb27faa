//! Anthropic Claude workflow generator.
//!
//! [`AnthropicGenerator`] implements
//! [`WorkflowGenerator`](flowforge_core::generator::WorkflowGenerator) over
//! the Anthropic Messages API.

pub mod client;
pub mod types;

pub use client::AnthropicGenerator;
