//! Observability for FlowForge: subscriber setup and shared span attribute names.

pub mod attrs;
pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
