//! Shared domain types for FlowForge.
//!
//! This crate contains the core domain types used across the FlowForge
//! workspace: workflow definitions, the capability catalog, execution reports,
//! pipeline events, configuration, and repository errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod report;
pub mod workflow;
