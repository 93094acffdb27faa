//! Workflow engine logic and collaborator trait definitions for FlowForge.
//!
//! This crate defines the "ports" (generator, action, repository traits) that
//! the infrastructure layer implements, plus the engine itself: schema
//! validation, dependency graph, template resolution, execution, and the
//! self-correcting pipeline. It depends only on `flowforge-types` -- never on
//! `flowforge-infra` or any IO crate.

pub mod action;
pub mod event;
pub mod generator;
pub mod repository;
pub mod workflow;
