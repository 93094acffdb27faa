//! Event bus for pipeline progress.
//!
//! Provides an `EventBus` that distributes `PipelineEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
