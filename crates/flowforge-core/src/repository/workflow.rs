//! Workflow repository trait definition.
//!
//! Workflows are stored per team and versioned: every save produces a new
//! immutable version. The infrastructure layer implements this trait with
//! one JSON file per version.

use flowforge_types::error::RepositoryError;
use flowforge_types::workflow::Workflow;
use serde::{Deserialize, Serialize};

/// Listing entry for the latest version of one stored workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub team: String,
    pub version: u32,
    pub node_count: usize,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(wf: &Workflow) -> Self {
        Self {
            id: wf.id.clone(),
            name: wf.name.clone(),
            description: wf.description.clone(),
            team: wf.team.clone(),
            version: wf.version,
            node_count: wf.nodes.len(),
        }
    }
}

/// Repository trait for versioned workflow persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    /// Persist a new version of `workflow`. Returns the version assigned,
    /// which is never lower than `workflow.version` and always greater than
    /// any version already stored for the same (team, id).
    fn save(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<u32, RepositoryError>> + Send;

    /// Load the latest version. `None` if nothing is stored.
    fn load(
        &self,
        team: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Load one specific version.
    fn load_version(
        &self,
        team: &str,
        id: &str,
        version: u32,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Latest version of every workflow in a team, sorted by id.
    fn list(
        &self,
        team: &str,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowSummary>, RepositoryError>> + Send;

    /// Delete every version. Returns `true` if anything existed.
    fn delete(
        &self,
        team: &str,
        id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
