//! File-backed [`WorkflowRepository`].
//!
//! Layout: `{data_dir}/workflows/{team}/{id}-v{version}.json`, one immutable
//! file per version. Saves to the same `(team, id)` are serialized through a
//! per-key async mutex so concurrent writers never assign the same version.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use flowforge_core::repository::{WorkflowRepository, WorkflowSummary};
use flowforge_core::workflow::schema::is_path_safe;
use flowforge_types::error::RepositoryError;
use flowforge_types::workflow::Workflow;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::workflows_dir;

#[derive(Debug, Clone)]
pub struct FileWorkflowRepository {
    root: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

fn check_id(value: &str) -> Result<(), RepositoryError> {
    if is_path_safe(value) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidId(value.to_string()))
    }
}

/// Parse `{id}-v{N}.json` into `N` when the prefix matches `id`.
fn parse_version(file_name: &str, id: &str) -> Option<u32> {
    file_name
        .strip_prefix(id)?
        .strip_prefix("-v")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Split `{id}-v{N}.json` into its parts. Ids may themselves contain `-v`.
fn split_file_name(file_name: &str) -> Option<(&str, u32)> {
    let stem = file_name.strip_suffix(".json")?;
    let (id, version) = stem.rsplit_once("-v")?;
    Some((id, version.parse().ok()?))
}

impl FileWorkflowRepository {
    /// Store workflows under `{data_dir}/workflows/`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: workflows_dir(data_dir),
            locks: Arc::new(DashMap::new()),
        }
    }

    fn team_dir(&self, team: &str) -> PathBuf {
        self.root.join(team)
    }

    fn version_path(&self, team: &str, id: &str, version: u32) -> PathBuf {
        self.team_dir(team).join(format!("{id}-v{version}.json"))
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        // Clone out of the map so no shard guard lives across an await.
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drop our handle and forget the lock once nobody else holds it.
    fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn save_locked(&self, workflow: &Workflow) -> Result<u32, RepositoryError> {
        let latest = self
            .versions(&workflow.team, &workflow.id)
            .await?
            .last()
            .copied()
            .unwrap_or(0);
        let next = latest
            .checked_add(1)
            .ok_or_else(|| RepositoryError::VersionExhausted(workflow.id.clone()))?;
        let version = workflow.version.max(next);

        let mut stored = workflow.clone();
        stored.version = version;
        let json = serde_json::to_string_pretty(&stored)?;

        let dir = self.team_dir(&workflow.team);
        tokio::fs::create_dir_all(&dir).await?;
        let path = self.version_path(&workflow.team, &workflow.id, version);
        let tmp = dir.join(format!(".{}-v{version}.json.tmp", workflow.id));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(version)
    }

    async fn delete_locked(&self, team: &str, id: &str) -> Result<usize, RepositoryError> {
        let versions = self.versions(team, id).await?;
        for version in &versions {
            tokio::fs::remove_file(self.version_path(team, id, *version)).await?;
        }
        Ok(versions.len())
    }

    /// All stored versions of one workflow, ascending.
    async fn versions(&self, team: &str, id: &str) -> Result<Vec<u32>, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(self.team_dir(team)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(v) = entry.file_name().to_str().and_then(|n| parse_version(n, id)) {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    async fn read(&self, path: &Path) -> Result<Option<Workflow>, RepositoryError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl WorkflowRepository for FileWorkflowRepository {
    async fn save(&self, workflow: &Workflow) -> Result<u32, RepositoryError> {
        check_id(&workflow.team)?;
        check_id(&workflow.id)?;

        let key = format!("{}/{}", workflow.team, workflow.id);
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.save_locked(workflow).await
        };
        self.release(&key, lock);
        let version = result?;

        debug!(team = %workflow.team, workflow_id = %workflow.id, version, "saved workflow");
        Ok(version)
    }

    async fn load(&self, team: &str, id: &str) -> Result<Option<Workflow>, RepositoryError> {
        check_id(team)?;
        check_id(id)?;
        match self.versions(team, id).await?.last() {
            Some(&latest) => self.read(&self.version_path(team, id, latest)).await,
            None => Ok(None),
        }
    }

    async fn load_version(
        &self,
        team: &str,
        id: &str,
        version: u32,
    ) -> Result<Option<Workflow>, RepositoryError> {
        check_id(team)?;
        check_id(id)?;
        self.read(&self.version_path(team, id, version)).await
    }

    async fn list(&self, team: &str) -> Result<Vec<WorkflowSummary>, RepositoryError> {
        check_id(team)?;
        let mut entries = match tokio::fs::read_dir(self.team_dir(team)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut latest: std::collections::BTreeMap<String, u32> = Default::default();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some((id, version)) = name.to_str().and_then(split_file_name) else {
                continue;
            };
            if !is_path_safe(id) {
                continue;
            }
            let slot = latest.entry(id.to_string()).or_insert(version);
            *slot = (*slot).max(version);
        }

        let mut summaries = Vec::with_capacity(latest.len());
        for (id, version) in latest {
            match self.read(&self.version_path(team, &id, version)).await {
                Ok(Some(wf)) => summaries.push(WorkflowSummary::from(&wf)),
                Ok(None) => {}
                Err(err) => {
                    warn!(team, workflow_id = %id, version, error = %err, "skipping unreadable workflow");
                }
            }
        }
        Ok(summaries)
    }

    async fn delete(&self, team: &str, id: &str) -> Result<bool, RepositoryError> {
        check_id(team)?;
        check_id(id)?;

        let key = format!("{team}/{id}");
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(team, id).await
        };
        self.release(&key, lock);
        let removed = result?;

        debug!(team, workflow_id = id, removed, "deleted workflow");
        Ok(removed > 0)
    }
}
