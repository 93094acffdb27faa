//! Application state shared by the command handlers.

use std::path::PathBuf;

use flowforge_infra::config::load_global_config;
use flowforge_infra::filesystem::{FileWorkflowRepository, resolve_data_dir};
use flowforge_types::config::GlobalConfig;

#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: GlobalConfig,
    pub repo: FileWorkflowRepository,
}

impl AppState {
    /// Resolve the data directory, make sure it exists, and load `config.toml`.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        tracing::debug!(data_dir = %data_dir.display(), "loaded configuration");

        Ok(Self {
            repo: FileWorkflowRepository::new(&data_dir),
            data_dir,
            config,
        })
    }
}
