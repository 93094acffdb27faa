//! Filesystem adapters for FlowForge.
//!
//! Hosts the data directory layout and the file-backed workflow repository.

pub mod workflow_store;

use std::path::{Path, PathBuf};

pub use workflow_store::FileWorkflowRepository;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `FLOWFORGE_DATA_DIR` environment variable
/// 2. `~/.flowforge`
/// 3. `.flowforge` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLOWFORGE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".flowforge");
    }

    PathBuf::from(".flowforge")
}

/// `{data_dir}/workflows/`
pub fn workflows_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("workflows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflows_dir() {
        let data_dir = PathBuf::from("/home/user/.flowforge");
        assert_eq!(
            workflows_dir(&data_dir),
            PathBuf::from("/home/user/.flowforge/workflows")
        );
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: no other test reads or writes this variable.
        unsafe {
            std::env::set_var("FLOWFORGE_DATA_DIR", "/tmp/test-flowforge");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-flowforge"));
        unsafe {
            std::env::remove_var("FLOWFORGE_DATA_DIR");
        }
    }
}
