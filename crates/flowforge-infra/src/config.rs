//! Global configuration loader for FlowForge.
//!
//! Reads `config.toml` from the data directory (`~/.flowforge/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;

use flowforge_types::config::GlobalConfig;

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`GlobalConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.max_fix_attempts, 2);
        assert!(config.simulator.failures.is_empty());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
max_fix_attempts = 4

[generator]
model = "claude-3-5-haiku-latest"

[simulator]
seed = 42

[simulator.failures."slack.invite_user"]
error_type = "rate_limited"
message = "Slack API rate limit exceeded"
probability = 0.5
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.max_fix_attempts, 4);
        assert_eq!(config.generator.model, "claude-3-5-haiku-latest");
        assert_eq!(config.generator.max_tokens, 4096);
        assert_eq!(config.simulator.seed, Some(42));
        let rule = &config.simulator.failures["slack.invite_user"];
        assert_eq!(rule.error_type, "rate_limited");
        assert_eq!(rule.probability, 0.5);
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "max_fix_attempts = [")
            .await
            .unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.max_fix_attempts, 2);
    }
}
