//! Configuration management

use crate::core::backend::parse_base_url;
use crate::error::{Result, VidgrabError};
use crate::types::Config;
use crate::utils::paths::{default_download_dir, ensure_dir, get_config_dir, get_config_path};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub download_dir: Option<String>,
}

/// Load configuration from the default location
pub async fn load_config() -> Result<Config> {
    load_config_from(Path::new(&get_config_path())).await
}

/// Load configuration from `path`, missing fields falling back to defaults
pub async fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(with_download_dir(Config::default()));
    }

    let content = fs::read_to_string(path).await?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| VidgrabError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    Ok(with_download_dir(config))
}

fn with_download_dir(mut config: Config) -> Config {
    if config.download_dir.trim().is_empty() {
        config.download_dir = default_download_dir();
    }
    config
}

/// Apply CLI overrides and reject values the client cannot run with
pub fn finalize(mut config: Config, overrides: Overrides) -> Result<Config> {
    if let Some(base) = overrides.api_base_url {
        config.api_base_url = base;
    }
    if let Some(ms) = overrides.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(dir) = overrides.download_dir {
        config.download_dir = dir;
    }

    parse_base_url(&config.api_base_url)?;
    if config.poll_interval_ms == 0 {
        return Err(VidgrabError::InvalidConfig(
            "poll_interval_ms must be greater than zero".into(),
        ));
    }
    if config.request_timeout_secs == 0 {
        return Err(VidgrabError::InvalidConfig(
            "request_timeout_secs must be greater than zero".into(),
        ));
    }
    Ok(config)
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Save configuration to `path`
pub async fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(&parent.to_string_lossy()).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Open config file in editor
pub async fn edit_config(editor: &str) -> Result<()> {
    let config_path = get_config_path();

    // Ensure config file exists
    if !Path::new(&config_path).exists() {
        ensure_dir(&get_config_dir()).await?;
        save_config_to(&Config::default(), Path::new(&config_path)).await?;
    }

    let status = Command::new(editor).arg(&config_path).status().await?;
    if !status.success() {
        tracing::warn!(editor, code = ?status.code(), "editor exited with failure");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.json")).await.unwrap();
        assert_eq!(cfg.api_base_url, "http://localhost:8000/api");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
        assert!(!cfg.download_dir.is_empty());
    }

    #[tokio::test]
    async fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cfg = Config {
            api_base_url: "https://grab.example.com/api".into(),
            download_dir: "/tmp/videos".into(),
            ..Config::default()
        };
        save_config_to(&cfg, &path).await.unwrap();

        let loaded = load_config_from(&path).await.unwrap();
        assert_eq!(loaded, cfg);
    }

    #[tokio::test]
    async fn test_broken_file_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = load_config_from(&path).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_overrides_win_and_are_validated() {
        let cfg = finalize(
            Config::default(),
            Overrides {
                api_base_url: Some("http://10.0.0.2:9000/api".into()),
                poll_interval_ms: Some(500),
                download_dir: Some("out".into()),
            },
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "http://10.0.0.2:9000/api");
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.download_dir, "out");

        let zero = Overrides {
            poll_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(finalize(Config::default(), zero).is_err());

        let bad_url = Overrides {
            api_base_url: Some("localhost:8000".into()),
            ..Default::default()
        };
        assert!(finalize(Config::default(), bad_url).is_err());
    }
}
