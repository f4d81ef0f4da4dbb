//! Path utilities for vidgrab
//!
//! Respects XDG Base Directory Specification

use crate::error::Result;
use std::env;
use tokio::fs;

const APP_NAME: &str = "vidgrab";

/// Get config directory path
/// Respects XDG_CONFIG_HOME, defaults to ~/.config/vidgrab
pub fn get_config_dir() -> String {
    let base = env::var("XDG_CONFIG_HOME")
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("{}/.config", env::var("HOME").unwrap_or_default()))
        });

    format!("{}/{}", base, APP_NAME)
}

/// Get config file path
pub fn get_config_path() -> String {
    format!("{}/config.json", get_config_dir())
}

/// OS download directory, or the working directory when there is none
pub fn default_download_dir() -> String {
    dirs::download_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".into())
}

/// Ensure a directory exists
pub async fn ensure_dir(path: &str) -> Result<()> {
    fs::create_dir_all(path).await?;
    Ok(())
}
