//! Configuration loading for Ferry applications
//!
//! Provides utilities for loading configuration files from the shared
//! Ferry config directory (~/.config/ferry/) and for locating the runtime
//! state file.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Initialize the Ferry config directory.
///
/// Creates ~/.config/ferry/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the Ferry config directory (~/.config/ferry/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ferry"))
}

/// Get the path to a config file within the Ferry config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the directory holding runtime sync state.
///
/// Honors `FERRY_STATE_DIR` so deployments can point state at a writable
/// scratch location; defaults to the local data directory
/// (~/.local/share/ferry/ on Linux).
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("FERRY_STATE_DIR")
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::data_local_dir().map(|p| p.join("ferry"))
}

/// Get the path to the runtime state snapshot file
pub fn state_path() -> Option<PathBuf> {
    state_dir().map(|p| p.join("state.json"))
}

/// Load and parse a JSON config file from the Ferry config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the Ferry config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the Ferry config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as JSON to a config file in the Ferry config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    let path = dir.join(filename);
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
