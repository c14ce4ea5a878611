use anyhow::{Context, Result};
use std::path::PathBuf;

/// Centralized path management for anyinstall

const APP_DIR: &str = "anyinstall";

/// Get the anyinstall config directory
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join(APP_DIR);

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory at {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Location of the user's catalog overlay. Not created if missing.
pub fn user_catalog_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("catalog.json"))
}

/// Per-package directory for archives that could not be extracted to
/// their requested location.
pub fn user_package_dir(package: &str) -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("packages").join(package))
}

/// Directory for single binaries installed without elevation.
pub fn user_bin_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("bin"))
    } else {
        dirs::home_dir().map(|home| home.join(".local").join("bin"))
    }
}

/// Expand `~` and environment variables in a catalog path.
pub fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}
