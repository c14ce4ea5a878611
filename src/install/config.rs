use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::cache::DEFAULT_CACHE_DIR;
use crate::common::config::DocumentedConfig;
use crate::common::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub cache_dir: String,
    pub download_timeout_secs: u64,
    pub assume_yes: bool,
    pub catalog_overlay: Option<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            cache_dir: DEFAULT_CACHE_DIR.to_string(),
            download_timeout_secs: 300,
            assume_yes: false,
            catalog_overlay: None,
        }
    }
}

crate::documented_config!(InstallerConfig,
    cache_dir, "Directory for downloaded archives, installers and binaries",
    download_timeout_secs, "Seconds before a download is abandoned",
    assume_yes, "Accept fallback prompts without asking",
    [optional] catalog_overlay, "Catalog file whose packages replace built-in ones",
    => Ok(paths::config_dir()?.join("config.toml"))
);

impl InstallerConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path_documented(&Self::config_path()?)
    }

    pub fn cache_root(&self) -> PathBuf {
        paths::expand(&self.cache_dir)
    }

    /// Catalog overlays in the order they are applied: the user catalog,
    /// the configured overlay, then one given on the command line.
    pub fn overlays(&self, cli_catalog: Option<&Path>) -> Vec<PathBuf> {
        paths::user_catalog_path()
            .into_iter()
            .chain(self.catalog_overlay.as_deref().map(paths::expand))
            .chain(cli_catalog.map(Path::to_path_buf))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InstallerConfig::default();
        assert_eq!(config.cache_dir, ".cache");
        assert_eq!(config.download_timeout_secs, 300);
        assert!(!config.assume_yes);
    }

    #[test]
    fn documented_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let created = InstallerConfig::load_from_path_documented(&path).expect("create");
        assert_eq!(created, InstallerConfig::default());

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("download_timeout_secs = 300"));
        assert!(text.contains("# catalog_overlay = \"\""));
    }

    #[test]
    fn command_line_catalog_is_applied_last() {
        let config = InstallerConfig {
            catalog_overlay: Some("/etc/anyinstall/site.json".into()),
            ..InstallerConfig::default()
        };
        let overlays = config.overlays(Some(Path::new("/tmp/mine.json")));
        assert_eq!(overlays.last(), Some(&PathBuf::from("/tmp/mine.json")));
        assert!(overlays.contains(&PathBuf::from("/etc/anyinstall/site.json")));
    }
}
