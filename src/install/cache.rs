use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::error::{DownloadError, InstallError};
use super::exec::Downloader;
use crate::ui::prelude::*;

pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Subdirectory a downloaded artifact is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    Archives,
    Installers,
    Binaries,
}

impl CacheClass {
    fn dir_name(&self) -> &'static str {
        match self {
            Self::Archives => "archives",
            Self::Installers => "installers",
            Self::Binaries => "binaries",
        }
    }
}

/// Download cache keyed by the artifact's file name. A file that exists is
/// reused without contacting the server.
#[derive(Debug, Clone)]
pub struct DownloadCache {
    root: PathBuf,
}

impl DownloadCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, class: CacheClass, url: &str) -> Result<PathBuf, DownloadError> {
        let name = file_name_from_url(url).ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))?;
        Ok(self.root.join(class.dir_name()).join(name))
    }

    /// Return the cached artifact for `url`, downloading it first if needed.
    /// With `sha256` set, a cached file that does not match is fetched again
    /// and a fresh download that does not match is an error.
    pub fn fetch(
        &self,
        downloader: &dyn Downloader,
        class: CacheClass,
        url: &str,
        sha256: Option<&str>,
    ) -> Result<PathBuf, InstallError> {
        let path = self.path_for(class, url)?;

        if path.exists() {
            match sha256 {
                Some(expected) if !checksum_matches(&path, expected)? => {
                    emit(
                        Level::Warn,
                        "install.cache.stale",
                        &format!(
                            "{} Cached {} does not match its checksum, downloading again",
                            char::from(NerdFont::Warning),
                            path.display()
                        ),
                        None,
                    );
                    fs::remove_file(&path).map_err(|e| InstallError::io(&path, e))?;
                }
                _ => {
                    emit(
                        Level::Info,
                        "install.cache.hit",
                        &format!(
                            "{} Using cached {}",
                            char::from(NerdFont::Archive),
                            path.display()
                        ),
                        None,
                    );
                    return Ok(path);
                }
            }
        }

        emit(
            Level::Info,
            "install.download.start",
            &format!("{} Downloading {}", char::from(NerdFont::Download), url),
            Some(serde_json::json!({ "url": url, "path": path })),
        );
        downloader.download(url, &path)?;

        if let Some(expected) = sha256 {
            let actual = sha256_file(&path).map_err(|e| InstallError::io(&path, e))?;
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                let _ = fs::remove_file(&path);
                return Err(DownloadError::Checksum {
                    path,
                    expected: expected.to_string(),
                    actual,
                }
                .into());
            }
        }
        Ok(path)
    }
}

fn checksum_matches(path: &Path, expected: &str) -> Result<bool, InstallError> {
    let actual = sha256_file(path).map_err(|e| InstallError::io(path, e))?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

/// Last path segment of `url` with query and fragment removed.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next()?;
    let rest = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    // Skip the host; a bare host has no file name
    let (_, path) = rest.split_once('/')?;
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}
