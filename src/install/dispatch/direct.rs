use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::archive::extract_archive;
use super::{ArchiveFormat, DispatchContext, InstallReport};
use crate::common::paths;
use crate::install::cache::{CacheClass, file_name_from_url};
use crate::install::error::InstallError;
use crate::ui::prelude::*;

/// Place a single downloaded binary into the install directory. With
/// `extract` set the download is an archive and `binary` is looked up in it.
pub(super) fn install(ctx: &DispatchContext) -> Result<InstallReport, InstallError> {
    let url = ctx.url()?;
    let downloaded = ctx.cache.fetch(
        ctx.downloader,
        CacheClass::Binaries,
        url,
        ctx.variant.sha256.as_deref(),
    )?;

    let binary_name = ctx
        .variant
        .binary
        .clone()
        .or_else(|| file_name_from_url(url).filter(|_| !ctx.variant.extract))
        .unwrap_or_else(|| ctx.package.to_string());

    // Keeps the extraction directory alive until the copy below is done
    let scratch;
    let source = if ctx.variant.extract {
        let format = downloaded
            .file_name()
            .and_then(|n| ArchiveFormat::from_file_name(&n.to_string_lossy()))
            .ok_or_else(|| InstallError::ExtractionFailed {
                archive: downloaded.clone(),
                message: "unrecognized archive format".to_string(),
            })?;
        scratch = tempfile::tempdir().map_err(|e| InstallError::io(std::env::temp_dir(), e))?;
        extract_archive(ctx.executor, ctx.host.os(), format, &downloaded, scratch.path())?;
        find_binary(scratch.path(), &binary_name).ok_or_else(|| InstallError::ExtractionFailed {
            archive: downloaded.clone(),
            message: format!("archive does not contain '{binary_name}'"),
        })?
    } else {
        downloaded.clone()
    };

    let user_bin = ctx.host.user_bin_dir();
    let requested = match ctx.variant.install_path.as_deref() {
        Some(path) => paths::expand(path),
        None => user_bin.clone().ok_or_else(|| ctx.missing("install_path"))?,
    };
    let (target_dir, relocated) = ctx.writable_target(&requested, user_bin.clone())?;
    fs::create_dir_all(&target_dir).map_err(|e| InstallError::io(&target_dir, e))?;

    let target = target_dir.join(&binary_name);
    fs::copy(&source, &target).map_err(|e| InstallError::io(&target, e))?;
    make_executable(&target)?;

    emit(
        Level::Info,
        "install.direct.placed",
        &format!(
            "{} Installed {}",
            char::from(NerdFont::Check),
            target.display()
        ),
        None,
    );

    if relocated || Some(&target_dir) == user_bin.as_ref() {
        ctx.register_on_path(&target_dir);
    }

    Ok(InstallReport {
        downloaded_file: Some(downloaded),
        install_path: Some(target_dir),
        ..InstallReport::default()
    })
}

/// First file named `name` (or `name.exe`) below `root`.
fn find_binary(root: &Path, name: &str) -> Option<PathBuf> {
    let exe = format!("{name}.exe");
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| {
            let file_name = entry.file_name().to_string_lossy();
            file_name == name || file_name == exe.as_str()
        })
        .map(|entry| entry.into_path())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| InstallError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::catalog::{Platform, Variant};
    use crate::install::testing::{FakeDownloader, FakeHost, RecordingExecutor, cache_in};

    #[test]
    fn finds_binary_in_nested_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("tool-1.0").join("bin");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("tool"), b"#!").expect("write");
        fs::write(dir.path().join("README"), b"docs").expect("write");

        assert_eq!(find_binary(dir.path(), "tool"), Some(nested.join("tool")));
        assert_eq!(find_binary(dir.path(), "other"), None);
    }

    #[test]
    fn places_plain_download_into_install_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let install_dir = dir.path().join("opt-bin");
        let host = FakeHost::ubuntu("22.04").with_user_root(dir.path());
        let exec = RecordingExecutor::new();
        let downloader = FakeDownloader::new();
        let cache = cache_in(dir.path());
        let variant = Variant {
            install_type: Some("direct_download".into()),
            url: Some("https://example.com/releases/kubectl?sig=1".into()),
            install_path: Some(install_dir.display().to_string()),
            ..Variant::default()
        };
        let platform = Platform::default();
        let ctx = DispatchContext {
            host: &host,
            executor: &exec,
            downloader: &downloader,
            cache: &cache,
            package: "kubectl",
            variant_name: "binary",
            variant: &variant,
            platform: &platform,
        };

        let report = install(&ctx).expect("install");
        assert_eq!(report.install_path.as_deref(), Some(install_dir.as_path()));
        assert!(install_dir.join("kubectl").exists());
        assert!(host.path_additions().is_empty());
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn defaults_to_user_bin_and_registers_it() {
        let dir = tempfile::tempdir().expect("tempdir");
        let host = FakeHost::ubuntu("22.04").with_user_root(dir.path());
        let exec = RecordingExecutor::new();
        let downloader = FakeDownloader::new();
        let cache = cache_in(dir.path());
        let variant = Variant {
            url: Some("https://example.com/jq-linux64".into()),
            binary: Some("jq".into()),
            ..Variant::default()
        };
        let platform = Platform::default();
        let ctx = DispatchContext {
            host: &host,
            executor: &exec,
            downloader: &downloader,
            cache: &cache,
            package: "jq",
            variant_name: "binary",
            variant: &variant,
            platform: &platform,
        };

        install(&ctx).expect("install");
        let bin = dir.path().join("bin");
        assert!(bin.join("jq").exists());
        assert_eq!(host.path_additions(), vec![bin]);
    }
}
