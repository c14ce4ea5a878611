use std::fs;
use std::path::Path;

use super::{ArchiveFormat, DispatchContext, InstallReport};
use crate::common::paths;
use crate::install::cache::CacheClass;
use crate::install::error::InstallError;
use crate::install::exec::{CommandExecutor, OutputMode};
use crate::install::host::HostOs;
use crate::ui::prelude::*;

pub const DEFAULT_EXTRACT_DIR: &str = "./extracted";

impl ArchiveFormat {
    /// Guess the format from an artifact file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else {
            None
        }
    }
}

pub(super) fn install(ctx: &DispatchContext, format: ArchiveFormat) -> Result<InstallReport, InstallError> {
    let url = ctx.url()?;
    let archive = ctx.cache.fetch(
        ctx.downloader,
        CacheClass::Archives,
        url,
        ctx.variant.sha256.as_deref(),
    )?;

    let requested = paths::expand(
        ctx.variant
            .extract_to
            .as_deref()
            .unwrap_or(DEFAULT_EXTRACT_DIR),
    );
    let (target, relocated) =
        ctx.writable_target(&requested, ctx.host.user_package_dir(ctx.package))?;
    fs::create_dir_all(&target).map_err(|e| InstallError::io(&target, e))?;

    emit(
        Level::Info,
        "install.archive.extract",
        &format!(
            "{} Extracting {} to {}",
            char::from(NerdFont::Archive),
            archive.display(),
            target.display()
        ),
        None,
    );
    extract_archive(ctx.executor, ctx.host.os(), format, &archive, &target)?;

    if relocated {
        ctx.register_on_path(&target);
    }

    Ok(InstallReport {
        downloaded_file: Some(archive),
        extract_to: Some(requested),
        actual_extract_to: Some(target.clone()),
        install_path: Some(target),
    })
}

/// Unpack `archive` into `target` with the platform's own tools.
pub fn extract_archive(
    executor: &dyn CommandExecutor,
    os: HostOs,
    format: ArchiveFormat,
    archive: &Path,
    target: &Path,
) -> Result<(), InstallError> {
    let archive_arg = archive.display().to_string();
    let target_arg = target.display().to_string();

    let (program, args): (&str, Vec<String>) = match (format, os) {
        (ArchiveFormat::Zip, HostOs::Windows) => (
            "powershell",
            vec![
                "-NoProfile".into(),
                "-Command".into(),
                format!(
                    "Expand-Archive -Force -LiteralPath '{}' -DestinationPath '{}'",
                    archive_arg.replace('\'', "''"),
                    target_arg.replace('\'', "''")
                ),
            ],
        ),
        (ArchiveFormat::Zip, _) => (
            "unzip",
            vec!["-o".into(), "-q".into(), archive_arg, "-d".into(), target_arg],
        ),
        (ArchiveFormat::TarGz, _) => ("tar", vec!["-xzf".into(), archive_arg, "-C".into(), target_arg]),
        (ArchiveFormat::TarXz, _) => ("tar", vec!["-xJf".into(), archive_arg, "-C".into(), target_arg]),
    };

    let failed = |message: String| InstallError::ExtractionFailed {
        archive: archive.to_path_buf(),
        message,
    };
    match executor.run(program, &args, OutputMode::Inherit) {
        Ok(0) => Ok(()),
        Ok(code) => Err(failed(format!("{program} exited with code {code}"))),
        Err(InstallError::CommandNotFound(_)) => Err(InstallError::CommandNotFound(program.to_string())),
        Err(e) => Err(failed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::{FakeHost, RecordingExecutor};

    #[test]
    fn format_from_file_name() {
        assert_eq!(ArchiveFormat::from_file_name("node.ZIP"), Some(ArchiveFormat::Zip));
        assert_eq!(
            ArchiveFormat::from_file_name("go1.22.linux-amd64.tar.gz"),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(ArchiveFormat::from_file_name("node.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_file_name("tool"), None);
    }

    #[test]
    fn tar_xz_uses_tar() {
        let exec = RecordingExecutor::new();
        extract_archive(
            &exec,
            HostOs::Linux,
            ArchiveFormat::TarXz,
            Path::new("/c/node.tar.xz"),
            Path::new("/opt/node"),
        )
        .expect("extract");
        assert_eq!(exec.commands(), vec!["tar -xJf /c/node.tar.xz -C /opt/node"]);
    }

    #[test]
    fn zip_on_windows_uses_expand_archive() {
        let exec = RecordingExecutor::new();
        extract_archive(
            &exec,
            HostOs::Windows,
            ArchiveFormat::Zip,
            Path::new("C:/cache/tool.zip"),
            Path::new("C:/tools"),
        )
        .expect("extract");
        assert!(exec.commands()[0].starts_with("powershell -NoProfile -Command"));
        assert!(exec.commands()[0].contains("Expand-Archive"));
    }

    #[test]
    fn missing_extractor_is_command_not_found() {
        let exec = RecordingExecutor::new().with_missing("unzip");
        let err = extract_archive(
            &exec,
            HostOs::Linux,
            ArchiveFormat::Zip,
            Path::new("/c/a.zip"),
            Path::new("/t"),
        )
        .expect_err("unzip missing");
        assert!(matches!(err, InstallError::CommandNotFound(ref program) if program == "unzip"));
        assert!(err.is_infrastructure_failure());
    }

    #[test]
    fn unwritable_target_relocates_to_user_dir() {
        use crate::install::catalog::{Platform, Variant};
        use crate::install::testing::{FakeDownloader, cache_in};

        let dir = tempfile::tempdir().expect("tempdir");
        let host = FakeHost::ubuntu("22.04")
            .with_read_only("/opt")
            .with_user_root(dir.path());
        let exec = RecordingExecutor::new();
        let downloader = FakeDownloader::new();
        let cache = cache_in(dir.path());
        let variant = Variant {
            install_type: Some("tar.gz".into()),
            url: Some("https://example.com/go.tar.gz".into()),
            extract_to: Some("/opt/go".into()),
            ..Variant::default()
        };
        let platform = Platform::default();
        let ctx = DispatchContext {
            host: &host,
            executor: &exec,
            downloader: &downloader,
            cache: &cache,
            package: "go",
            variant_name: "tarball",
            variant: &variant,
            platform: &platform,
        };

        let report = install(&ctx, ArchiveFormat::TarGz).expect("install");
        let user_dir = dir.path().join("packages").join("go");
        assert_eq!(report.extract_to.as_deref(), Some(Path::new("/opt/go")));
        assert_eq!(report.actual_extract_to.as_deref(), Some(user_dir.as_path()));
        assert_eq!(host.path_additions(), vec![user_dir]);
        assert_eq!(downloader.urls(), vec!["https://example.com/go.tar.gz"]);
    }
}
