//! Installer dispatch: one strategy per packaging format.
//!
//! A variant's type tag is parsed into the closed [`InstallMethod`] enum.
//! Unknown tags are a catalog error, never a default action. Strategies do
//! not consult the resolver or the fallback manager; they succeed, fail
//! with an [`InstallError`] or, for redirects, name another package.

mod archive;
mod direct;
mod manager;
mod native;
mod repository;
mod script;

use std::path::{Path, PathBuf};

use super::cache::DownloadCache;
use super::catalog::{Platform, Variant};
use super::error::InstallError;
use super::exec::{CommandExecutor, Downloader};
use super::host::{HostOs, HostPlatform};
use crate::common::package::PackageManager;
use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFormat {
    Msi,
    Exe,
    Deb,
    Rpm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptShell {
    /// PowerShell on Windows, `sh` elsewhere
    Native,
    Posix,
    PowerShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    Archive(ArchiveFormat),
    Manager(PackageManager),
    NativeInstaller(NativeFormat),
    DirectDownload,
    Script(ScriptShell),
    Redirect,
    Repository,
}

impl InstallMethod {
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        let method = match tag.as_str() {
            "zip" => Self::Archive(ArchiveFormat::Zip),
            "tar.gz" | "tgz" => Self::Archive(ArchiveFormat::TarGz),
            "tar.xz" | "txz" => Self::Archive(ArchiveFormat::TarXz),
            "msi" => Self::NativeInstaller(NativeFormat::Msi),
            "exe" => Self::NativeInstaller(NativeFormat::Exe),
            "deb" => Self::NativeInstaller(NativeFormat::Deb),
            "rpm" => Self::NativeInstaller(NativeFormat::Rpm),
            "direct_download" | "binary" => Self::DirectDownload,
            "script" => Self::Script(ScriptShell::Native),
            "shell" | "sh" => Self::Script(ScriptShell::Posix),
            "powershell" => Self::Script(ScriptShell::PowerShell),
            "redirect" => Self::Redirect,
            "repository" => Self::Repository,
            other => Self::Manager(PackageManager::from_tag(other)?),
        };
        Some(method)
    }

    /// Method for a catalog variant, using the platform type when the
    /// variant names none.
    pub fn for_variant(
        variant_name: &str,
        variant: &Variant,
        platform: &Platform,
    ) -> Result<Self, InstallError> {
        let tag = variant.effective_type(platform).unwrap_or_default();
        Self::parse(tag).ok_or_else(|| InstallError::UnknownInstallType {
            variant: variant_name.to_string(),
            install_type: if tag.is_empty() {
                "<none>".to_string()
            } else {
                tag.to_string()
            },
        })
    }

    /// Ranking used for version requests, lower first: a concrete artifact
    /// pins a release, managers install whatever their index carries.
    pub fn tier(&self) -> u8 {
        match self {
            Self::Archive(_) | Self::NativeInstaller(_) | Self::DirectDownload => 0,
            Self::Manager(PackageManager::Snap) => 1,
            Self::Manager(_) => 2,
            Self::Repository | Self::Script(_) | Self::Redirect => 3,
        }
    }

    pub fn is_direct_artifact(&self) -> bool {
        self.tier() == 0
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Archive(ArchiveFormat::Zip) => "Download and extract a ZIP archive".to_string(),
            Self::Archive(_) => "Download and extract a tarball".to_string(),
            Self::Manager(m) => format!("Install via {} package manager", m.display_name()),
            Self::NativeInstaller(NativeFormat::Msi) => "Run the MSI installer".to_string(),
            Self::NativeInstaller(NativeFormat::Exe) => "Run the setup executable".to_string(),
            Self::NativeInstaller(NativeFormat::Deb) => "Install .deb package directly".to_string(),
            Self::NativeInstaller(NativeFormat::Rpm) => "Install .rpm package directly".to_string(),
            Self::DirectDownload => "Download the binary directly".to_string(),
            Self::Script(_) => "Run the vendor install script".to_string(),
            Self::Redirect => "Install through another package".to_string(),
            Self::Repository => "Add the vendor repository, then install".to_string(),
        }
    }
}

/// What a successful strategy produced, fed to post-install templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub downloaded_file: Option<PathBuf>,
    /// Directory the catalog asked for
    pub extract_to: Option<PathBuf>,
    /// Directory actually used, differs after a privilege fallback
    pub actual_extract_to: Option<PathBuf>,
    pub install_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Installed(InstallReport),
    Redirect {
        package: String,
        variant: Option<String>,
    },
}

/// Everything a strategy may use.
pub struct DispatchContext<'a> {
    pub host: &'a dyn HostPlatform,
    pub executor: &'a dyn CommandExecutor,
    pub downloader: &'a dyn Downloader,
    pub cache: &'a DownloadCache,
    pub package: &'a str,
    pub variant_name: &'a str,
    pub variant: &'a Variant,
    pub platform: &'a Platform,
}

impl<'a> DispatchContext<'a> {
    fn missing(&self, field: &'static str) -> InstallError {
        InstallError::MissingField {
            variant: self.variant_name.to_string(),
            install_type: self
                .variant
                .effective_type(self.platform)
                .unwrap_or("<none>")
                .to_string(),
            field,
        }
    }

    fn url(&self) -> Result<&'a str, InstallError> {
        self.variant
            .url_for(self.host.arch())
            .ok_or_else(|| self.missing("url"))
    }

    /// Prefix `sudo` unless already elevated or on Windows.
    fn elevated(&self, program: &str, args: Vec<String>) -> (String, Vec<String>) {
        if self.needs_sudo() {
            let mut full = vec![program.to_string()];
            full.extend(args);
            ("sudo".to_string(), full)
        } else {
            (program.to_string(), args)
        }
    }

    fn needs_sudo(&self) -> bool {
        self.host.os() != HostOs::Windows && !self.host.is_elevated()
    }

    fn install_args(&self) -> Vec<String> {
        if self.variant.install_args.is_empty() {
            self.platform.install_args.clone()
        } else {
            self.variant.install_args.clone()
        }
    }

    /// `requested` if it can be written, otherwise a per-user directory.
    /// The flag is true when the directory was relocated.
    fn writable_target(&self, requested: &Path, user_dir: Option<PathBuf>) -> Result<(PathBuf, bool), InstallError> {
        if self.host.can_write(requested) || self.host.is_elevated() {
            return Ok((requested.to_path_buf(), false));
        }
        let Some(user_dir) = user_dir else {
            return Err(InstallError::Io {
                path: requested.to_path_buf(),
                message: "not writable and no user directory available".to_string(),
            });
        };
        emit(
            Level::Warn,
            "install.dispatch.relocated",
            &format!(
                "{} {} is not writable, installing to {} instead",
                char::from(NerdFont::Lock),
                requested.display(),
                user_dir.display()
            ),
            None,
        );
        Ok((user_dir, true))
    }

    fn register_on_path(&self, dir: &Path) {
        match self.host.add_to_search_path(dir) {
            Ok(true) => emit(
                Level::Info,
                "install.dispatch.path_added",
                &format!(
                    "{} Added {} to your PATH; open a new shell to use it",
                    char::from(NerdFont::Info),
                    dir.display()
                ),
                None,
            ),
            Ok(false) => {}
            Err(e) => emit(
                Level::Warn,
                "install.dispatch.path_failed",
                &format!(
                    "{} Could not add {} to PATH: {}",
                    char::from(NerdFont::Warning),
                    dir.display(),
                    e
                ),
                None,
            ),
        }
    }
}

/// Run the strategy for `method`.
pub fn dispatch(method: InstallMethod, ctx: &DispatchContext) -> Result<DispatchOutcome, InstallError> {
    emit(
        Level::Debug,
        "install.dispatch.start",
        &format!(
            "{} {} via {:?}",
            char::from(NerdFont::Gear),
            ctx.package,
            method
        ),
        None,
    );
    let report = match method {
        InstallMethod::Archive(format) => archive::install(ctx, format)?,
        InstallMethod::Manager(manager) => manager::install(ctx, manager)?,
        InstallMethod::NativeInstaller(format) => native::install(ctx, format)?,
        InstallMethod::DirectDownload => direct::install(ctx)?,
        InstallMethod::Script(shell) => script::install(ctx, shell)?,
        InstallMethod::Repository => repository::install(ctx)?,
        InstallMethod::Redirect => return redirect(ctx),
    };
    Ok(DispatchOutcome::Installed(report))
}

fn redirect(ctx: &DispatchContext) -> Result<DispatchOutcome, InstallError> {
    let target = ctx
        .variant
        .redirect_to
        .as_ref()
        .ok_or_else(|| ctx.missing("redirect_to"))?;
    if target == ctx.package {
        return Err(InstallError::RedirectCycle(format!(
            "{} redirects to itself",
            ctx.package
        )));
    }
    Ok(DispatchOutcome::Redirect {
        package: target.clone(),
        variant: ctx.variant.redirect_variant.clone(),
    })
}
