//! The machine being installed on.
//!
//! Everything the resolver and the strategies need to know about the host
//! goes through [`HostPlatform`], so tests can describe any machine.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use duct::cmd;
use serde::Serialize;

use super::error::InstallError;
use crate::common::distro::OsRelease;
use crate::common::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Linux,
    Windows,
    Darwin,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Darwin
        } else {
            Self::Other
        }
    }

    /// Platform key used in the package catalog.
    pub fn platform_id(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    X86,
    Arm64,
    Other,
}

impl Arch {
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "x86_64" => Self::X64,
            "x86" => Self::X86,
            "aarch64" => Self::Arm64,
            _ => Self::Other,
        }
    }

    /// Key used in a variant's `urls` map.
    pub fn key(&self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm64 => "arm64",
            Self::Other => "other",
        }
    }
}

pub trait HostPlatform {
    fn os(&self) -> HostOs;

    fn arch(&self) -> Arch;

    /// Linux distribution, `None` when not on Linux or detection failed.
    fn distribution(&self) -> Option<OsRelease>;

    /// Version compared against variant support declarations.
    fn os_version(&self) -> Option<String>;

    /// Root on Unix, administrator on Windows.
    fn is_elevated(&self) -> bool;

    /// Whether `path`, or the nearest existing ancestor, is writable.
    fn can_write(&self, path: &Path) -> bool;

    fn user_bin_dir(&self) -> Option<PathBuf>;

    fn user_package_dir(&self, package: &str) -> Option<PathBuf>;

    /// Make `dir` part of the user's command search path.
    /// Returns `false` when it already was.
    fn add_to_search_path(&self, dir: &Path) -> Result<bool, InstallError>;
}

/// The real machine, probed once at construction.
pub struct SystemHost {
    os: HostOs,
    arch: Arch,
    release: Option<OsRelease>,
    os_version: Option<String>,
}

impl SystemHost {
    pub fn detect() -> Self {
        let os = HostOs::current();
        let release = match os {
            HostOs::Linux => OsRelease::detect(),
            _ => None,
        };
        let os_version = match os {
            HostOs::Linux => release.as_ref().and_then(|r| r.version_id.clone()),
            HostOs::Windows => windows_version(),
            HostOs::Darwin => macos_version(),
            HostOs::Other => None,
        };
        Self {
            os,
            arch: Arch::current(),
            release,
            os_version,
        }
    }
}

/// "10" or "11", from the build number `ver` reports.
fn windows_version() -> Option<String> {
    let output = cmd!("cmd", "/C", "ver").stderr_null().read().ok()?;
    parse_windows_ver(&output)
}

fn parse_windows_ver(output: &str) -> Option<String> {
    let start = output.find("Version ")? + "Version ".len();
    let version = output[start..].trim_end_matches([']', '\r', '\n', ' ']);
    let mut parts = version.split('.');
    let major = parts.next()?.trim();
    let build: u32 = parts.nth(1)?.trim().parse().ok()?;
    // Windows 11 still reports 10.0 and is told apart by build number
    if major == "10" && build >= 22000 {
        Some("11".to_string())
    } else {
        Some(major.to_string())
    }
}

/// "14.2" from `sw_vers -productVersion`
fn macos_version() -> Option<String> {
    let output = cmd!("sw_vers", "-productVersion").stderr_null().read().ok()?;
    let mut parts = output.trim().split('.');
    let major = parts.next()?;
    let minor = parts.next().unwrap_or("0");
    Some(format!("{major}.{minor}"))
}

fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

impl HostPlatform for SystemHost {
    fn os(&self) -> HostOs {
        self.os
    }

    fn arch(&self) -> Arch {
        self.arch
    }

    fn distribution(&self) -> Option<OsRelease> {
        self.release.clone()
    }

    fn os_version(&self) -> Option<String> {
        self.os_version.clone()
    }

    #[cfg(unix)]
    fn is_elevated(&self) -> bool {
        matches!(sudo::check(), sudo::RunningAs::Root)
    }

    #[cfg(not(unix))]
    fn is_elevated(&self) -> bool {
        // `net session` is refused without administrator rights
        cmd!("net", "session")
            .stdout_null()
            .stderr_null()
            .unchecked()
            .run()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[cfg(unix)]
    fn can_write(&self, path: &Path) -> bool {
        use nix::unistd::{AccessFlags, access};
        nearest_existing(path).is_some_and(|p| access(p, AccessFlags::W_OK).is_ok())
    }

    #[cfg(not(unix))]
    fn can_write(&self, path: &Path) -> bool {
        nearest_existing(path)
            .and_then(|p| fs::metadata(p).ok())
            .is_some_and(|m| !m.permissions().readonly())
    }

    fn user_bin_dir(&self) -> Option<PathBuf> {
        paths::user_bin_dir()
    }

    fn user_package_dir(&self, package: &str) -> Option<PathBuf> {
        paths::user_package_dir(package)
    }

    fn add_to_search_path(&self, dir: &Path) -> Result<bool, InstallError> {
        let on_path = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).any(|entry| entry == dir))
            .unwrap_or(false);
        if on_path {
            return Ok(false);
        }
        match self.os {
            HostOs::Windows => add_to_windows_user_path(dir),
            _ => add_to_profile(dir),
        }
    }
}

fn add_to_windows_user_path(dir: &Path) -> Result<bool, InstallError> {
    let dir = dir.display().to_string().replace('\'', "''");
    let script = format!(
        "$p = [Environment]::GetEnvironmentVariable('Path', 'User'); \
         if (-not (($p -split ';') -contains '{dir}')) {{ \
         [Environment]::SetEnvironmentVariable('Path', \"$p;{dir}\", 'User') }}"
    );
    let status = cmd!("powershell", "-NoProfile", "-Command", &script)
        .unchecked()
        .run()
        .map_err(|e| InstallError::CommandNotFound(format!("powershell ({e})")))?
        .status;
    if !status.success() {
        return Err(InstallError::CommandExecutionFailed {
            command: "powershell SetEnvironmentVariable Path".to_string(),
            code: status.code(),
        });
    }
    Ok(true)
}

fn add_to_profile(dir: &Path) -> Result<bool, InstallError> {
    let Some(home) = dirs::home_dir() else {
        return Err(InstallError::Io {
            path: PathBuf::from("~/.profile"),
            message: "home directory unknown".to_string(),
        });
    };
    append_path_export(&home.join(".profile"), dir)
}

/// Append an `export PATH` line for `dir` unless the profile already has it.
fn append_path_export(profile: &Path, dir: &Path) -> Result<bool, InstallError> {
    let line = format!("export PATH=\"{}:$PATH\"", dir.display());
    let existing = fs::read_to_string(profile).unwrap_or_default();
    if existing.lines().any(|l| l.trim() == line) {
        return Ok(false);
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .map_err(|e| InstallError::io(profile, e))?;
    writeln!(file, "\n# added by anyinstall\n{line}").map_err(|e| InstallError::io(profile, e))?;
    Ok(true)
}
