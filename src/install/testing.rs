//! Fakes for the installer's seams, shared by unit tests.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::cache::DownloadCache;
use super::error::{DownloadError, InstallError};
use super::exec::{CommandExecutor, Downloader, OutputMode};
use super::fallback::Prompter;
use super::host::{Arch, HostOs, HostPlatform};
use crate::common::distro::{OperatingSystem, OsRelease};
use crate::common::shell::command_line;

pub struct FakeHost {
    os: HostOs,
    arch: Arch,
    release: Option<OsRelease>,
    os_version: Option<String>,
    elevated: bool,
    read_only: Vec<PathBuf>,
    user_root: PathBuf,
    path_additions: RefCell<Vec<PathBuf>>,
}

impl FakeHost {
    fn new(os: HostOs) -> Self {
        Self {
            os,
            arch: Arch::X64,
            release: None,
            os_version: None,
            elevated: false,
            read_only: Vec::new(),
            user_root: PathBuf::from("/home/tester/.local/share/anyinstall"),
            path_additions: RefCell::new(Vec::new()),
        }
    }

    pub fn linux(os: OperatingSystem, version: &str) -> Self {
        let version_id = (!version.is_empty()).then(|| version.to_string());
        Self {
            release: Some(OsRelease {
                os,
                version_id: version_id.clone(),
            }),
            os_version: version_id,
            ..Self::new(HostOs::Linux)
        }
    }

    pub fn ubuntu(version: &str) -> Self {
        Self::linux(OperatingSystem::Ubuntu, version)
    }

    /// Linux without a readable os-release
    pub fn linux_undetected() -> Self {
        Self::new(HostOs::Linux)
    }

    pub fn windows(version: &str) -> Self {
        Self {
            os_version: Some(version.to_string()),
            ..Self::new(HostOs::Windows)
        }
    }

    pub fn darwin() -> Self {
        Self::new(HostOs::Darwin)
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn with_arch(mut self, arch: Arch) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_read_only(mut self, path: impl Into<PathBuf>) -> Self {
        self.read_only.push(path.into());
        self
    }

    pub fn with_user_root(mut self, root: &Path) -> Self {
        self.user_root = root.to_path_buf();
        self
    }

    pub fn path_additions(&self) -> Vec<PathBuf> {
        self.path_additions.borrow().clone()
    }
}

impl HostPlatform for FakeHost {
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

    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn can_write(&self, path: &Path) -> bool {
        !self.read_only.iter().any(|ro| path.starts_with(ro))
    }

    fn user_bin_dir(&self) -> Option<PathBuf> {
        Some(self.user_root.join("bin"))
    }

    fn user_package_dir(&self, package: &str) -> Option<PathBuf> {
        Some(self.user_root.join("packages").join(package))
    }

    fn add_to_search_path(&self, dir: &Path) -> Result<bool, InstallError> {
        let mut additions = self.path_additions.borrow_mut();
        if additions.iter().any(|d| d == dir) {
            return Ok(false);
        }
        additions.push(dir.to_path_buf());
        Ok(true)
    }
}

/// Records every command line instead of running it. Exit codes default to
/// 0 and can be overridden per command-line prefix.
#[derive(Default)]
pub struct RecordingExecutor {
    commands: RefCell<Vec<String>>,
    exits: Vec<(String, i32)>,
    missing: BTreeSet<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exit(mut self, prefix: &str, code: i32) -> Self {
        self.exits.push((prefix.to_string(), code));
        self
    }

    pub fn with_missing(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    fn exit_for(&self, line: &str) -> i32 {
        self.exits
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0)
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&self, program: &str, args: &[String], _output: OutputMode) -> Result<i32, InstallError> {
        let invoked = if program == "sudo" {
            args.first().map(String::as_str).unwrap_or(program)
        } else {
            program
        };
        if self.missing.contains(invoked) {
            return Err(InstallError::CommandNotFound(invoked.to_string()));
        }
        let line = command_line(program, args);
        let code = self.exit_for(&line);
        self.commands.borrow_mut().push(line);
        Ok(code)
    }

    fn run_shell(&self, script: &str, _output: OutputMode) -> Result<i32, InstallError> {
        let code = self.exit_for(script);
        self.commands.borrow_mut().push(script.to_string());
        Ok(code)
    }

    fn command_exists(&self, program: &str) -> bool {
        !self.missing.contains(program)
    }
}

/// Writes a small payload instead of downloading.
#[derive(Default)]
pub struct FakeDownloader {
    urls: RefCell<Vec<String>>,
    failing: BTreeSet<String>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        self.urls.borrow_mut().push(url.to_string());
        if self.failing.contains(url) {
            return Err(DownloadError::Http {
                status: 404,
                url: url.to_string(),
            });
        }
        let io_err = |e: std::io::Error| DownloadError::Io {
            path: dest.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(dest, b"payload").map_err(io_err)
    }
}

/// Answers every prompt the same way and remembers the questions.
pub struct FixedPrompter {
    answer: bool,
    prompts: RefCell<Vec<String>>,
}

impl FixedPrompter {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl Prompter for FixedPrompter {
    fn confirm(&self, prompt: &str, _default: bool) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answer
    }
}

pub fn cache_in(root: &Path) -> DownloadCache {
    DownloadCache::new(root.join("cache"))
}
