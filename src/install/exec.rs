//! Process execution and downloads.
//!
//! Strategies talk to the outside world only through [`CommandExecutor`] and
//! [`Downloader`]. The system implementations use `duct` and blocking
//! `reqwest`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use duct::cmd;

use super::error::{DownloadError, InstallError};
use super::host::HostOs;
use crate::common::progress;
use crate::common::shell::command_line;
use crate::ui::prelude::*;

/// Where a command's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Stream to the user's terminal
    Inherit,
    /// Discard; only the exit code matters
    Silent,
}

pub trait CommandExecutor {
    /// Run `program` and return its exit code. Spawn failures are errors,
    /// non-zero exits are not.
    fn run(&self, program: &str, args: &[String], output: OutputMode) -> Result<i32, InstallError>;

    /// Run a command line through the platform shell (`sh -c` / `cmd /C`).
    fn run_shell(&self, script: &str, output: OutputMode) -> Result<i32, InstallError>;

    fn command_exists(&self, program: &str) -> bool;

    /// Run `program`, turning a non-zero exit into `CommandExecutionFailed`.
    fn run_checked(&self, program: &str, args: &[String]) -> Result<(), InstallError> {
        let code = self.run(program, args, OutputMode::Inherit)?;
        if code != 0 {
            return Err(InstallError::CommandExecutionFailed {
                command: command_line(program, args),
                code: Some(code),
            });
        }
        Ok(())
    }
}

pub struct SystemExecutor {
    os: HostOs,
}

impl SystemExecutor {
    pub fn new(os: HostOs) -> Self {
        Self { os }
    }

    fn finish(expression: duct::Expression, label: &str, output: OutputMode) -> Result<i32, InstallError> {
        let expression = match output {
            OutputMode::Inherit => expression,
            OutputMode::Silent => expression.stdout_null().stderr_null(),
        };
        emit(
            Level::Debug,
            "install.exec.run",
            &format!("{} {}", char::from(NerdFont::Terminal), label),
            None,
        );
        match expression.unchecked().run() {
            // Killed by a signal when there is no code
            Ok(out) => Ok(out.status.code().unwrap_or(-1)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(InstallError::CommandNotFound(label.to_string()))
            }
            Err(e) => Err(InstallError::CommandExecutionFailed {
                command: format!("{label} ({e})"),
                code: None,
            }),
        }
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[String], output: OutputMode) -> Result<i32, InstallError> {
        let label = command_line(program, args);
        Self::finish(cmd(program, args), &label, output)
    }

    fn run_shell(&self, script: &str, output: OutputMode) -> Result<i32, InstallError> {
        let expression = match self.os {
            HostOs::Windows => cmd!("cmd", "/C", script),
            _ => cmd!("sh", "-c", script),
        };
        Self::finish(expression, script, output)
    }

    fn command_exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

pub trait Downloader {
    /// Fetch `url` into `dest`. `dest` only appears once complete.
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError>;
}

pub struct HttpDownloader {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpDownloader {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("anyinstall/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    fn map_request_error(&self, url: &str, e: reqwest::Error) -> DownloadError {
        if e.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                seconds: self.timeout_secs,
            }
        } else {
            DownloadError::Network {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let io_err = |path: &Path, e: io::Error| DownloadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.map_request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let part = partial_path(dest);
        let file = fs::File::create(&part).map_err(|e| io_err(&part, e))?;

        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let pb = progress::create_download_bar(
            response.content_length(),
            format!("{} {}", char::from(NerdFont::Download), name),
        );
        let mut writer = pb.wrap_write(file);

        let copied = io::copy(&mut response, &mut writer);
        pb.finish_and_clear();
        if let Err(e) = copied {
            let _ = fs::remove_file(&part);
            return Err(match e.kind() {
                io::ErrorKind::TimedOut => DownloadError::Timeout {
                    url: url.to_string(),
                    seconds: self.timeout_secs,
                },
                // Reading the body failed as opposed to writing it
                io::ErrorKind::Other | io::ErrorKind::ConnectionReset | io::ErrorKind::UnexpectedEof => {
                    DownloadError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
                _ => io_err(&part, e),
            });
        }

        fs::rename(&part, dest).map_err(|e| io_err(dest, e))?;
        Ok(())
    }
}
