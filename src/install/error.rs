use std::path::PathBuf;
use thiserror::Error;

use super::version::SupportLevel;

/// Failures while fetching an artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("server answered HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("cannot derive a file name from {0}")]
    InvalidUrl(String),

    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to write {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl DownloadError {
    /// Transfer problems are worth retrying through another variant; a local
    /// write failure is not.
    pub fn is_transfer_failure(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// Broad grouping used to decide whether a failure may be answered with
/// another installation variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Package, platform or variant lookup failed
    Resolution,
    /// The host version is outside what the variant supports
    Compatibility,
    /// A source, repository or tool was unreachable or missing
    Infrastructure,
    /// A command ran and failed
    Execution,
    /// The catalog itself is wrong
    Configuration,
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("package '{0}' is not in the catalog")]
    PackageNotFound(String),

    #[error("package '{package}' has no installation for {platform}")]
    PlatformNotSupported { package: String, platform: String },

    #[error("variant '{variant}' not found for package '{package}' (available: {available})")]
    VariantNotFound {
        package: String,
        variant: String,
        available: String,
    },

    #[error("no suitable variant of '{package}' for this system: {reason}")]
    NoSuitableVariant { package: String, reason: String },

    #[error("{package} ({variant}) is {level} on version {observed}")]
    VersionUnsupported {
        package: String,
        variant: String,
        observed: String,
        level: SupportLevel,
    },

    #[error("download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    #[error("failed to extract {}: {message}", .archive.display())]
    ExtractionFailed { archive: PathBuf, message: String },

    #[error("command `{command}` failed{}", .code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    CommandExecutionFailed { command: String, code: Option<i32> },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("{manager} has no package named '{package}'")]
    ManagerPackageNotFound { manager: String, package: String },

    #[error("repository setup failed at `{0}`")]
    RepositorySetupFailed(String),

    #[error("variant '{variant}' of type '{install_type}' needs '{field}'")]
    MissingField {
        variant: String,
        install_type: String,
        field: &'static str,
    },

    #[error("unknown installation type '{install_type}' in variant '{variant}'")]
    UnknownInstallType {
        variant: String,
        install_type: String,
    },

    #[error("redirect loop: {0}")]
    RedirectCycle(String),

    #[error("prerequisite cycle: {0}")]
    PrerequisiteCycle(String),

    #[error("prerequisite '{prerequisite}' of '{package}' failed: {source}")]
    PrerequisiteFailed {
        package: String,
        prerequisite: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("post-install step `{command}` failed")]
    PostInstallFailed { command: String, code: Option<i32> },

    #[error("preset '{preset}' stopped at '{package}': {source}")]
    PresetFailed {
        preset: String,
        package: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("could not install '{package}' ({variant}): {source}")]
    FallbackExhausted {
        package: String,
        variant: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("invalid package catalog: {0}")]
    InvalidCatalog(String),

    #[error("{}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl InstallError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PackageNotFound(_)
            | Self::PlatformNotSupported { .. }
            | Self::VariantNotFound { .. }
            | Self::NoSuitableVariant { .. } => ErrorCategory::Resolution,
            Self::VersionUnsupported { .. } => ErrorCategory::Compatibility,
            Self::DownloadFailed(e) if e.is_transfer_failure() => ErrorCategory::Infrastructure,
            Self::CommandNotFound(_)
            | Self::ManagerPackageNotFound { .. }
            | Self::RepositorySetupFailed(_) => ErrorCategory::Infrastructure,
            Self::MissingField { .. }
            | Self::UnknownInstallType { .. }
            | Self::RedirectCycle(_)
            | Self::PrerequisiteCycle(_)
            | Self::InvalidCatalog(_) => ErrorCategory::Configuration,
            Self::PrerequisiteFailed { source, .. }
            | Self::PresetFailed { source, .. }
            | Self::FallbackExhausted { source, .. } => {
                source.category()
            }
            Self::DownloadFailed(_)
            | Self::ExtractionFailed { .. }
            | Self::CommandExecutionFailed { .. }
            | Self::PostInstallFailed { .. }
            | Self::Io { .. } => ErrorCategory::Execution,
        }
    }

    pub fn is_infrastructure_failure(&self) -> bool {
        self.category() == ErrorCategory::Infrastructure
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
