//! Variant resolution.
//!
//! Picks exactly one variant of a package for the current host. The order
//! of precedence is version request, method override, variant override,
//! then a per-OS default. Variants live in ordered maps, so the same
//! catalog and host always produce the same answer.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::catalog::{Catalog, InstallScope, Platform, Variant};
use super::dispatch::InstallMethod;
use super::error::InstallError;
use super::host::{HostOs, HostPlatform};

/// Maintained long-term-support releases, most preferred first, for
/// packages whose variants are named after versions.
const LTS_RELEASES: &[u64] = &[21, 17, 11, 8];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    Latest,
    Prerelease,
    Exact(String),
}

impl FromStr for VersionRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Self::Latest,
            "prerelease" | "pre-release" | "beta" => Self::Prerelease,
            _ => Self::Exact(s.trim().to_string()),
        })
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Prerelease => f.write_str("prerelease"),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

/// Why a variant was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SelectionReason {
    VersionRequest(String),
    MethodOverride,
    VariantOverride,
    LongTermSupport,
    DistributionPreference(String),
    DistributionSupport,
    UserScope,
    DefaultVariant,
    PlatformDefault,
    FirstAvailable,
    SnapWithoutDistribution,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionRequest(v) => write!(f, "best match for version '{v}'"),
            Self::MethodOverride => f.write_str("requested method"),
            Self::VariantOverride => f.write_str("requested variant"),
            Self::LongTermSupport => f.write_str("long-term support release"),
            Self::DistributionPreference(m) => write!(f, "preferred method '{m}' for this distribution"),
            Self::DistributionSupport => f.write_str("supports this distribution"),
            Self::UserScope => f.write_str("installs without administrator rights"),
            Self::DefaultVariant => f.write_str("package default"),
            Self::PlatformDefault => f.write_str("platform default"),
            Self::FirstAvailable => f.write_str("first available variant"),
            Self::SnapWithoutDistribution => f.write_str("distribution unknown, using snap"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub package: String,
    pub platform: String,
    pub variant: String,
    pub reason: SelectionReason,
}

/// User overrides that steer resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest<'a> {
    pub version: Option<&'a VersionRequest>,
    pub method: Option<&'a str>,
    pub variant: Option<&'a str>,
}

pub fn resolve(
    catalog: &Catalog,
    package_name: &str,
    host: &dyn HostPlatform,
    request: &ResolveRequest,
) -> Result<Resolution, InstallError> {
    let package = catalog.package(package_name)?;
    let platform_id = host.os().platform_id();
    let platform = package
        .platform(platform_id)
        .ok_or_else(|| InstallError::PlatformNotSupported {
            package: package_name.to_string(),
            platform: platform_id.to_string(),
        })?;

    let selected = |variant: &str, reason: SelectionReason| Resolution {
        package: package_name.to_string(),
        platform: platform_id.to_string(),
        variant: variant.to_string(),
        reason,
    };
    let no_suitable = |reason: &str| InstallError::NoSuitableVariant {
        package: package_name.to_string(),
        reason: reason.to_string(),
    };

    if platform.variants.is_empty() {
        return Err(no_suitable("the catalog lists no variants for this platform"));
    }

    if let Some(version) = request.version {
        return by_version(platform, version)
            .map(|name| selected(name, SelectionReason::VersionRequest(version.to_string())))
            .ok_or_else(|| no_suitable(&format!("no variant can provide version '{version}'")));
    }

    let explicit = request
        .method
        .map(|m| (m, SelectionReason::MethodOverride))
        .or_else(|| request.variant.map(|v| (v, SelectionReason::VariantOverride)));
    if let Some((name, reason)) = explicit {
        if !platform.variants.contains_key(name) {
            return Err(InstallError::VariantNotFound {
                package: package_name.to_string(),
                variant: name.to_string(),
                available: platform.variant_names(),
            });
        }
        return Ok(selected(name, reason));
    }

    let default_variant = package
        .default_variant
        .as_deref()
        .filter(|d| platform.variants.contains_key(*d));

    let choice = match host.os() {
        HostOs::Linux => default_linux(platform, default_variant, host),
        HostOs::Windows => default_windows(platform, default_variant),
        HostOs::Darwin | HostOs::Other => default_other(platform, default_variant),
    };
    choice
        .map(|(name, reason)| selected(name, reason))
        .ok_or_else(|| {
            no_suitable(&match host.distribution() {
                Some(release) => format!("no variant supports {}", release.os),
                None => "no variant matches this system".to_string(),
            })
        })
}

fn method_of(name: &str, variant: &Variant, platform: &Platform) -> Option<InstallMethod> {
    InstallMethod::for_variant(name, variant, platform).ok()
}

/// Tier of a variant; unparseable types sort last.
fn tier(name: &str, variant: &Variant, platform: &Platform) -> u8 {
    method_of(name, variant, platform).map_or(u8::MAX, |m| m.tier())
}

fn by_version<'p>(platform: &'p Platform, request: &VersionRequest) -> Option<&'p str> {
    let variants = platform.variants.iter();
    match request {
        VersionRequest::Latest => variants
            .min_by_key(|(name, v)| (tier(name, v, platform), name.as_str()))
            .map(|(name, _)| name.as_str()),
        VersionRequest::Prerelease => variants
            .min_by_key(|(name, v)| {
                let lower = name.to_ascii_lowercase();
                let signalled = lower.contains("latest") || lower.contains("prerelease");
                (!signalled, tier(name, v, platform), name.as_str())
            })
            .map(|(name, _)| name.as_str()),
        VersionRequest::Exact(wanted) => {
            let wanted = wanted.trim_start_matches('v');
            let labelled = platform
                .variants
                .iter()
                .find(|(_, v)| v.version.trim_start_matches('v') == wanted);
            // Managers install whatever their index carries, so only a
            // concrete artifact can stand in for an unlabelled version
            labelled
                .or_else(|| {
                    platform.variants.iter().find(|(name, v)| {
                        method_of(name, v, platform).is_some_and(|m| m.is_direct_artifact())
                    })
                })
                .map(|(name, _)| name.as_str())
        }
    }
}

/// For packages whose variants are all named by number (`8`, `17`, `21`),
/// the preferred LTS release, else the highest number.
fn numeric_default(platform: &Platform) -> Option<&str> {
    let numbers: Vec<(u64, &str)> = platform
        .variants
        .keys()
        .map(|name| name.parse::<u64>().ok().map(|n| (n, name.as_str())))
        .collect::<Option<_>>()?;
    LTS_RELEASES
        .iter()
        .find_map(|lts| numbers.iter().find(|(n, _)| n == lts))
        .or_else(|| numbers.iter().max_by_key(|(n, _)| *n))
        .map(|(_, name)| *name)
}

fn default_linux<'p>(
    platform: &'p Platform,
    default_variant: Option<&'p str>,
    host: &dyn HostPlatform,
) -> Option<(&'p str, SelectionReason)> {
    if let Some(name) = numeric_default(platform) {
        return Some((name, SelectionReason::LongTermSupport));
    }

    let Some(release) = host.distribution() else {
        if let Some((name, _)) = platform.variants.get_key_value("snap") {
            return Some((name.as_str(), SelectionReason::SnapWithoutDistribution));
        }
        return default_variant.map(|d| (d, SelectionReason::DefaultVariant));
    };
    let os = &release.os;

    for preferred in os.preferred_methods() {
        let by_name = platform
            .variants
            .get_key_value(*preferred)
            .filter(|(_, v)| v.supports_distribution(os));
        let by_type = || {
            platform.variants.iter().find(|(_, v)| {
                v.effective_type(platform) == Some(*preferred) && v.supports_distribution(os)
            })
        };
        if let Some((name, _)) = by_name.or_else(by_type) {
            return Some((
                name.as_str(),
                SelectionReason::DistributionPreference(preferred.to_string()),
            ));
        }
    }

    if let Some((name, _)) = platform
        .variants
        .iter()
        .find(|(_, v)| v.supports_distribution(os))
    {
        return Some((name.as_str(), SelectionReason::DistributionSupport));
    }

    default_variant.map(|d| (d, SelectionReason::DefaultVariant))
}

fn default_windows<'p>(
    platform: &'p Platform,
    default_variant: Option<&'p str>,
) -> Option<(&'p str, SelectionReason)> {
    if let Some(name) = numeric_default(platform) {
        return Some((name, SelectionReason::LongTermSupport));
    }

    let scoped = |wanted: Option<InstallScope>| {
        platform
            .variants
            .iter()
            .find(|(name, v)| v.scope(name) == wanted)
            .map(|(name, _)| name.as_str())
    };

    if let Some(name) = scoped(Some(InstallScope::User)) {
        return Some((name, SelectionReason::UserScope));
    }
    if let Some(name) = default_variant {
        return Some((name, SelectionReason::DefaultVariant));
    }
    for neutral in ["stable", "latest"] {
        if let Some((name, _)) = platform
            .variants
            .get_key_value(neutral)
            .filter(|(name, v)| v.scope(name).is_none())
        {
            return Some((name.as_str(), SelectionReason::PlatformDefault));
        }
    }
    if let Some(name) = scoped(None) {
        return Some((name, SelectionReason::FirstAvailable));
    }
    scoped(Some(InstallScope::Machine)).map(|name| (name, SelectionReason::FirstAvailable))
}

fn default_other<'p>(
    platform: &'p Platform,
    default_variant: Option<&'p str>,
) -> Option<(&'p str, SelectionReason)> {
    if let Some(name) = default_variant {
        return Some((name, SelectionReason::DefaultVariant));
    }
    for conventional in ["default", "standard"] {
        if let Some((name, _)) = platform.variants.get_key_value(conventional) {
            return Some((name.as_str(), SelectionReason::PlatformDefault));
        }
    }
    platform
        .variants
        .keys()
        .next()
        .map(|name| (name.as_str(), SelectionReason::FirstAvailable))
}
