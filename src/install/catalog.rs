//! The package catalog: packages, their per-platform variants and presets.
//!
//! The catalog is read once per invocation. The built-in document is
//! compiled into the binary; a user overlay replaces packages and presets
//! by name.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::dispatch::InstallMethod;
use super::error::InstallError;
use super::fallback::FallbackStrategy;
use super::host::Arch;
use super::version::VersionRange;
use crate::common::distro::OperatingSystem;
use crate::common::shell::split_args;

const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub platforms: BTreeMap<String, Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_variant: Option<String>,
    /// Packages installed, in order, before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    /// Where to read about installing by hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Platform {
    /// Type used by variants that do not name their own
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub install_type: Option<String>,
    #[serde(default)]
    pub variants: BTreeMap<String, Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "args_list", skip_serializing_if = "Vec::is_empty")]
    pub install_args: Vec<String>,
}

/// Probe that detects an existing installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub command: String,
    #[serde(default)]
    pub expected_exit_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    User,
    #[serde(alias = "system")]
    Machine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSupportPolicy {
    /// Treat versions newer than every declared range as experimental
    #[serde(default = "default_true")]
    pub forward_compatibility: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VersionSupportPolicy {
    fn default() -> Self {
        Self {
            forward_compatibility: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub install_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Per-architecture URLs keyed `x64`, `x86`, `arm64`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub urls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_to: Option<String>,
    /// Direct downloads only: the artifact is an archive holding `binary`
    #[serde(default)]
    pub extract: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, deserialize_with = "args_list", skip_serializing_if = "Vec::is_empty")]
    pub install_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_install: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repository_setup: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_variant: Option<String>,

    /// `None` means every distribution
    #[serde(default, deserialize_with = "distribution_list", skip_serializing_if = "Option::is_none")]
    pub distributions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<InstallScope>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_version_ranges: Vec<VersionRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_support_policy: Option<VersionSupportPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_strategy: Option<FallbackStrategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packages: Vec<PresetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Accept `["ubuntu", "debian"]` or `{"ubuntu": {...}, "debian": {...}}`.
fn distribution_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Distributions {
        List(Vec<String>),
        Keyed(BTreeMap<String, serde_json::Value>),
    }

    Ok(
        Option::<Distributions>::deserialize(deserializer)?.map(|d| match d {
            Distributions::List(list) => list,
            Distributions::Keyed(map) => map.into_keys().collect(),
        }),
    )
}

/// Accept `["/quiet", "/norestart"]` or `"/quiet /norestart"`.
fn args_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Args {
        List(Vec<String>),
        Line(String),
    }

    Ok(match Option::<Args>::deserialize(deserializer)? {
        Some(Args::List(list)) => list,
        Some(Args::Line(line)) => split_args(&line),
        None => Vec::new(),
    })
}

impl Variant {
    /// The variant's own type, else the platform default.
    pub fn effective_type<'a>(&'a self, platform: &'a Platform) -> Option<&'a str> {
        self.install_type
            .as_deref()
            .or(platform.install_type.as_deref())
    }

    /// URL for `arch`, falling back to the x64 build and then `url`.
    pub fn url_for(&self, arch: Arch) -> Option<&str> {
        self.urls
            .get(arch.key())
            .or_else(|| self.urls.get(Arch::X64.key()))
            .or(self.url.as_ref())
            .map(String::as_str)
    }

    pub fn supports_distribution(&self, os: &OperatingSystem) -> bool {
        match &self.distributions {
            None => true,
            Some(list) => {
                list.iter().any(|d| d.eq_ignore_ascii_case("universal")) || os.is_supported_by(list.as_slice())
            }
        }
    }

    /// Whether this variant carries any version support declaration.
    pub fn declares_version_support(&self) -> bool {
        !self.supported_versions.is_empty() || !self.supported_version_ranges.is_empty()
    }

    pub fn forward_compatible(&self) -> bool {
        self.version_support_policy
            .as_ref()
            .is_none_or(|p| p.forward_compatibility)
    }

    pub fn fallback_strategy(&self) -> FallbackStrategy {
        self.fallback_strategy.unwrap_or_default()
    }

    pub fn scope(&self, name: &str) -> Option<InstallScope> {
        if let Some(scope) = self.scope {
            return Some(scope);
        }
        let name = name.to_ascii_lowercase();
        if name.contains("user") {
            Some(InstallScope::User)
        } else if name.contains("system") || name.contains("machine") {
            Some(InstallScope::Machine)
        } else {
            None
        }
    }
}

impl Package {
    pub fn platform(&self, platform_id: &str) -> Option<&Platform> {
        self.platforms.get(platform_id)
    }
}

impl Platform {
    pub fn variant_names(&self) -> String {
        self.variants.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl Catalog {
    pub fn builtin() -> Result<Self, InstallError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, InstallError> {
        let mut catalog: Self =
            serde_json::from_str(json).map_err(|e| InstallError::InvalidCatalog(e.to_string()))?;
        catalog.fill_names();
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self, InstallError> {
        let json = fs::read_to_string(path).map_err(|e| InstallError::io(path, e))?;
        Self::from_json(&json).map_err(|e| match e {
            InstallError::InvalidCatalog(msg) => {
                InstallError::InvalidCatalog(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Built-in catalog with every existing overlay applied in order.
    pub fn load(overlays: &[&Path]) -> Result<Self, InstallError> {
        let mut catalog = Self::builtin()?;
        for overlay in overlays.iter().filter(|p| p.exists()) {
            catalog.merge(Self::from_file(overlay)?);
        }
        Ok(catalog)
    }

    /// Packages and presets from `overlay` replace same-named entries.
    pub fn merge(&mut self, overlay: Catalog) {
        self.packages.extend(overlay.packages);
        self.presets.extend(overlay.presets);
        if !overlay.version.is_empty() {
            self.version = overlay.version;
        }
    }

    fn fill_names(&mut self) {
        for (key, package) in &mut self.packages {
            if package.name.is_empty() {
                package.name = key.clone();
            }
        }
        for (key, preset) in &mut self.presets {
            if preset.name.is_empty() {
                preset.name = key.clone();
            }
        }
    }

    pub fn package(&self, name: &str) -> Result<&Package, InstallError> {
        self.packages
            .get(name)
            .ok_or_else(|| InstallError::PackageNotFound(name.to_string()))
    }

    /// Problems that would surface only when a variant is used.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (name, package) in &self.packages {
            if package.platforms.is_empty() {
                issues.push(format!("{name}: no platforms"));
            }
            for prerequisite in &package.prerequisites {
                if !self.packages.contains_key(prerequisite) {
                    issues.push(format!("{name}: unknown prerequisite '{prerequisite}'"));
                }
            }
            if let Some(cycle) = self.prerequisite_cycle(name) {
                issues.push(format!("{name}: prerequisite cycle {}", cycle.join(" -> ")));
            }
            if let Some(default) = &package.default_variant
                && !package
                    .platforms
                    .values()
                    .any(|p| p.variants.contains_key(default))
            {
                issues.push(format!("{name}: default variant '{default}' is not defined"));
            }
            for (platform_id, platform) in &package.platforms {
                let at = format!("{name}/{platform_id}");
                for (variant_name, variant) in &platform.variants {
                    let at = format!("{at}/{variant_name}");
                    if let Err(e) = InstallMethod::for_variant(variant_name, variant, platform) {
                        issues.push(format!("{at}: {e}"));
                    }
                    for fallback in &variant.fallback_variants {
                        if !platform.variants.contains_key(fallback) {
                            issues.push(format!("{at}: unknown fallback variant '{fallback}'"));
                        }
                    }
                    if let Some(target) = &variant.redirect_to
                        && !self.packages.contains_key(target)
                    {
                        issues.push(format!("{at}: redirect to unknown package '{target}'"));
                    }
                }
            }
        }

        for (name, preset) in &self.presets {
            for entry in &preset.packages {
                if !self.packages.contains_key(&entry.name) {
                    issues.push(format!("preset {name}: unknown package '{}'", entry.name));
                }
            }
        }

        issues
    }

    /// A prerequisite chain leading from `start` back to itself.
    fn prerequisite_cycle(&self, start: &str) -> Option<Vec<String>> {
        let mut path = vec![start.to_string()];
        let mut visited = BTreeSet::new();
        self.walk_prerequisites(start, start, &mut path, &mut visited)
            .then_some(path)
    }

    fn walk_prerequisites(
        &self,
        start: &str,
        current: &str,
        path: &mut Vec<String>,
        visited: &mut BTreeSet<String>,
    ) -> bool {
        let Some(package) = self.packages.get(current) else {
            return false;
        };
        for prerequisite in &package.prerequisites {
            path.push(prerequisite.clone());
            if prerequisite == start {
                return true;
            }
            if visited.insert(prerequisite.clone())
                && self.walk_prerequisites(start, prerequisite, path, visited)
            {
                return true;
            }
            path.pop();
        }
        false
    }
}
