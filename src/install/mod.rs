//! Install anything: resolve a catalog package to one variant for this
//! host, run it, and recover from failures with fallback variants.

pub mod cache;
pub mod catalog;
pub mod config;
mod dispatch;
pub mod env;
pub mod error;
pub mod exec;
pub mod fallback;
pub mod host;
pub mod list;
mod preset;
pub mod resolve;
mod template;
#[cfg(test)]
mod testing;
pub mod version;

use std::path::Path;

use serde_json::json;

use self::cache::DownloadCache;
use self::catalog::{Catalog, Package, Platform, Variant, Verification};
use self::dispatch::{DispatchContext, DispatchOutcome, InstallMethod, InstallReport};
use self::error::InstallError;
use self::exec::{CommandExecutor, Downloader, OutputMode};
use self::fallback::{FailedAttempt, FallbackDecision, Guidance, Prompter};
use self::host::{HostOs, HostPlatform};
use self::resolve::{Resolution, ResolveRequest, VersionRequest, resolve};
use self::template::{TemplateVars, render};
use self::version::{SupportLevel, classify, classify_with_policy};
use crate::common::paths;
use crate::ui::prelude::*;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub version: Option<VersionRequest>,
    pub method: Option<String>,
    pub variant: Option<String>,
    pub dry_run: bool,
    pub assume_yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
    /// Dry run: resolved and printed, nothing executed
    Planned,
}

/// Whether an attempt may still hand its failure to the fallback manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Fallback,
}

/// How the package being installed was reached.
#[derive(Debug, Clone, Copy, Default)]
struct Route<'c> {
    /// Through a redirect; another one would be a loop
    redirected: bool,
    /// Packages waiting for this one as a prerequisite, outermost first
    dependents: &'c [String],
}

impl Route<'_> {
    fn redirect(self) -> Self {
        Self {
            redirected: true,
            ..self
        }
    }
}

pub struct Installer<'a> {
    pub catalog: &'a Catalog,
    pub host: &'a dyn HostPlatform,
    pub executor: &'a dyn CommandExecutor,
    pub downloader: &'a dyn Downloader,
    pub prompter: &'a dyn Prompter,
    pub cache: &'a DownloadCache,
}

impl Installer<'_> {
    /// Install a package, or every package of a preset.
    pub fn install(&self, name: &str, options: &InstallOptions) -> Result<InstallStatus, InstallError> {
        if self.catalog.packages.contains_key(name) {
            return self.install_package(name, options);
        }
        match self.catalog.presets.get(name) {
            Some(preset) => preset::install(self, preset, options),
            None => {
                emit(
                    Level::Info,
                    "install.hint",
                    &format!(
                        "{} Run `{} list` to see every package and preset",
                        char::from(NerdFont::Lightbulb),
                        env!("CARGO_PKG_NAME")
                    ),
                    None,
                );
                Err(InstallError::PackageNotFound(name.to_string()))
            }
        }
    }

    fn install_package(&self, name: &str, options: &InstallOptions) -> Result<InstallStatus, InstallError> {
        self.install_along(name, options, Route::default())
    }

    fn install_along(
        &self,
        name: &str,
        options: &InstallOptions,
        route: Route<'_>,
    ) -> Result<InstallStatus, InstallError> {
        let request = ResolveRequest {
            version: options.version.as_ref(),
            method: options.method.as_deref(),
            variant: options.variant.as_deref(),
        };
        let resolution =
            resolve(self.catalog, name, self.host, &request).inspect_err(|e| self.report(name, "", e))?;
        emit(
            Level::Info,
            "install.resolve.selected",
            &format!(
                "{} {}: using '{}' ({})",
                char::from(NerdFont::Search),
                resolution.package,
                resolution.variant,
                resolution.reason
            ),
            serde_json::to_value(&resolution).ok(),
        );
        self.install_resolved(&resolution, options, route)
    }

    fn install_resolved(
        &self,
        resolution: &Resolution,
        options: &InstallOptions,
        route: Route<'_>,
    ) -> Result<InstallStatus, InstallError> {
        let package = self.catalog.package(&resolution.package)?;
        let platform = package
            .platform(&resolution.platform)
            .ok_or_else(|| InstallError::PlatformNotSupported {
                package: resolution.package.clone(),
                platform: resolution.platform.clone(),
            })?;

        if let Some(start) = route.dependents.iter().position(|d| *d == package.name) {
            let mut cycle = route.dependents[start..].to_vec();
            cycle.push(package.name.clone());
            let error = InstallError::PrerequisiteCycle(cycle.join(" -> "));
            self.report(&package.name, &resolution.variant, &error);
            return Err(error);
        }

        if options.dry_run {
            return self
                .plan(package, platform, &resolution.variant, route.redirected)
                .inspect_err(|e| self.report(&package.name, &resolution.variant, e));
        }

        if let Some(verification) = &platform.verification
            && self.probe(verification)
        {
            emit(
                Level::Success,
                "install.already_installed",
                &format!("{} {} is already installed", char::from(NerdFont::Check), package.name),
                Some(json!({ "package": package.name })),
            );
            return Ok(InstallStatus::AlreadyInstalled);
        }

        let mut dependents = route.dependents.to_vec();
        dependents.push(package.name.clone());
        let prerequisite_route = Route {
            redirected: false,
            dependents: &dependents,
        };
        for prerequisite in &package.prerequisites {
            let prerequisite_options = InstallOptions {
                assume_yes: options.assume_yes,
                ..InstallOptions::default()
            };
            self.install_along(prerequisite, &prerequisite_options, prerequisite_route)
                .map_err(|e| match e {
                    InstallError::PrerequisiteCycle(_) => e,
                    e => InstallError::PrerequisiteFailed {
                        package: package.name.clone(),
                        prerequisite: prerequisite.clone(),
                        source: Box::new(e),
                    },
                })?;
        }

        self.attempt(package, platform, &resolution.variant, options, Attempt::First, route)
    }

    fn attempt(
        &self,
        package: &Package,
        platform: &Platform,
        variant_name: &str,
        options: &InstallOptions,
        attempt: Attempt,
        route: Route<'_>,
    ) -> Result<InstallStatus, InstallError> {
        // Failures of a fallback attempt are reported by `recover`
        let reported = |error: InstallError| {
            if attempt == Attempt::First {
                self.report(&package.name, variant_name, &error);
            }
            error
        };

        let variant = variant_of(package, platform, variant_name).map_err(&reported)?;
        let method = InstallMethod::for_variant(variant_name, variant, platform).map_err(&reported)?;
        if route.redirected && method == InstallMethod::Redirect {
            return Err(reported(InstallError::RedirectCycle(format!(
                "{} ({}) redirects again",
                package.name, variant_name
            ))));
        }

        let level = self.support_level(variant);
        let dispatched = match level {
            Some(SupportLevel::Unsupported) => Err(InstallError::VersionUnsupported {
                package: package.name.clone(),
                variant: variant_name.to_string(),
                observed: self.host.os_version().unwrap_or_default(),
                level: SupportLevel::Unsupported,
            }),
            Some(SupportLevel::Experimental) => {
                emit(
                    Level::Warn,
                    "install.version.experimental",
                    &format!(
                        "{} {}",
                        char::from(NerdFont::Warning),
                        SupportLevel::Experimental.message(
                            self.host.os().platform_id(),
                            &self.host.os_version().unwrap_or_default()
                        )
                    ),
                    None,
                );
                self.run_strategy(method, package, platform, variant_name, variant)
            }
            _ => self.run_strategy(method, package, platform, variant_name, variant),
        };

        let outcome = match dispatched {
            Ok(outcome) => outcome,
            Err(error) if attempt == Attempt::Fallback => return Err(error),
            Err(error) => {
                return self.recover(package, platform, variant_name, options, error, route);
            }
        };

        match outcome {
            DispatchOutcome::Installed(report) => {
                self.finish(package, platform, variant_name, variant, &report)
                    .map_err(&reported)?;
                Ok(InstallStatus::Installed)
            }
            DispatchOutcome::Redirect { package: target, variant } => {
                let request = ResolveRequest {
                    variant: variant.as_deref(),
                    ..ResolveRequest::default()
                };
                let resolution = resolve(self.catalog, &target, self.host, &request).map_err(&reported)?;
                emit(
                    Level::Info,
                    "install.redirect",
                    &format!(
                        "{} {} is provided by {} ({})",
                        char::from(NerdFont::ArrowRight),
                        package.name,
                        resolution.package,
                        resolution.variant
                    ),
                    None,
                );
                self.install_resolved(&resolution, options, route.redirect())
            }
        }
    }

    fn run_strategy(
        &self,
        method: InstallMethod,
        package: &Package,
        platform: &Platform,
        variant_name: &str,
        variant: &Variant,
    ) -> Result<DispatchOutcome, InstallError> {
        let ctx = DispatchContext {
            host: self.host,
            executor: self.executor,
            downloader: self.downloader,
            cache: self.cache,
            package: &package.name,
            variant_name,
            variant,
            platform,
        };
        dispatch::dispatch(method, &ctx)
    }

    /// Hand a failed first attempt to the fallback manager.
    fn recover(
        &self,
        package: &Package,
        platform: &Platform,
        variant_name: &str,
        options: &InstallOptions,
        error: InstallError,
        route: Route<'_>,
    ) -> Result<InstallStatus, InstallError> {
        let level = platform
            .variants
            .get(variant_name)
            .and_then(|v| self.support_level(v));
        let failed = FailedAttempt {
            package,
            platform,
            variant: variant_name,
            error: &error,
            level,
        };
        match fallback::decide(&failed, options.assume_yes, self.prompter) {
            FallbackDecision::GiveUp(guidance) => {
                guidance.emit();
                Err(error)
            }
            FallbackDecision::Retry { variant } => {
                match self.attempt(package, platform, &variant, options, Attempt::Fallback, route) {
                    Ok(status) => Ok(status),
                    Err(retry_error) => {
                        failed.exhausted(&variant, &retry_error).emit();
                        Err(InstallError::FallbackExhausted {
                            package: package.name.clone(),
                            variant,
                            source: Box::new(retry_error),
                        })
                    }
                }
            }
        }
    }

    /// Tell the user what failed and where to go from here.
    fn report(&self, package: &str, variant: &str, error: &InstallError) {
        let manual_url = self
            .catalog
            .packages
            .get(package)
            .and_then(|p| p.manual_url.clone());
        Guidance::terminal(package, variant, error, manual_url).emit();
    }

    /// Post-install steps and environment after a successful strategy.
    fn finish(
        &self,
        package: &Package,
        platform: &Platform,
        variant_name: &str,
        variant: &Variant,
        report: &InstallReport,
    ) -> Result<(), InstallError> {
        let vars = self.template_vars(variant, report);
        for template in &variant.post_install {
            let command = render(template, &vars);
            emit(
                Level::Info,
                "install.post_install",
                &format!("{} {}", char::from(NerdFont::Wrench), command),
                None,
            );
            match self.executor.run_shell(&command, OutputMode::Inherit) {
                Ok(0) => {}
                Ok(code) => {
                    return Err(InstallError::PostInstallFailed {
                        command,
                        code: Some(code),
                    });
                }
                Err(_) => return Err(InstallError::PostInstallFailed { command, code: None }),
            }
        }

        env::apply(platform, &vars, self.host.os(), self.executor);

        emit(
            Level::Success,
            "install.done",
            &format!(
                "{} Installed {} ({})",
                char::from(NerdFont::Check),
                package.name,
                variant_name
            ),
            Some(json!({
                "package": package.name,
                "variant": variant_name,
                "install_path": report.install_path,
                "downloaded_file": report.downloaded_file,
            })),
        );
        Ok(())
    }

    fn template_vars(&self, variant: &Variant, report: &InstallReport) -> TemplateVars {
        let mut vars = TemplateVars::new();
        let mut put = |key: &str, value: Option<&Path>| {
            if let Some(value) = value {
                vars.insert(key.to_string(), value.display().to_string());
            }
        };
        let requested_install_path = variant.install_path.as_deref().map(paths::expand);
        put(
            "install_path",
            report.install_path.as_deref().or(requested_install_path.as_deref()),
        );
        put("extract_to", report.extract_to.as_deref());
        put(
            "actual_extract_to",
            report.actual_extract_to.as_deref().or(report.extract_to.as_deref()),
        );
        put("downloaded_file", report.downloaded_file.as_deref());

        let needs_sudo = self.host.os() != HostOs::Windows && !self.host.is_elevated();
        vars.insert(
            "sudo_prefix".into(),
            if needs_sudo { "sudo " } else { "" }.to_string(),
        );
        if let Some(release) = self.host.distribution() {
            vars.insert("distribution".into(), release.os.id().to_string());
        }
        if let Some(version) = self.host.os_version() {
            vars.insert("version".into(), version);
        }
        vars
    }

    fn support_level(&self, variant: &Variant) -> Option<SupportLevel> {
        if !variant.declares_version_support() {
            return None;
        }
        let observed = self.host.os_version()?;
        let explicit = &variant.supported_versions;
        let ranges = &variant.supported_version_ranges;
        Some(if variant.forward_compatible() {
            classify(&observed, explicit, ranges)
        } else {
            classify_with_policy(&observed, explicit, ranges, false)
        })
    }

    fn probe(&self, verification: &Verification) -> bool {
        probe(self.executor, verification)
    }

    fn plan(
        &self,
        package: &Package,
        platform: &Platform,
        variant_name: &str,
        redirected: bool,
    ) -> Result<InstallStatus, InstallError> {
        let variant = variant_of(package, platform, variant_name)?;
        let method = InstallMethod::for_variant(variant_name, variant, platform)?;

        if method == InstallMethod::Redirect {
            if redirected {
                return Err(InstallError::RedirectCycle(format!(
                    "{} ({}) redirects again",
                    package.name, variant_name
                )));
            }
            let target = variant
                .redirect_to
                .as_deref()
                .ok_or_else(|| InstallError::MissingField {
                    variant: variant_name.to_string(),
                    install_type: "redirect".to_string(),
                    field: "redirect_to",
                })?;
            if target == package.name {
                return Err(InstallError::RedirectCycle(format!("{target} redirects to itself")));
            }
            let request = ResolveRequest {
                variant: variant.redirect_variant.as_deref(),
                ..ResolveRequest::default()
            };
            let resolution = resolve(self.catalog, target, self.host, &request)?;
            emit(
                Level::Info,
                "install.plan.redirect",
                &format!(
                    "{} {} redirects to {}",
                    char::from(NerdFont::ArrowRight),
                    package.name,
                    target
                ),
                None,
            );
            let target_package = self.catalog.package(&resolution.package)?;
            let target_platform = target_package
                .platform(&resolution.platform)
                .ok_or_else(|| InstallError::PlatformNotSupported {
                    package: resolution.package.clone(),
                    platform: resolution.platform.clone(),
                })?;
            return self.plan(target_package, target_platform, &resolution.variant, true);
        }

        let url = variant.url_for(self.host.arch());
        let mut lines = vec![
            format!("Package:  {}", package.name),
            format!("Platform: {}", self.host.os().platform_id()),
            format!("Variant:  {variant_name}"),
            format!("Method:   {}", method.describe()),
        ];
        if let Some(url) = url {
            lines.push(format!("Source:   {url}"));
        }
        if !variant.packages.is_empty() {
            lines.push(format!("Packages: {}", variant.packages.join(", ")));
        }
        if !package.prerequisites.is_empty() {
            lines.push(format!("Requires: {}", package.prerequisites.join(", ")));
        }
        if let Some(level) = self.support_level(variant) {
            lines.push(format!("Support:  {level} ({})", level.recommended_action()));
        }
        if !variant.fallback_variants.is_empty() {
            lines.push(format!(
                "Fallback: {} ({:?})",
                variant.fallback_variants.join(", "),
                variant.fallback_strategy()
            ));
        }

        emit(
            Level::Info,
            "install.plan",
            &format!(
                "{} Dry run, nothing will be executed",
                char::from(NerdFont::List)
            ),
            Some(json!({
                "package": package.name,
                "platform": self.host.os().platform_id(),
                "variant": variant_name,
                "method": method.describe(),
                "url": url,
                "packages": variant.packages,
                "prerequisites": package.prerequisites,
                "fallback_variants": variant.fallback_variants,
            })),
        );
        for line in lines {
            emit(Level::Info, "install.plan.line", &format!("  {line}"), None);
        }
        Ok(InstallStatus::Planned)
    }
}

/// Run the package's verification probe. `None` when it declares none.
pub fn check(
    catalog: &Catalog,
    host: &dyn HostPlatform,
    executor: &dyn CommandExecutor,
    name: &str,
) -> Result<Option<bool>, InstallError> {
    let package = catalog.package(name)?;
    let platform_id = host.os().platform_id();
    let platform = package
        .platform(platform_id)
        .ok_or_else(|| InstallError::PlatformNotSupported {
            package: name.to_string(),
            platform: platform_id.to_string(),
        })?;
    Ok(platform.verification.as_ref().map(|v| probe(executor, v)))
}

fn probe(executor: &dyn CommandExecutor, verification: &Verification) -> bool {
    // A probe that cannot run means the tool is not there
    matches!(
        executor.run_shell(&verification.command, OutputMode::Silent),
        Ok(code) if code == verification.expected_exit_code
    )
}

fn variant_of<'p>(package: &Package, platform: &'p Platform, name: &str) -> Result<&'p Variant, InstallError> {
    platform
        .variants
        .get(name)
        .ok_or_else(|| InstallError::VariantNotFound {
            package: package.name.clone(),
            variant: name.to_string(),
            available: platform.variant_names(),
        })
}
