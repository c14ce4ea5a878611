//! What happens after an installation attempt fails.
//!
//! The fallback manager never runs anything itself. It decides whether
//! the failure may be answered with another variant and, if not, what the
//! user should be told.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::catalog::{Package, Platform};
use super::error::InstallError;
use super::version::SupportLevel;
use crate::ui::prelude::*;

/// How a variant reacts when its installation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// Retry with the first fallback variant
    Auto,
    /// Ask first; `-y` answers yes
    #[serde(alias = "auto_confirm")]
    AutoWithConfirmation,
    /// List the fallback variants without running any
    #[default]
    Manual,
    /// Only point at manual installation
    Disabled,
}

pub trait Prompter {
    fn confirm(&self, prompt: &str, default: bool) -> bool;
}

/// Asks on the terminal.
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .unwrap_or(false)
    }
}

/// Answers yes without asking.
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, _prompt: &str, _default: bool) -> bool {
        true
    }
}

/// Failures caused by the environment rather than the variant's own
/// commands may be answered with another variant.
pub fn should_trigger_fallback(error: &InstallError, level: Option<SupportLevel>) -> bool {
    level == Some(SupportLevel::Unsupported)
        || matches!(error, InstallError::VersionUnsupported { level, .. } if *level == SupportLevel::Unsupported)
        || error.is_infrastructure_failure()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackOption {
    pub variant: String,
    pub description: String,
    pub command: String,
}

/// The automatic retry that did not work either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryFailure {
    pub variant: String,
    pub reason: String,
}

/// Everything the user needs after a terminal failure.
#[derive(Debug, Clone, Serialize)]
pub struct Guidance {
    pub package: String,
    /// Empty when the failure happened before a variant was chosen
    pub variant: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryFailure>,
    pub options: Vec<FallbackOption>,
    pub manual_url: Option<String>,
}

impl Guidance {
    /// Guidance for a failure no fallback variant answers.
    pub fn terminal(package: &str, variant: &str, error: &InstallError, manual_url: Option<String>) -> Self {
        Self {
            package: package.to_string(),
            variant: variant.to_string(),
            reason: error.to_string(),
            retry: None,
            options: Vec::new(),
            manual_url,
        }
    }

    pub fn render(&self) -> Vec<String> {
        let headline = if self.variant.is_empty() {
            format!("Failed to install {}: {}", self.package, self.reason)
        } else {
            format!(
                "Failed to install {} ({}): {}",
                self.package, self.variant, self.reason
            )
        };
        let mut lines = vec![headline];
        if let Some(retry) = &self.retry {
            lines.push(format!("Fallback '{}' also failed: {}", retry.variant, retry.reason));
        }

        if !self.options.is_empty() {
            lines.push("Alternatives:".to_string());
            for (i, option) in self.options.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, option.command));
                if !option.description.is_empty() {
                    lines.push(format!("     {}", option.description));
                }
            }
        }

        match &self.manual_url {
            Some(url) => lines.push(format!("Manual installation: {url}")),
            None => lines.push(format!(
                "Run `{} install {} --list-methods` to see every method, or install it with your system's package manager.",
                env!("CARGO_PKG_NAME"),
                self.package
            )),
        }
        lines
    }

    pub fn emit(&self) {
        let data = serde_json::to_value(self).ok();
        let mut lines = self.render().into_iter();
        if let Some(headline) = lines.next() {
            emit(
                Level::Error,
                "install.fallback.guidance",
                &format!("{} {}", char::from(NerdFont::Cross), headline),
                data,
            );
        }
        for line in lines {
            emit(Level::Info, "install.fallback.guidance.line", &line, None);
        }
    }
}

#[derive(Debug, Clone)]
pub enum FallbackDecision {
    Retry { variant: String },
    GiveUp(Guidance),
}

/// The failed attempt, as seen by the fallback manager.
pub struct FailedAttempt<'a> {
    pub package: &'a Package,
    pub platform: &'a Platform,
    pub variant: &'a str,
    pub error: &'a InstallError,
    pub level: Option<SupportLevel>,
}

impl FailedAttempt<'_> {
    fn guidance(&self, with_options: bool) -> Guidance {
        let options = if with_options {
            self.options()
        } else {
            Vec::new()
        };
        Guidance {
            options,
            ..Guidance::terminal(
                &self.package.name,
                self.variant,
                self.error,
                self.package.manual_url.clone(),
            )
        }
    }

    /// Guidance once the automatic retry with `retried` failed too. The
    /// options left are the fallbacks that were not tried.
    pub fn exhausted(&self, retried: &str, retry_error: &InstallError) -> Guidance {
        let mut guidance = self.guidance(true);
        guidance.options.retain(|option| option.variant != retried);
        guidance.retry = Some(RetryFailure {
            variant: retried.to_string(),
            reason: retry_error.to_string(),
        });
        guidance
    }

    fn options(&self) -> Vec<FallbackOption> {
        let Some(variant) = self.platform.variants.get(self.variant) else {
            return Vec::new();
        };
        variant
            .fallback_variants
            .iter()
            .filter(|name| name.as_str() != self.variant)
            .filter_map(|name| {
                let fallback = self.platform.variants.get(name)?;
                Some(FallbackOption {
                    variant: name.clone(),
                    description: fallback.description.clone().unwrap_or_default(),
                    command: format!(
                        "{} install {} --variant {}",
                        env!("CARGO_PKG_NAME"),
                        self.package.name,
                        name
                    ),
                })
            })
            .collect()
    }
}

/// Decide how to follow up on `attempt`. Only the first fallback variant
/// is ever retried automatically.
pub fn decide(attempt: &FailedAttempt, assume_yes: bool, prompter: &dyn Prompter) -> FallbackDecision {
    if !should_trigger_fallback(attempt.error, attempt.level) {
        return FallbackDecision::GiveUp(attempt.guidance(false));
    }

    let strategy = attempt
        .platform
        .variants
        .get(attempt.variant)
        .map(|v| v.fallback_strategy())
        .unwrap_or_default();
    let options = attempt.options();

    match strategy {
        FallbackStrategy::Disabled => FallbackDecision::GiveUp(attempt.guidance(false)),
        FallbackStrategy::Manual => FallbackDecision::GiveUp(attempt.guidance(true)),
        FallbackStrategy::Auto | FallbackStrategy::AutoWithConfirmation => {
            let Some(first) = options.first() else {
                return FallbackDecision::GiveUp(attempt.guidance(false));
            };
            if strategy == FallbackStrategy::AutoWithConfirmation && !assume_yes {
                let prompt = format!(
                    "Installing {} with '{}' failed. Try '{}' instead?",
                    attempt.package.name, attempt.variant, first.variant
                );
                if !prompter.confirm(&prompt, true) {
                    return FallbackDecision::GiveUp(attempt.guidance(true));
                }
            }
            emit(
                Level::Warn,
                "install.fallback.auto",
                &format!(
                    "{} {} failed, falling back to '{}'",
                    char::from(NerdFont::Refresh),
                    attempt.variant,
                    first.variant
                ),
                Some(json!({
                    "package": attempt.package.name,
                    "failed_variant": attempt.variant,
                    "fallback_variant": first.variant,
                })),
            );
            FallbackDecision::Retry {
                variant: first.variant.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::catalog::Catalog;
    use crate::install::error::DownloadError;
    use crate::install::testing::FixedPrompter;

    fn catalog(strategy: &str) -> Catalog {
        Catalog::from_json(&format!(
            r#"{{ "packages": {{ "node": {{ "manual_url": "https://nodejs.org/en/download",
                "platforms": {{ "linux": {{ "variants": {{
                    "repo": {{ "type": "repository", "packages": ["nodejs"], "repository_setup": ["true"],
                               "fallback_variants": ["snap", "tarball"], "fallback_strategy": "{strategy}" }},
                    "snap": {{ "type": "snap", "packages": ["node"], "description": "Snap package" }},
                    "tarball": {{ "type": "tar.xz", "url": "https://nodejs.org/node.tar.xz" }}
            }} }} }} }} }} }}"#
        ))
        .expect("test catalog parses")
    }

    fn decide_for(
        catalog: &Catalog,
        error: &InstallError,
        assume_yes: bool,
        prompter: &dyn Prompter,
    ) -> FallbackDecision {
        let package = catalog.package("node").expect("node");
        let attempt = FailedAttempt {
            package,
            platform: package.platform("linux").expect("linux"),
            variant: "repo",
            error,
            level: None,
        };
        decide(&attempt, assume_yes, prompter)
    }

    fn repo_failure() -> InstallError {
        InstallError::RepositorySetupFailed("curl -fsSL https://deb.nodesource.com/setup".into())
    }

    #[test]
    fn trigger_follows_error_category() {
        let timeout = InstallError::DownloadFailed(DownloadError::Timeout {
            url: "https://e.com/a".into(),
            seconds: 30,
        });
        assert!(should_trigger_fallback(&timeout, None));
        assert!(should_trigger_fallback(&InstallError::CommandNotFound("snap".into()), None));

        let run_failed = InstallError::CommandExecutionFailed {
            command: "apt-get install -y nodejs".into(),
            code: Some(100),
        };
        assert!(!should_trigger_fallback(&run_failed, None));
        assert!(should_trigger_fallback(&run_failed, Some(SupportLevel::Unsupported)));
        assert!(!should_trigger_fallback(&run_failed, Some(SupportLevel::Experimental)));

        let unsupported = InstallError::VersionUnsupported {
            package: "node".into(),
            variant: "repo".into(),
            observed: "18.04".into(),
            level: SupportLevel::Unsupported,
        };
        assert!(should_trigger_fallback(&unsupported, None));
    }

    #[test]
    fn auto_retries_first_fallback_once() {
        let prompter = FixedPrompter::answering(false);
        let decision = decide_for(&catalog("auto"), &repo_failure(), false, &prompter);
        assert!(matches!(decision, FallbackDecision::Retry { ref variant } if variant == "snap"));
        assert!(prompter.prompts().is_empty());
    }

    #[test]
    fn confirmation_prompts_unless_assumed() {
        let cat = catalog("auto_with_confirmation");

        let yes = FixedPrompter::answering(true);
        let decision = decide_for(&cat, &repo_failure(), false, &yes);
        assert!(matches!(decision, FallbackDecision::Retry { .. }));
        assert_eq!(yes.prompts().len(), 1);
        assert!(yes.prompts()[0].contains("'snap'"));

        let no = FixedPrompter::answering(false);
        match decide_for(&cat, &repo_failure(), false, &no) {
            FallbackDecision::GiveUp(guidance) => assert_eq!(guidance.options.len(), 2),
            other => panic!("expected guidance, got {other:?}"),
        }

        let never_asked = FixedPrompter::answering(false);
        let decision = decide_for(&cat, &repo_failure(), true, &never_asked);
        assert!(matches!(decision, FallbackDecision::Retry { .. }));
        assert!(never_asked.prompts().is_empty());
    }

    #[test]
    fn manual_lists_options_without_retrying() {
        let prompter = FixedPrompter::answering(true);
        let FallbackDecision::GiveUp(guidance) = decide_for(&catalog("manual"), &repo_failure(), false, &prompter)
        else {
            panic!("manual strategy must not retry");
        };
        assert_eq!(
            guidance.options[0].command,
            "anyinstall install node --variant snap"
        );
        assert_eq!(guidance.options[0].description, "Snap package");

        let lines = guidance.render();
        assert!(lines[0].starts_with("Failed to install node (repo):"));
        assert!(lines.iter().any(|l| l.contains("1. anyinstall install node --variant snap")));
        assert!(lines.iter().any(|l| l.contains("2. anyinstall install node --variant tarball")));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Manual installation: https://nodejs.org/en/download")
        );
    }

    #[test]
    fn disabled_only_points_to_manual_install() {
        let prompter = FixedPrompter::answering(true);
        let FallbackDecision::GiveUp(guidance) =
            decide_for(&catalog("disabled"), &repo_failure(), true, &prompter)
        else {
            panic!("disabled strategy must not retry");
        };
        assert!(guidance.options.is_empty());
        assert_eq!(guidance.manual_url.as_deref(), Some("https://nodejs.org/en/download"));
    }

    #[test]
    fn local_failures_are_reported_not_masked() {
        let disk_full = InstallError::CommandExecutionFailed {
            command: "apt-get install -y nodejs".into(),
            code: Some(100),
        };
        let prompter = FixedPrompter::answering(true);
        let FallbackDecision::GiveUp(guidance) = decide_for(&catalog("auto"), &disk_full, true, &prompter) else {
            panic!("execution failures must not fall back");
        };
        assert!(guidance.reason.contains("exit code 100"));
    }

    #[test]
    fn default_strategy_is_manual() {
        assert_eq!(FallbackStrategy::default(), FallbackStrategy::Manual);
        let parsed: FallbackStrategy = serde_json::from_str("\"auto_confirm\"").expect("alias parses");
        assert_eq!(parsed, FallbackStrategy::AutoWithConfirmation);
    }

    #[test]
    fn guidance_without_manual_url_suggests_listing_methods() {
        let error = InstallError::NoSuitableVariant {
            package: "tool".into(),
            reason: "no variant supports this distribution".into(),
        };
        let lines = Guidance::terminal("tool", "", &error, None).render();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Failed to install tool: "));
        assert!(lines[1].contains("anyinstall install tool --list-methods"));
    }

    #[test]
    fn exhausted_keeps_original_reason_and_untried_options() {
        let cat = catalog("auto");
        let package = cat.package("node").expect("node");
        let original = repo_failure();
        let attempt = FailedAttempt {
            package,
            platform: package.platform("linux").expect("linux"),
            variant: "repo",
            error: &original,
            level: None,
        };
        let snap_failed = InstallError::CommandExecutionFailed {
            command: "sudo snap install node".into(),
            code: Some(1),
        };

        let guidance = attempt.exhausted("snap", &snap_failed);
        assert_eq!(guidance.reason, original.to_string());
        assert_eq!(guidance.options.len(), 1);
        assert_eq!(guidance.options[0].variant, "tarball");

        let lines = guidance.render();
        assert!(lines[0].starts_with("Failed to install node (repo): repository setup failed"));
        assert_eq!(
            lines[1],
            "Fallback 'snap' also failed: command `sudo snap install node` failed with exit code 1"
        );
        assert!(lines.iter().any(|l| l.contains("1. anyinstall install node --variant tarball")));
    }
}
