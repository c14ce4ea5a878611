use super::manager::install_packages;
use super::{DispatchContext, InstallReport};
use crate::install::error::InstallError;
use crate::install::exec::OutputMode;
use crate::install::template::{TemplateVars, render};
use crate::ui::prelude::*;

/// Run the catalog's repository setup commands, then install the packages
/// through the distribution's own manager.
pub(super) fn install(ctx: &DispatchContext) -> Result<InstallReport, InstallError> {
    if ctx.variant.repository_setup.is_empty() {
        return Err(ctx.missing("repository_setup"));
    }
    if ctx.variant.packages.is_empty() {
        return Err(ctx.missing("packages"));
    }

    let release = ctx.host.distribution();
    let manager = release
        .as_ref()
        .and_then(|r| r.os.native_package_manager())
        .ok_or_else(|| InstallError::CommandNotFound("native package manager".to_string()))?;

    let mut vars = TemplateVars::new();
    if let Some(release) = &release {
        vars.insert("distribution".into(), release.os.id().to_string());
        if let Some(version) = &release.version_id {
            vars.insert("version".into(), version.clone());
        }
    }
    vars.insert(
        "sudo_prefix".into(),
        if ctx.needs_sudo() { "sudo " } else { "" }.to_string(),
    );

    emit(
        Level::Info,
        "install.repository.setup",
        &format!(
            "{} Adding package repository for {}",
            char::from(NerdFont::Link),
            ctx.package
        ),
        None,
    );
    for template in &ctx.variant.repository_setup {
        let command = render(template, &vars);
        match ctx.executor.run_shell(&command, OutputMode::Inherit) {
            Ok(0) => {}
            _ => return Err(InstallError::RepositorySetupFailed(command)),
        }
    }

    install_packages(ctx, manager, &ctx.variant.packages)?;
    Ok(InstallReport::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::catalog::{Platform, Variant};
    use crate::install::testing::{FakeDownloader, FakeHost, RecordingExecutor, cache_in};

    fn variant() -> Variant {
        Variant {
            install_type: Some("repository".into()),
            packages: vec!["docker-ce".into()],
            repository_setup: vec![
                "{sudo_prefix}curl -fsSL https://download.example.com/{distribution}/gpg -o /etc/apt/keyrings/docker.asc".into(),
                "echo 'deb https://download.example.com/{distribution} {version} stable' | {sudo_prefix}tee /etc/apt/sources.list.d/docker.list".into(),
            ],
            ..Variant::default()
        }
    }

    fn run(host: &FakeHost, exec: &RecordingExecutor) -> Result<InstallReport, InstallError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = FakeDownloader::new();
        let cache = cache_in(dir.path());
        let variant = variant();
        let platform = Platform::default();
        let ctx = DispatchContext {
            host,
            executor: exec,
            downloader: &downloader,
            cache: &cache,
            package: "docker",
            variant_name: "repository",
            variant: &variant,
            platform: &platform,
        };
        install(&ctx)
    }

    #[test]
    fn substitutes_distribution_and_installs_natively() {
        let exec = RecordingExecutor::new();
        run(&FakeHost::ubuntu("22.04"), &exec).expect("install");
        let commands = exec.commands();
        assert!(commands[0].starts_with("sudo curl -fsSL https://download.example.com/ubuntu/gpg"));
        assert!(commands[1].contains("deb https://download.example.com/ubuntu 22.04 stable"));
        assert_eq!(
            commands.last().map(String::as_str),
            Some("sudo apt-get install -y docker-ce")
        );
    }

    #[test]
    fn setup_failure_is_repository_setup_failed() {
        let exec = RecordingExecutor::new().with_exit("sudo curl", 22);
        let err = run(&FakeHost::ubuntu("22.04"), &exec).expect_err("setup fails");
        assert!(matches!(err, InstallError::RepositorySetupFailed(_)));
        assert!(err.is_infrastructure_failure());
        assert_eq!(exec.commands().len(), 1);
    }

    #[test]
    fn unknown_distribution_has_no_manager() {
        let exec = RecordingExecutor::new();
        let err = run(&FakeHost::linux_undetected(), &exec).expect_err("no manager");
        assert!(matches!(err, InstallError::CommandNotFound(_)));
    }
}
