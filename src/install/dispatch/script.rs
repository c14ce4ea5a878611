use super::{DispatchContext, InstallReport, ScriptShell};
use crate::install::error::InstallError;
use crate::install::exec::OutputMode;
use crate::install::host::HostOs;
use crate::ui::prelude::*;

pub(super) fn install(ctx: &DispatchContext, shell: ScriptShell) -> Result<InstallReport, InstallError> {
    let script = ctx
        .variant
        .install_script
        .as_deref()
        .ok_or_else(|| ctx.missing("install_script"))?;

    let use_powershell = match shell {
        ScriptShell::PowerShell => true,
        ScriptShell::Posix => false,
        ScriptShell::Native => ctx.host.os() == HostOs::Windows,
    };

    emit(
        Level::Info,
        "install.script.run",
        &format!(
            "{} Running install script for {}",
            char::from(NerdFont::Terminal),
            ctx.package
        ),
        None,
    );

    let code = if use_powershell {
        let args = [
            "-NoProfile",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script,
        ]
        .map(String::from);
        ctx.executor.run("powershell", &args, OutputMode::Inherit)?
    } else {
        let args = ["-c", script].map(String::from);
        ctx.executor.run("sh", &args, OutputMode::Inherit)?
    };

    if code != 0 {
        return Err(InstallError::CommandExecutionFailed {
            command: format!("install script for {}", ctx.package),
            code: Some(code),
        });
    }
    Ok(InstallReport::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::catalog::{Platform, Variant};
    use crate::install::testing::{FakeDownloader, FakeHost, RecordingExecutor, cache_in};

    fn run(host: &FakeHost, exec: &RecordingExecutor, shell: ScriptShell) -> Result<InstallReport, InstallError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = FakeDownloader::new();
        let cache = cache_in(dir.path());
        let variant = Variant {
            install_script: Some("curl -fsSL https://get.example.sh | sh".into()),
            ..Variant::default()
        };
        let platform = Platform::default();
        let ctx = DispatchContext {
            host,
            executor: exec,
            downloader: &downloader,
            cache: &cache,
            package: "tool",
            variant_name: "script",
            variant: &variant,
            platform: &platform,
        };
        install(&ctx, shell)
    }

    #[test]
    fn native_script_uses_sh_on_linux() {
        let exec = RecordingExecutor::new();
        run(&FakeHost::ubuntu("22.04"), &exec, ScriptShell::Native).expect("runs");
        assert_eq!(
            exec.commands(),
            vec!["sh -c 'curl -fsSL https://get.example.sh | sh'"]
        );
    }

    #[test]
    fn native_script_uses_powershell_on_windows() {
        let exec = RecordingExecutor::new();
        run(&FakeHost::windows("11"), &exec, ScriptShell::Native).expect("runs");
        assert!(exec.commands()[0].starts_with("powershell -NoProfile -ExecutionPolicy Bypass -Command"));
    }

    #[test]
    fn failing_script_is_execution_failure() {
        let exec = RecordingExecutor::new().with_exit("sh -c", 2);
        let err = run(&FakeHost::ubuntu("22.04"), &exec, ScriptShell::Posix).expect_err("fails");
        assert!(matches!(err, InstallError::CommandExecutionFailed { code: Some(2), .. }));
    }
}
