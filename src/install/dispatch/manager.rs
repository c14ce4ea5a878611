use super::{DispatchContext, InstallReport};
use crate::common::package::PackageManager;
use crate::common::shell::command_line;
use crate::install::error::InstallError;
use crate::install::exec::OutputMode;
use crate::ui::prelude::*;

pub(super) fn install(ctx: &DispatchContext, manager: PackageManager) -> Result<InstallReport, InstallError> {
    if ctx.variant.packages.is_empty() {
        return Err(ctx.missing("packages"));
    }
    install_packages(ctx, manager, &ctx.variant.packages)?;
    Ok(InstallReport::default())
}

/// Refresh, check and install `packages` with `manager`.
pub(super) fn install_packages(
    ctx: &DispatchContext,
    manager: PackageManager,
    packages: &[String],
) -> Result<(), InstallError> {
    if !ctx.executor.command_exists(manager.binary()) {
        return Err(InstallError::CommandNotFound(manager.binary().to_string()));
    }
    let elevate = manager.is_system_wide();

    if let Some(update) = manager.update_command() {
        let args: Vec<String> = update[1..].iter().map(|a| a.to_string()).collect();
        let (program, args) = if elevate {
            ctx.elevated(update[0], args)
        } else {
            (update[0].to_string(), args)
        };
        let outcome = ctx.executor.run(&program, &args, OutputMode::Inherit);
        if !matches!(outcome, Ok(0)) {
            // A stale index is still usable
            emit(
                Level::Warn,
                "install.manager.update_failed",
                &format!(
                    "{} `{}` failed, continuing with the current package index",
                    char::from(NerdFont::Warning),
                    command_line(&program, &args)
                ),
                None,
            );
        }
    }

    for package in packages {
        let Some((program, args)) = manager.availability_check(package) else {
            continue;
        };
        if ctx.executor.run(program, &args, OutputMode::Silent)? != 0 {
            return Err(InstallError::ManagerPackageNotFound {
                manager: manager.display_name().to_string(),
                package: package.clone(),
            });
        }
    }

    let (program, base) = manager.install_command();
    let batches: Vec<&[String]> = if manager.installs_one_at_a_time() {
        packages.chunks(1).collect()
    } else {
        vec![packages]
    };
    for batch in batches {
        let mut args: Vec<String> = base.iter().map(|a| a.to_string()).collect();
        args.extend(ctx.variant.install_args.iter().cloned());
        args.extend(batch.iter().cloned());
        let (program, args) = if elevate {
            ctx.elevated(program, args)
        } else {
            (program.to_string(), args)
        };

        emit(
            Level::Info,
            "install.manager.install",
            &format!(
                "{} Installing {} with {}",
                char::from(NerdFont::Package),
                batch.join(", "),
                manager.display_name()
            ),
            None,
        );
        ctx.executor.run_checked(&program, &args)?;
    }
    Ok(())
}
