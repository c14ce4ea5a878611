use super::{DispatchContext, InstallReport, NativeFormat};
use crate::install::cache::CacheClass;
use crate::install::error::InstallError;
use crate::install::exec::OutputMode;
use crate::ui::prelude::*;

pub(super) fn install(ctx: &DispatchContext, format: NativeFormat) -> Result<InstallReport, InstallError> {
    let url = ctx.url()?;
    let file = ctx.cache.fetch(
        ctx.downloader,
        CacheClass::Installers,
        url,
        ctx.variant.sha256.as_deref(),
    )?;
    let file_arg = file.display().to_string();

    emit(
        Level::Info,
        "install.native.run",
        &format!(
            "{} Running installer {}",
            char::from(NerdFont::Gear),
            file.display()
        ),
        None,
    );

    match format {
        NativeFormat::Msi => {
            let mut args = vec!["/i".to_string(), file_arg];
            let extra = ctx.install_args();
            if extra.is_empty() {
                args.extend(["/quiet".to_string(), "/norestart".to_string()]);
            } else {
                args.extend(extra);
            }
            ctx.executor.run_checked("msiexec", &args)?;
        }
        NativeFormat::Exe => {
            ctx.executor.run_checked(&file_arg, &ctx.install_args())?;
        }
        NativeFormat::Deb => install_deb(ctx, file_arg)?,
        NativeFormat::Rpm => {
            let (program, args) = if ctx.executor.command_exists("dnf") {
                ctx.elevated("dnf", vec!["install".into(), "-y".into(), file_arg])
            } else {
                ctx.elevated("rpm", vec!["-Uvh".into(), file_arg])
            };
            ctx.executor.run_checked(&program, &args)?;
        }
    }

    Ok(InstallReport {
        downloaded_file: Some(file),
        ..InstallReport::default()
    })
}

/// `dpkg -i`, repairing missing dependencies with `apt-get install -f`
/// when dpkg leaves the package unconfigured.
fn install_deb(ctx: &DispatchContext, file_arg: String) -> Result<(), InstallError> {
    let (program, args) = ctx.elevated("dpkg", vec!["-i".into(), file_arg]);
    if ctx.executor.run(&program, &args, OutputMode::Inherit)? == 0 {
        return Ok(());
    }

    emit(
        Level::Warn,
        "install.native.deb_fix",
        &format!(
            "{} dpkg reported problems, resolving dependencies with apt-get",
            char::from(NerdFont::Wrench)
        ),
        None,
    );
    let (program, args) = ctx.elevated(
        "apt-get",
        vec!["install".into(), "-f".into(), "-y".into()],
    );
    ctx.executor.run_checked(&program, &args)
}
