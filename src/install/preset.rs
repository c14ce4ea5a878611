use serde_json::json;

use super::catalog::Preset;
use super::error::InstallError;
use super::{InstallOptions, InstallStatus, Installer};
use crate::ui::prelude::*;

/// Install the preset's packages in order, stopping at the first failure.
pub(super) fn install(
    installer: &Installer,
    preset: &Preset,
    options: &InstallOptions,
) -> Result<InstallStatus, InstallError> {
    emit(
        Level::Info,
        "install.preset.start",
        &format!(
            "{} Preset {}: {}",
            char::from(NerdFont::Rocket),
            preset.name,
            preset
                .packages
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Some(json!({ "preset": preset.name, "packages": preset.packages })),
    );

    let mut statuses = Vec::with_capacity(preset.packages.len());
    for entry in &preset.packages {
        let entry_options = InstallOptions {
            variant: entry.variant.clone(),
            dry_run: options.dry_run,
            assume_yes: options.assume_yes,
            ..InstallOptions::default()
        };
        let status = installer
            .install_package(&entry.name, &entry_options)
            .map_err(|e| InstallError::PresetFailed {
                preset: preset.name.clone(),
                package: entry.name.clone(),
                source: Box::new(e),
            })?;
        statuses.push(status);
    }

    Ok(if options.dry_run {
        InstallStatus::Planned
    } else if statuses.iter().all(|s| *s == InstallStatus::AlreadyInstalled) {
        InstallStatus::AlreadyInstalled
    } else {
        InstallStatus::Installed
    })
}
