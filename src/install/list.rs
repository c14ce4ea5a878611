//! `list` and `install --list-methods` output.

use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use serde_json::json;

use super::catalog::Catalog;
use super::dispatch::InstallMethod;
use super::error::InstallError;
use super::host::HostPlatform;
use super::resolve::{ResolveRequest, resolve};
use crate::ui::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRow {
    pub variant: String,
    pub install_type: String,
    pub description: String,
    pub preferred: bool,
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

pub fn print_catalog(catalog: &Catalog, host: &dyn HostPlatform) {
    let platform_id = host.os().platform_id();

    if matches!(get_output_format(), OutputFormat::Json) {
        let packages: Vec<_> = catalog
            .packages
            .values()
            .map(|p| {
                json!({
                    "name": p.name,
                    "description": p.description,
                    "platforms": p.platforms.keys().collect::<Vec<_>>(),
                    "available": p.platform(platform_id).is_some(),
                })
            })
            .collect();
        emit(
            Level::Info,
            "install.list",
            &format!("{} {} packages", char::from(NerdFont::List), packages.len()),
            Some(json!({ "packages": packages, "presets": catalog.presets })),
        );
        return;
    }

    let mut packages = table(&["Package", "Description", "Platforms"]);
    for package in catalog.packages.values() {
        let platforms = package
            .platforms
            .keys()
            .map(|id| {
                if id == platform_id {
                    format!("{id}*")
                } else {
                    id.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        packages.add_row(vec![
            Cell::new(&package.name),
            Cell::new(&package.description),
            Cell::new(platforms),
        ]);
    }
    println!("{packages}");

    if !catalog.presets.is_empty() {
        separator(true);
        let mut presets = table(&["Preset", "Description", "Packages"]);
        for preset in catalog.presets.values() {
            let names = preset
                .packages
                .iter()
                .map(|e| match &e.variant {
                    Some(v) => format!("{} ({v})", e.name),
                    None => e.name.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            presets.add_row(vec![
                Cell::new(&preset.name),
                Cell::new(&preset.description),
                Cell::new(names),
            ]);
        }
        println!("{presets}");
    }
    println!("* available on this system");
}

/// Variants of `name` for this host; the one the resolver would pick is
/// marked preferred.
pub fn methods(catalog: &Catalog, name: &str, host: &dyn HostPlatform) -> Result<Vec<MethodRow>, InstallError> {
    let package = catalog.package(name)?;
    let platform_id = host.os().platform_id();
    let platform = package
        .platform(platform_id)
        .ok_or_else(|| InstallError::PlatformNotSupported {
            package: name.to_string(),
            platform: platform_id.to_string(),
        })?;
    let preferred = resolve(catalog, name, host, &ResolveRequest::default())
        .ok()
        .map(|r| r.variant);

    Ok(platform
        .variants
        .iter()
        .map(|(variant_name, variant)| MethodRow {
            variant: variant_name.clone(),
            install_type: variant
                .effective_type(platform)
                .unwrap_or("<none>")
                .to_string(),
            description: variant.description.clone().unwrap_or_else(|| {
                InstallMethod::for_variant(variant_name, variant, platform)
                    .map(|m| m.describe())
                    .unwrap_or_default()
            }),
            preferred: preferred.as_deref() == Some(variant_name.as_str()),
        })
        .collect())
}

pub fn print_methods(catalog: &Catalog, name: &str, host: &dyn HostPlatform) -> Result<(), InstallError> {
    let rows = methods(catalog, name, host)?;

    if matches!(get_output_format(), OutputFormat::Json) {
        emit(
            Level::Info,
            "install.methods",
            &format!("{} {} methods for {name}", char::from(NerdFont::List), rows.len()),
            Some(json!({ "package": name, "methods": rows })),
        );
        return Ok(());
    }

    let mut methods = table(&["Variant", "Type", "Description"]);
    for row in &rows {
        let variant = if row.preferred {
            format!("{} (preferred)", row.variant)
        } else {
            row.variant.clone()
        };
        methods.add_row(vec![
            Cell::new(variant),
            Cell::new(&row.install_type),
            Cell::new(&row.description),
        ]);
    }
    println!("{methods}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::FakeHost;

    #[test]
    fn marks_resolver_choice_preferred() {
        let catalog = Catalog::from_json(
            r#"{ "packages": { "node": { "platforms": { "linux": { "variants": {
                "apt": { "type": "apt", "packages": ["nodejs"], "description": "Distribution package" },
                "snap": { "type": "snap", "packages": ["node"] } } } } } } }"#,
        )
        .expect("catalog");
        let rows = methods(&catalog, "node", &FakeHost::ubuntu("22.04")).expect("rows");
        assert_eq!(rows.len(), 2);
        assert!(rows[0].preferred);
        assert_eq!(rows[0].description, "Distribution package");
        assert!(!rows[1].preferred);
        assert_eq!(rows[1].install_type, "snap");
        assert!(!rows[1].description.is_empty());
    }

    #[test]
    fn missing_platform_is_an_error() {
        let catalog = Catalog::from_json(
            r#"{ "packages": { "node": { "platforms": { "linux": { "variants": {
                "snap": { "type": "snap", "packages": ["node"] } } } } } } }"#,
        )
        .expect("catalog");
        assert!(matches!(
            methods(&catalog, "node", &FakeHost::windows("11")),
            Err(InstallError::PlatformNotSupported { .. })
        ));
    }
}
