mod common;
mod install;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::install::cache::DownloadCache;
use crate::install::catalog::Catalog;
use crate::install::config::InstallerConfig;
use crate::install::exec::{HttpDownloader, SystemExecutor};
use crate::install::fallback::{AssumeYes, DialoguerPrompter, Prompter};
use crate::install::host::{HostPlatform, SystemHost};
use crate::install::resolve::VersionRequest;
use crate::install::{InstallOptions, Installer, list};
use crate::ui::prelude::*;

/// Install developer tools with the right method for this system
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Catalog file whose packages and presets replace built-in ones
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a package or a preset
    Install(InstallArgs),
    /// List catalog packages and presets
    List,
    /// Check whether a package is already installed
    Check {
        /// Package name
        package: String,
    },
    /// Check the catalog for errors
    Validate,
}

#[derive(Args, Debug)]
struct InstallArgs {
    /// Package or preset name
    name: String,

    /// Installation method (a variant name such as apt, snap or msi)
    #[arg(long, conflicts_with = "variant")]
    method: Option<String>,

    /// Variant to install
    #[arg(long)]
    variant: Option<String>,

    /// latest, prerelease or an exact version
    #[arg(long = "version", value_name = "VERSION")]
    requested_version: Option<String>,

    /// Resolve and print the plan without running anything
    #[arg(long)]
    dry_run: bool,

    /// Show the available installation methods and exit
    #[arg(long)]
    list_methods: bool,

    /// Accept fallback prompts
    #[arg(short = 'y', long)]
    yes: bool,
}

fn main() {
    let cli = Cli::parse();

    ui::set_debug_mode(cli.debug);
    ui::init(cli.output, !cli.no_color);

    if let Err(e) = run(&cli) {
        emit(
            Level::Error,
            "anyinstall.error",
            &format!("{} {:#}", char::from(NerdFont::Cross), e),
            None,
        );
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = InstallerConfig::load().context("loading configuration")?;
    let catalog = load_catalog(&config, cli.catalog.as_deref())?;
    let host = SystemHost::detect();
    emit(
        Level::Debug,
        "anyinstall.host",
        &format!(
            "{} {} {} {}",
            char::from(NerdFont::Info),
            host.os().platform_id(),
            host.arch().key(),
            host.distribution()
                .map(|r| r.os.to_string())
                .or_else(|| host.os_version())
                .unwrap_or_default()
        ),
        None,
    );

    match &cli.command {
        Commands::Install(args) => install(args, &config, &catalog, &host),
        Commands::List => {
            list::print_catalog(&catalog, &host);
            Ok(())
        }
        Commands::Check { package } => check(package, &catalog, &host),
        Commands::Validate => validate(&catalog),
    }
}

fn load_catalog(config: &InstallerConfig, cli_catalog: Option<&Path>) -> Result<Catalog> {
    if let Some(path) = cli_catalog
        && !path.exists()
    {
        bail!("catalog file {} does not exist", path.display());
    }
    let overlays = config.overlays(cli_catalog);
    let overlays: Vec<&Path> = overlays.iter().map(PathBuf::as_path).collect();
    Catalog::load(&overlays).context("loading package catalog")
}

fn install(args: &InstallArgs, config: &InstallerConfig, catalog: &Catalog, host: &SystemHost) -> Result<()> {
    if args.list_methods {
        return list::print_methods(catalog, &args.name, host)
            .with_context(|| format!("listing methods for {}", args.name));
    }

    let executor = SystemExecutor::new(host.os());
    let downloader = HttpDownloader::new(config.download_timeout_secs)
        .context("creating HTTP client")?;
    let cache = DownloadCache::new(config.cache_root());
    emit(
        Level::Debug,
        "install.cache",
        &format!("Download cache at {}", cache.root().display()),
        None,
    );
    let assume_yes = args.yes || config.assume_yes;
    let prompter: &dyn Prompter = if assume_yes { &AssumeYes } else { &DialoguerPrompter };

    let installer = Installer {
        catalog,
        host,
        executor: &executor,
        downloader: &downloader,
        prompter,
        cache: &cache,
    };
    let options = InstallOptions {
        version: args
            .requested_version
            .as_deref()
            .map(|v| v.parse::<VersionRequest>())
            .transpose()?,
        method: args.method.clone(),
        variant: args.variant.clone(),
        dry_run: args.dry_run,
        assume_yes,
    };

    installer
        .install(&args.name, &options)
        .with_context(|| format!("installing {}", args.name))?;
    Ok(())
}

fn check(package: &str, catalog: &Catalog, host: &SystemHost) -> Result<()> {
    let executor = SystemExecutor::new(host.os());
    match crate::install::check(catalog, host, &executor, package)? {
        Some(true) => {
            emit(
                Level::Success,
                "check.installed",
                &format!("{} {package} is installed", char::from(NerdFont::Check)),
                Some(serde_json::json!({ "package": package, "installed": true })),
            );
            Ok(())
        }
        Some(false) => bail!("{package} is not installed"),
        None => {
            emit(
                Level::Warn,
                "check.no_probe",
                &format!(
                    "{} {package} declares no verification command for this platform",
                    char::from(NerdFont::Question)
                ),
                Some(serde_json::json!({ "package": package, "installed": null })),
            );
            Ok(())
        }
    }
}

fn validate(catalog: &Catalog) -> Result<()> {
    let issues = catalog.validate();
    if issues.is_empty() {
        emit(
            Level::Success,
            "catalog.valid",
            &format!(
                "{} Catalog {} is valid: {} packages, {} presets",
                char::from(NerdFont::Check),
                catalog.version,
                catalog.packages.len(),
                catalog.presets.len()
            ),
            None,
        );
        return Ok(());
    }
    for issue in &issues {
        emit(
            Level::Error,
            "catalog.issue",
            &format!("{} {issue}", char::from(NerdFont::Cross)),
            None,
        );
    }
    bail!("catalog has {} problem(s)", issues.len())
}
