//! `frostmount`: inspect and mount Frostbite 2013.2 game data from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frostmount_formats::dbobject::DbValue;
use frostmount_formats::header::read_document_body;
use frostmount_formats::toc::TocFile;
use frostmount_storage::vfs::HostFileSystem;
use frostmount_storage::{
    GameLoader, LayoutResolver, LoaderConfig, MountEvent, MountRegistry, Namespace, Strictness,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "frostmount",
    about = "Resolve and mount Frostbite 2013.2 superbundle layouts",
    version,
    author
)]
struct Cli {
    /// Game installation directory
    #[arg(short, long, env = "FROSTMOUNT_GAME_DIR", global = true, default_value = ".")]
    game_dir: PathBuf,

    /// JSON loader configuration
    #[arg(short, long, env = "FROSTMOUNT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Skip unreadable files instead of aborting
    #[arg(long, env = "FROSTMOUNT_LENIENT", global = true)]
    lenient: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover packages and superbundles without mounting
    Layout,

    /// Run a full load
    Mount {
        /// Also mount bundles of superbundles whose name contains this text
        #[arg(short, long, env = "FROSTMOUNT_FILTER")]
        filter: Option<String>,

        /// Mount superbundles in parallel
        #[arg(long, env = "FROSTMOUNT_PARALLEL")]
        parallel: bool,
    },

    /// Print the records of one table of contents file
    Toc {
        /// Path to a `.toc` file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => LoaderConfig::from_path(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    if cli.lenient {
        config = config.with_strictness(Strictness::Lenient);
    }

    match cli.command {
        Commands::Layout => print_layout(&cli.game_dir, &config),
        Commands::Mount { filter, parallel } => {
            mount(&cli.game_dir, config.with_parallel_mount(parallel), filter.as_deref())
        }
        Commands::Toc { path } => print_toc(&path),
    }
}

fn host_fs(game_dir: &Path, config: &LoaderConfig) -> HostFileSystem {
    HostFileSystem::new(config.game_root.clone(), game_dir)
}

fn print_layout(game_dir: &Path, config: &LoaderConfig) -> Result<()> {
    let fs = host_fs(game_dir, config);
    let layout = LayoutResolver::new(&fs, config)
        .discover()
        .context("layout discovery failed")?;

    println!("Data root: {}", layout.data_root);
    println!("Packages ({}):", layout.packages.len());
    for package in &layout.packages {
        let marker = if package.authoritative { " [authoritative]" } else { "" };
        println!("  {} -> {}{marker}", package.name, package.path);
    }
    println!("Superbundles ({}):", layout.superbundles.len());
    for sb in &layout.superbundles {
        let location = sb.base_package.as_deref().unwrap_or("base");
        let patched = if sb.is_patched() { " (patched)" } else { "" };
        println!("  {} [{location}]{patched}", sb.name);
    }
    for fs_entry in &layout.filesystems {
        println!("  fs: {}", fs_entry.path);
    }
    for notice in &layout.notices {
        println!("Notice: {notice:?}");
    }
    Ok(())
}

fn mount(game_dir: &Path, config: LoaderConfig, filter: Option<&str>) -> Result<()> {
    let fs = Arc::new(host_fs(game_dir, &config));
    let surface = Arc::new(MountRegistry::new());
    let loader = GameLoader::new(config, fs, surface.clone()).with_events(Arc::new(
        |event: MountEvent| {
            if let MountEvent::StaleOverlayIgnored { package, .. } = &event {
                info!("Patch package {package} does not match this base and was ignored");
            }
        },
    ));

    let summary = loader.load().context("load failed")?;
    let bundles_mounted = match filter {
        Some(filter) => loader
            .mount_superbundle_bundles(filter)
            .context("bundle mount failed")?,
        None => summary.bundles_mounted,
    };

    println!("Superbundles:       {}", summary.superbundles);
    println!("Bundles discovered: {}", summary.bundles_discovered);
    println!("Bundles mounted:    {bundles_mounted}");
    println!("CAS entries:        {}", summary.catalog_entries);
    for namespace in Namespace::ALL {
        println!("  {namespace:<9} {}", surface.len(namespace));
    }
    Ok(())
}

fn print_toc(path: &Path) -> Result<()> {
    let mut file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let (kind, body) = read_document_body(&mut file).context("unreadable header")?;
    let toc = TocFile::from_object(&DbValue::parse_object(&body)?)?;

    println!("Header: {kind:?}");
    println!("Content-addressed: {}", toc.content_addressed);
    println!("Bundles ({}):", toc.bundles.len());
    for bundle in &toc.bundles {
        let mut flags = String::new();
        if bundle.base {
            flags.push_str(" base");
        }
        if bundle.delta {
            flags.push_str(" delta");
        }
        println!("  {:<60} @{:>10} +{:<8}{flags}", bundle.id, bundle.offset, bundle.size);
    }
    println!("Chunks ({}):", toc.chunks.len());
    for chunk in &toc.chunks {
        println!("  {} @{:>10} +{}", chunk.id, chunk.offset, chunk.size);
    }
    Ok(())
}
