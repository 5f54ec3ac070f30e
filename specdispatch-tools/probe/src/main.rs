//! Probe Binary
//!
//! Run with: `probe [OPTIONS] <COMMAND>`

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use specdispatch::DispatchConfig;
use specdispatch_probe::{select, Manifest};

#[derive(Parser)]
#[command(name = "probe")]
#[command(about = "Exercise constraint dispatch tables described by package manifests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Call a method and print what it returns
    Call {
        /// Package manifest
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Method to call
        method: String,

        /// Build the package with this spec instead of the manifest's
        #[arg(short, long, env = "PROBE_SPEC")]
        spec: Option<String>,
    },
    /// Print every method definition of a manifest
    Show {
        /// Package manifest
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
    /// Print the default configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Commands::Call {
            manifest,
            method,
            spec,
        } => call(manifest, method, spec.as_deref()),
        Commands::Show { manifest } => show(manifest),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&DispatchConfig::default())?);
            Ok(())
        }
    }
}

fn load(path: &Path) -> Result<Manifest> {
    debug!("Loading: {}", path.display());
    Manifest::load(path).with_context(|| format!("Failed to load manifest: {}", path.display()))
}

fn call(path: &Path, method: &str, spec: Option<&str>) -> Result<()> {
    let manifest = load(path)?;
    let loaded = manifest
        .build(spec)
        .with_context(|| format!("Failed to build package from {}", path.display()))?;

    match select(&loaded.methods, &loaded.package, method) {
        Ok(selection) => {
            match &selection.constraint {
                Some(constraint) => info!("{} resolved via `{}`", method, constraint),
                None => info!("{} resolved to the default", method),
            }
            println!("{}", selection.output);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn show(path: &Path) -> Result<()> {
    let manifest = load(path)?;
    let loaded = manifest
        .build(None)
        .with_context(|| format!("Failed to build package from {}", path.display()))?;

    println!("package {}", loaded.package.spec());
    for (name, definition) in loaded.methods.iter() {
        println!("{}: {}", name, definition);
    }
    Ok(())
}
