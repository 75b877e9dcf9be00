//! # libxml2-pkg
//!
//! Build a versioned libxml2 binary package.
//!
//! ## Usage
//!
//! ```bash
//! libxml2-pkg build                   # Fetch, build, merge and package
//! libxml2-pkg fetch                   # Fetch and verify the source only
//! libxml2-pkg smoke-test              # Check a finished package
//! libxml2-pkg info                    # Show version and configure flags
//! libxml2-pkg clean                   # Remove the work directory
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use libxml2_pkg::{fetch_source, FeatureFlags, PipelineOptions, Platform, Recipe, SmokeTest};

#[derive(Parser)]
#[command(name = "libxml2-pkg", about = "Build a versioned libxml2 binary package")]
struct Cli {
    /// Recipe file (defaults to the built-in libxml2 2.9.2 recipe)
    #[arg(long, global = true)]
    recipe: Option<PathBuf>,

    /// Directory for sources, build trees and install prefixes
    #[arg(long, global = true, default_value = "work")]
    work_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, build every architecture, merge and package
    Build {
        /// Installed build-time dependencies, as <deps>/<name>/<version>/
        #[arg(long, default_value = "deps")]
        deps_dir: PathBuf,
        /// Where the package is created; must not exist
        #[arg(long, short, default_value = "package")]
        output: PathBuf,
    },
    /// Download, verify and extract the source
    Fetch,
    /// Build a consumer against a package and check its link table
    SmokeTest {
        #[arg(long, default_value = "package")]
        package: PathBuf,
        /// Compiler for the consumer program
        #[arg(long, default_value = "cc")]
        cc: PathBuf,
    },
    /// Print the package version and configure flags
    Info,
    /// Remove the work directory
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Build { deps_dir, output } => {
            let recipe = load_recipe(cli.recipe.as_deref())?;
            let options = PipelineOptions::new(&cli.work_dir, output).deps_dir(deps_dir);
            let bundle = libxml2_pkg::run(&recipe, &options).context("Packaging failed")?;
            println!(
                "{} {} -> {}",
                bundle.metadata.name,
                bundle.metadata.version,
                bundle.root.display()
            );
        }
        Commands::Fetch => {
            let recipe = load_recipe(cli.recipe.as_deref())?;
            let dir = fetch_source(&recipe, &cli.work_dir).context("Fetch failed")?;
            println!("{}", dir.display());
        }
        Commands::SmokeTest { package, cc } => {
            let report = SmokeTest::new(package, &cli.work_dir.join("test_package"))
                .compiler(cc)
                .run()
                .context("Smoke test failed")?;
            for lib in &report.link_table.libraries {
                println!("  {lib}");
            }
        }
        Commands::Info => {
            let recipe = load_recipe(cli.recipe.as_deref())?;
            print_info(&recipe);
        }
        Commands::Clean => clean(&cli.work_dir)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_recipe(path: Option<&Path>) -> Result<Recipe> {
    match path {
        Some(path) => Recipe::load(path)
            .with_context(|| format!("Failed to load recipe {}", path.display())),
        None => Recipe::builtin().context("Built-in recipe is invalid"),
    }
}

fn print_info(recipe: &Recipe) {
    let platform = Platform::host();
    println!("name:          {}", recipe.package.name);
    println!("version:       {}", recipe.version());
    println!("source:        {}", recipe.source_url());
    println!("sha256:        {}", recipe.source.sha256);
    println!("license:       {}", recipe.package.license);
    println!(
        "architectures: {}",
        recipe
            .build
            .architectures
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "library:       {} (-l{})",
        platform.shared_library_name(&recipe.package.library_base()),
        recipe.build.link_name
    );
    println!("configure:");
    for arg in FeatureFlags::libxml2().configure_args() {
        println!("  {arg}");
    }
}

fn clean(work_dir: &Path) -> Result<()> {
    if !work_dir.exists() {
        info!("Nothing to clean at {}", work_dir.display());
        return Ok(());
    }
    fs::remove_dir_all(work_dir)
        .with_context(|| format!("Failed to remove {}", work_dir.display()))?;
    info!("Removed {}", work_dir.display());
    Ok(())
}
