//! End-to-end packaging run.
//!
//! Fetch -> resolve toolchain -> (configure, build, install) per arch ->
//! merge -> package. Each step consumes the filesystem output of the one
//! before it; the first failure ends the run.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::build::{BuildTarget, Builder, InstalledTarget};
use crate::error::Result;
use crate::fetch::fetch_source;
use crate::merge::merge;
use crate::package::{package, ArtifactBundle};
use crate::platform::Platform;
use crate::recipe::Recipe;
use crate::toolchain::Toolchain;

/// Filesystem locations for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub work_dir: PathBuf,
    pub deps_dir: PathBuf,
    pub package_dir: PathBuf,
    pub platform: Platform,
}

impl PipelineOptions {
    pub fn new(work_dir: impl Into<PathBuf>, package_dir: impl Into<PathBuf>) -> Self {
        PipelineOptions {
            work_dir: work_dir.into(),
            deps_dir: PathBuf::from("deps"),
            package_dir: package_dir.into(),
            platform: Platform::host(),
        }
    }

    pub fn deps_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.deps_dir = dir.into();
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

/// Run the whole pipeline for `recipe`.
pub fn run(recipe: &Recipe, options: &PipelineOptions) -> Result<ArtifactBundle> {
    info!(
        "Packaging {} {} for {}",
        recipe.package.name,
        recipe.version(),
        options.platform
    );

    let source_dir = fetch_source(recipe, &options.work_dir)?;
    let toolchain = Toolchain::resolve(&recipe.toolchain, &options.deps_dir, options.platform)?;

    let targets = BuildTarget::plan(recipe, options.platform, &toolchain, &options.work_dir)?;
    let installed = build_all(&source_dir, &toolchain, &recipe.build.make, &targets)?;

    let library_name = options
        .platform
        .shared_library_name(&recipe.package.library_base());
    let output = merge(&installed, options.platform, &library_name, &options.work_dir)?;

    package(recipe, &output, &source_dir, options.platform, &options.package_dir)
}

fn build_all(
    source_dir: &Path,
    toolchain: &Toolchain,
    make: &str,
    targets: &[BuildTarget],
) -> Result<Vec<InstalledTarget>> {
    let builder = Builder::new(source_dir, toolchain, make)?;
    targets.iter().map(|t| builder.build(t)).collect()
}
