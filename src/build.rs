//! Per-architecture configure, build and install.
//!
//! Each architecture gets its own build directory and install prefix under
//! the work directory, so outputs never collide and the merge step can read
//! them side by side.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::error::{BuildStep, PackageError, Result};
use crate::features::FeatureFlags;
use crate::platform::{Arch, Platform};
use crate::recipe::Recipe;
use crate::toolchain::Toolchain;

/// One architecture's build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub arch: Arch,
    /// Set only when cross-compiling.
    pub host_triple: Option<String>,
    pub build_dir: PathBuf,
    pub prefix: PathBuf,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl BuildTarget {
    /// Plan one target per declared architecture.
    ///
    /// Platforms without fat binaries can only ship one architecture, so
    /// only the first declared one is planned there.
    pub fn plan(
        recipe: &Recipe,
        platform: Platform,
        toolchain: &Toolchain,
        work_dir: &Path,
    ) -> Result<Vec<BuildTarget>> {
        let work_dir = std::path::absolute(work_dir)
            .map_err(|e| PackageError::io("Failed to resolve work directory", work_dir, e))?;

        let mut archs = recipe.build.architectures.clone();
        if !platform.supports_fat_binaries() && archs.len() > 1 {
            let skipped: Vec<String> = archs.drain(1..).map(|a| a.to_string()).collect();
            warn!(
                "{platform} has no fat binaries; building {} only, skipping {}",
                archs[0],
                skipped.join(", ")
            );
        }

        let platform_flags = recipe.build.platform_flags(platform);
        let targets = archs
            .into_iter()
            .map(|arch| {
                let arch_flags = platform.arch_flags(arch);

                let mut cflags = recipe.build.cflags.clone();
                cflags.extend(platform_flags.cflags.iter().cloned());
                cflags.extend(arch_flags.iter().cloned());
                cflags.extend(toolchain.cflags());

                let mut ldflags = recipe.build.ldflags.clone();
                ldflags.extend(platform_flags.ldflags.iter().cloned());
                ldflags.extend(arch_flags);

                BuildTarget {
                    arch,
                    host_triple: (arch != Arch::host())
                        .then(|| arch.host_triple(platform).to_string()),
                    build_dir: work_dir.join(format!("build-{arch}")),
                    prefix: work_dir.join(format!("install-{arch}")),
                    cflags,
                    ldflags,
                }
            })
            .collect();
        Ok(targets)
    }

    /// Full configure argument list for this target.
    ///
    /// Only `--prefix` and `--host` differ between architectures.
    pub fn configure_args(&self, features: &FeatureFlags) -> Vec<String> {
        let mut args = vec!["--quiet".to_string()];
        args.extend(features.configure_args());
        args.push(format!("--prefix={}", self.prefix.display()));
        if let Some(triple) = &self.host_triple {
            args.push(format!("--host={triple}"));
        }
        args
    }
}

/// An architecture whose install step completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTarget {
    pub arch: Arch,
    pub prefix: PathBuf,
}

/// Runs the upstream autotools build for one target at a time.
#[derive(Debug)]
pub struct Builder<'a> {
    source_dir: PathBuf,
    toolchain: &'a Toolchain,
    features: FeatureFlags,
    make: String,
}

impl<'a> Builder<'a> {
    pub fn new(source_dir: &Path, toolchain: &'a Toolchain, make: &str) -> Result<Self> {
        let source_dir = std::path::absolute(source_dir)
            .map_err(|e| PackageError::io("Failed to resolve source directory", source_dir, e))?;
        Ok(Builder {
            source_dir,
            toolchain,
            features: FeatureFlags::libxml2(),
            make: make.to_string(),
        })
    }

    /// Configure, build and install one target.
    pub fn build(&self, target: &BuildTarget) -> Result<InstalledTarget> {
        info!("Building {} in {}", target.arch, target.build_dir.display());

        for dir in [&target.build_dir, &target.prefix] {
            if dir.exists() {
                return Err(PackageError::DirectoryConflict { path: dir.clone() });
            }
        }
        fs::create_dir_all(&target.build_dir)
            .map_err(|e| PackageError::io("Failed to create build directory", &target.build_dir, e))?;

        let mut configure = Command::new(self.source_dir.join("configure"));
        configure.args(target.configure_args(&self.features));
        self.prepare(&mut configure, target);
        run_step(&mut configure, BuildStep::Configure, Some(target.arch))?;

        let mut make = Command::new(&self.make);
        self.prepare(&mut make, target);
        run_step(&mut make, BuildStep::Make, Some(target.arch))?;

        let mut install = Command::new(&self.make);
        install.arg("install");
        self.prepare(&mut install, target);
        run_step(&mut install, BuildStep::Install, Some(target.arch))?;

        info!("Installed {} into {}", target.arch, target.prefix.display());
        Ok(InstalledTarget {
            arch: target.arch,
            prefix: target.prefix.clone(),
        })
    }

    fn prepare(&self, cmd: &mut Command, target: &BuildTarget) {
        let cflags = target.cflags.join(" ");
        cmd.current_dir(&target.build_dir)
            .env("CFLAGS", &cflags)
            .env("CXXFLAGS", &cflags)
            .env("LDFLAGS", target.ldflags.join(" "));
        self.toolchain.apply(cmd);
    }
}

/// Run a command to completion, returning its combined output.
pub(crate) fn run_step(cmd: &mut Command, step: BuildStep, arch: Option<Arch>) -> Result<String> {
    debug!("Running {step}: {cmd:?}");
    let output = cmd.output().map_err(|e| PackageError::UpstreamBuild {
        step,
        arch,
        status: None,
        output: format!("failed to start {}: {e}", cmd.get_program().to_string_lossy()),
    })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(PackageError::UpstreamBuild {
            step,
            arch,
            status: Some(output.status),
            output: combined,
        });
    }
    Ok(combined)
}
