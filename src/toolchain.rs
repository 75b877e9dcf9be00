//! Compiler and SDK selection.
//!
//! Declared build-time dependencies live under a dependency directory as
//! `<deps>/<name>/<version>/`. The resolved toolchain is applied to each
//! spawned command individually; the process environment is never touched.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::error::{PackageError, Result};
use crate::platform::Platform;
use crate::recipe::{DeclaredDependency, ToolchainSpec};

/// Compilers (and optionally a sysroot) used for every build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub sysroot: Option<PathBuf>,
}

impl Toolchain {
    /// The compilers found on `PATH`.
    pub fn host() -> Self {
        Toolchain {
            cc: PathBuf::from("cc"),
            cxx: PathBuf::from("c++"),
            sysroot: None,
        }
    }

    /// Resolve the toolchain declared by a recipe.
    ///
    /// Without a declared compiler the host compilers are used. The SDK is
    /// only consulted on macOS.
    pub fn resolve(spec: &ToolchainSpec, deps_dir: &Path, platform: Platform) -> Result<Self> {
        let mut toolchain = match &spec.compiler {
            Some(dep) => {
                let root = dependency_root(deps_dir, dep)?;
                let bin = root.join("bin");
                Toolchain {
                    cc: find_executable(&bin, &spec.cc, dep)?,
                    cxx: find_executable(&bin, &spec.cxx, dep)?,
                    sysroot: None,
                }
            }
            None => {
                warn!("No compiler dependency declared, using host cc/c++");
                Toolchain::host()
            }
        };

        if platform == Platform::MacOs {
            if let Some(sdk) = &spec.sdk {
                let root = dependency_root(deps_dir, sdk)?;
                // CFLAGS is a space-separated list, so `-isysroot` cannot carry spaces
                if root.to_string_lossy().contains(char::is_whitespace) {
                    return Err(PackageError::ToolchainResolution {
                        dependency: format!("{}/{}", sdk.name, sdk.version),
                        reason: format!("SDK path {} contains whitespace", root.display()),
                    });
                }
                toolchain.sysroot = Some(root);
            }
        }

        debug!(?toolchain, "Resolved toolchain");
        Ok(toolchain)
    }

    /// Extra compiler flags contributed by the toolchain.
    pub fn cflags(&self) -> Vec<String> {
        match &self.sysroot {
            Some(root) => vec!["-isysroot".to_string(), root.display().to_string()],
            None => Vec::new(),
        }
    }

    /// Point a command at this toolchain via `CC` and `CXX`.
    ///
    /// Only the child's environment is changed.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env("CC", &self.cc).env("CXX", &self.cxx);
    }
}

fn dependency_root(deps_dir: &Path, dep: &DeclaredDependency) -> Result<PathBuf> {
    let root = deps_dir.join(&dep.name).join(&dep.version);
    if !root.is_dir() {
        return Err(PackageError::ToolchainResolution {
            dependency: format!("{}/{}", dep.name, dep.version),
            reason: format!("{} is not installed", root.display()),
        });
    }
    Ok(root)
}

fn find_executable(bin: &Path, name: &str, dep: &DeclaredDependency) -> Result<PathBuf> {
    let path = bin.join(name);
    if !path.is_file() {
        return Err(PackageError::ToolchainResolution {
            dependency: format!("{}/{}", dep.name, dep.version),
            reason: format!("{} not found", path.display()),
        });
    }
    Ok(path)
}
