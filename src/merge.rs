//! Combining per-architecture libraries into one universal binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::build::InstalledTarget;
use crate::error::{PackageError, Result};
use crate::platform::{Arch, Platform};

/// The library the packager ships, single-arch or universal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutput {
    SingleArchitecture {
        arch: Arch,
        prefix: PathBuf,
    },
    MergedUniversal {
        architectures: Vec<Arch>,
        library: PathBuf,
        /// Headers are architecture-independent; taken from the first build.
        headers_prefix: PathBuf,
    },
}

impl BuildOutput {
    /// Path of the shared library to ship.
    pub fn library(&self, library_name: &str) -> PathBuf {
        match self {
            BuildOutput::SingleArchitecture { prefix, .. } => prefix.join("lib").join(library_name),
            BuildOutput::MergedUniversal { library, .. } => library.clone(),
        }
    }

    /// Install prefix whose `include/` holds the public headers.
    pub fn headers_prefix(&self) -> &Path {
        match self {
            BuildOutput::SingleArchitecture { prefix, .. } => prefix,
            BuildOutput::MergedUniversal { headers_prefix, .. } => headers_prefix,
        }
    }

    pub fn architectures(&self) -> Vec<Arch> {
        match self {
            BuildOutput::SingleArchitecture { arch, .. } => vec![*arch],
            BuildOutput::MergedUniversal { architectures, .. } => architectures.clone(),
        }
    }
}

/// Merge installed targets into the output the packager consumes.
///
/// With one target, or on a platform without fat binaries, the first target
/// is passed through untouched.
pub fn merge(
    installed: &[InstalledTarget],
    platform: Platform,
    library_name: &str,
    work_dir: &Path,
) -> Result<BuildOutput> {
    let first = installed.first().ok_or_else(|| PackageError::Merge {
        reason: "no architectures were built".into(),
        output: String::new(),
    })?;

    if installed.len() == 1 || !platform.supports_fat_binaries() {
        info!("Using single-architecture output for {}", first.arch);
        return Ok(BuildOutput::SingleArchitecture {
            arch: first.arch,
            prefix: first.prefix.clone(),
        });
    }

    let inputs: Vec<PathBuf> = installed
        .iter()
        .map(|t| t.prefix.join("lib").join(library_name))
        .collect();
    if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
        return Err(PackageError::Merge {
            reason: format!("input library {} is missing", missing.display()),
            output: String::new(),
        });
    }

    let lib_dir = work_dir.join("universal").join("lib");
    fs::create_dir_all(&lib_dir)
        .map_err(|e| PackageError::io("Failed to create universal directory", &lib_dir, e))?;
    let library = lib_dir.join(library_name);

    let architectures: Vec<Arch> = installed.iter().map(|t| t.arch).collect();
    info!(
        "Merging {} into {}",
        architectures
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        library.display()
    );

    lipo(Command::new("lipo").arg("-create").args(&inputs).arg("-output").arg(&library))?;

    let reported = lipo(Command::new("lipo").arg("-archs").arg(&library))?;
    let missing = missing_architectures(&reported, &architectures);
    if !missing.is_empty() {
        return Err(PackageError::Merge {
            reason: format!("merged library lacks {}", missing.join(", ")),
            output: reported,
        });
    }

    Ok(BuildOutput::MergedUniversal {
        architectures,
        library,
        headers_prefix: first.prefix.clone(),
    })
}

fn lipo(cmd: &mut Command) -> Result<String> {
    let output = cmd.output().map_err(|e| PackageError::Merge {
        reason: format!("lipo could not be started: {e}"),
        output: String::new(),
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        return Err(PackageError::Merge {
            reason: format!("lipo exited with {}", output.status),
            output: format!("{stdout}{}", String::from_utf8_lossy(&output.stderr)),
        });
    }
    Ok(stdout)
}

/// Architectures expected but absent from `lipo -archs` output.
pub fn missing_architectures(lipo_archs: &str, expected: &[Arch]) -> Vec<String> {
    let present: Vec<&str> = lipo_archs.split_whitespace().collect();
    expected
        .iter()
        .filter(|a| !present.contains(&a.as_str()))
        .map(|a| a.to_string())
        .collect()
}
