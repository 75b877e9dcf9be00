//! Package layout: `include/`, `lib/`, `license/` and `package.toml`.
//!
//! The package is assembled in a hidden sibling directory and renamed into
//! place once complete, so a failed run never leaves a partial package.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::copy::{copy_file_into, copy_matching_recursive};
use crate::error::{PackageError, Result};
use crate::merge::BuildOutput;
use crate::platform::{Arch, Platform};
use crate::recipe::Recipe;

pub const METADATA_FILE: &str = "package.toml";

/// Metadata consumers read to link against the package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub license: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    pub architectures: Vec<Arch>,
    /// Names passed to the linker as `-l<name>`.
    pub libs: Vec<String>,
}

impl PackageMetadata {
    pub fn load(package_dir: &Path) -> Result<Self> {
        let path = package_dir.join(METADATA_FILE);
        let text = fs::read_to_string(&path)
            .map_err(|e| PackageError::io("Failed to read package metadata", &path, e))?;
        toml::from_str(&text).map_err(|e| PackageError::Recipe {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Files making up a finished package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    pub root: PathBuf,
    /// Header paths relative to `include/`.
    pub headers: Vec<PathBuf>,
    pub library: PathBuf,
    pub license: PathBuf,
    pub metadata: PackageMetadata,
}

/// Lay out the package for `output` at `package_dir`.
///
/// `source_dir` is the fetched source tree holding the renamed license.
pub fn package(
    recipe: &Recipe,
    output: &BuildOutput,
    source_dir: &Path,
    platform: Platform,
    package_dir: &Path,
) -> Result<ArtifactBundle> {
    if package_dir.exists() {
        return Err(PackageError::DirectoryConflict {
            path: package_dir.to_path_buf(),
        });
    }
    let parent = match package_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|e| PackageError::io("Failed to create package parent", &parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".package-")
        .tempdir_in(&parent)
        .map_err(|e| PackageError::io("Failed to create staging directory", &parent, e))?;
    let stage = staging.path();

    let header_root = output
        .headers_prefix()
        .join("include")
        .join(&recipe.package.name);
    if !header_root.is_dir() {
        return Err(PackageError::MissingFile { path: header_root });
    }
    let headers = copy_matching_recursive(&header_root, &stage.join("include"), "h")?;
    if headers.is_empty() {
        return Err(PackageError::MissingFile {
            path: header_root.join("*.h"),
        });
    }

    let library_name = platform.shared_library_name(&recipe.package.library_base());
    copy_file_into(&output.library(&library_name), &stage.join("lib"), &library_name)?;

    let license_name = recipe.package.license_file_name();
    copy_file_into(&source_dir.join(&license_name), &stage.join("license"), &license_name)?;

    let metadata = PackageMetadata {
        name: recipe.package.name.clone(),
        version: recipe.version(),
        license: recipe.package.license.clone(),
        description: recipe.package.description.clone(),
        homepage: recipe.package.homepage.clone(),
        architectures: output.architectures(),
        libs: vec![recipe.build.link_name.clone()],
    };
    let text = toml::to_string_pretty(&metadata).map_err(|e| PackageError::Recipe {
        source_name: METADATA_FILE.to_string(),
        reason: e.to_string(),
    })?;
    let metadata_path = stage.join(METADATA_FILE);
    fs::write(&metadata_path, text)
        .map_err(|e| PackageError::io("Failed to write package metadata", &metadata_path, e))?;

    // the staging guard's cleanup is a no-op once the rename succeeds
    fs::rename(stage, package_dir)
        .map_err(|e| PackageError::io("Failed to publish package", package_dir, e))?;
    drop(staging);

    info!(
        "Packaged {} {} ({} headers) at {}",
        metadata.name,
        metadata.version,
        headers.len(),
        package_dir.display()
    );
    Ok(ArtifactBundle {
        root: package_dir.to_path_buf(),
        headers,
        library: package_dir.join("lib").join(&library_name),
        license: package_dir.join("license").join(&license_name),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_install(root: &Path, lib: &str) -> PathBuf {
        let prefix = root.join("install-x86_64");
        fs::create_dir_all(prefix.join("include/libxml2/libxml")).unwrap();
        fs::write(prefix.join("include/libxml2/libxml/parser.h"), "/* */").unwrap();
        fs::write(prefix.join("include/libxml2/libxml/tree.h"), "/* */").unwrap();
        fs::create_dir_all(prefix.join("lib")).unwrap();
        fs::write(prefix.join("lib").join(lib), "binary").unwrap();
        prefix
    }

    fn fake_source(root: &Path) -> PathBuf {
        let src = root.join("libxml2-2.9.2");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("libxml2.txt"), "Copyright (C) Daniel Veillard").unwrap();
        src
    }

    #[test]
    fn test_package_layout() {
        let temp = TempDir::new().unwrap();
        let recipe = Recipe::builtin().unwrap();
        let prefix = fake_install(temp.path(), "libxml2.so");
        let src = fake_source(temp.path());
        let output = BuildOutput::SingleArchitecture {
            arch: Arch::X86_64,
            prefix,
        };
        let pkg = temp.path().join("package");

        let bundle = package(&recipe, &output, &src, Platform::Linux, &pkg).unwrap();

        assert_eq!(
            bundle.headers,
            vec![
                PathBuf::from("libxml/parser.h"),
                PathBuf::from("libxml/tree.h")
            ]
        );
        assert!(pkg.join("include/libxml/parser.h").is_file());
        assert_eq!(bundle.library, pkg.join("lib/libxml2.so"));
        assert!(bundle.library.is_file());
        assert!(pkg.join("license/libxml2.txt").is_file());

        let metadata = PackageMetadata::load(&pkg).unwrap();
        assert_eq!(metadata.version, "2.9.2-3");
        assert_eq!(metadata.libs, vec!["xml2"]);
        assert_eq!(metadata.architectures, vec![Arch::X86_64]);
        assert_eq!(metadata, bundle.metadata);
    }

    #[test]
    fn test_missing_library_leaves_no_package() {
        let temp = TempDir::new().unwrap();
        let recipe = Recipe::builtin().unwrap();
        let prefix = fake_install(temp.path(), "libxml2.so");
        let src = fake_source(temp.path());
        let output = BuildOutput::SingleArchitecture {
            arch: Arch::X86_64,
            prefix,
        };
        let pkg = temp.path().join("package");

        let err = package(&recipe, &output, &src, Platform::MacOs, &pkg).unwrap_err();
        assert!(matches!(err, PackageError::MissingFile { .. }));
        assert!(!pkg.exists());
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".package-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_headers() {
        let temp = TempDir::new().unwrap();
        let recipe = Recipe::builtin().unwrap();
        let output = BuildOutput::SingleArchitecture {
            arch: Arch::X86_64,
            prefix: temp.path().join("install-x86_64"),
        };
        let err = package(
            &recipe,
            &output,
            temp.path(),
            Platform::Linux,
            &temp.path().join("package"),
        )
        .unwrap_err();
        assert!(matches!(err, PackageError::MissingFile { .. }));
    }

    #[test]
    fn test_existing_package_is_conflict() {
        let temp = TempDir::new().unwrap();
        let recipe = Recipe::builtin().unwrap();
        let pkg = temp.path().join("package");
        fs::create_dir_all(&pkg).unwrap();
        let output = BuildOutput::SingleArchitecture {
            arch: Arch::X86_64,
            prefix: temp.path().to_path_buf(),
        };
        let err = package(&recipe, &output, temp.path(), Platform::Linux, &pkg).unwrap_err();
        assert!(matches!(err, PackageError::DirectoryConflict { .. }));
    }
}
