//! Recipe loading.
//!
//! A recipe pins one upstream version: where to get it, how to check it, and
//! which flags to build it with. Recipes for different versions are
//! independent of each other.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{PackageError, Result};
use crate::platform::{Arch, Platform};

/// Built-in recipe used when none is given on the command line.
const DEFAULT_RECIPE: &str = include_str!("../recipes/libxml2-2.9.2.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub source_version: String,
    pub revision: u32,
    pub license: String,
    pub description: String,
    #[serde(default)]
    pub homepage: Option<String>,
}

impl PackageDescriptor {
    /// Published version, `<source_version>-<revision>`.
    pub fn version(&self) -> String {
        format!("{}-{}", self.source_version, self.revision)
    }

    /// Base name of the shared library, e.g. `libxml2`.
    pub fn library_base(&self) -> String {
        if self.name.starts_with("lib") {
            self.name.clone()
        } else {
            format!("lib{}", self.name)
        }
    }

    /// Name the upstream license file is renamed to.
    pub fn license_file_name(&self) -> String {
        format!("{}.txt", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Download URL; `{version}` is replaced with the source version.
    pub url: String,
    pub sha256: String,
    #[serde(default = "default_license_file")]
    pub license_file: String,
    /// Top-level directory inside the archive, `{name}-{version}` if unset.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_license_file() -> String {
    "Copyright".to_string()
}

/// Extra flags applied on one platform only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformFlags {
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub ldflags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSpec {
    pub architectures: Vec<Arch>,
    /// Name consumers pass to the linker (`-lxml2`).
    pub link_name: String,
    #[serde(default)]
    pub cflags: Vec<String>,
    #[serde(default)]
    pub ldflags: Vec<String>,
    #[serde(default)]
    pub macos: PlatformFlags,
    #[serde(default)]
    pub linux: PlatformFlags,
    #[serde(default = "default_make")]
    pub make: String,
}

fn default_make() -> String {
    "make".to_string()
}

impl BuildSpec {
    pub fn platform_flags(&self, platform: Platform) -> &PlatformFlags {
        match platform {
            Platform::MacOs => &self.macos,
            Platform::Linux => &self.linux,
        }
    }
}

/// A build-time dependency pinned by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDependency {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainSpec {
    #[serde(default)]
    pub compiler: Option<DeclaredDependency>,
    /// SDK providing the sysroot, used on macOS only.
    #[serde(default)]
    pub sdk: Option<DeclaredDependency>,
    #[serde(default = "default_cc")]
    pub cc: String,
    #[serde(default = "default_cxx")]
    pub cxx: String,
}

fn default_cc() -> String {
    "clang".to_string()
}

fn default_cxx() -> String {
    "clang++".to_string()
}

impl Default for ToolchainSpec {
    fn default() -> Self {
        ToolchainSpec {
            compiler: None,
            sdk: None,
            cc: default_cc(),
            cxx: default_cxx(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub package: PackageDescriptor,
    pub source: SourceSpec,
    pub build: BuildSpec,
    #[serde(default)]
    pub toolchain: ToolchainSpec,
}

impl Recipe {
    /// Load and validate a recipe file.
    pub fn load(path: &Path) -> Result<Recipe> {
        let text = fs::read_to_string(path)
            .map_err(|e| PackageError::io("Failed to read recipe", path, e))?;
        Recipe::parse(&text, &path.display().to_string())
    }

    /// The built-in libxml2 2.9.2 recipe.
    pub fn builtin() -> Result<Recipe> {
        Recipe::parse(DEFAULT_RECIPE, "<builtin libxml2-2.9.2>")
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Recipe> {
        let recipe: Recipe = toml::from_str(text).map_err(|e| PackageError::Recipe {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;
        recipe.validate().map_err(|reason| PackageError::Recipe {
            source_name: source_name.to_string(),
            reason,
        })?;
        Ok(recipe)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.package.name.is_empty() {
            return Err("package name is empty".into());
        }
        if self.package.source_version.is_empty() {
            return Err("source version is empty".into());
        }
        if self.source.sha256.len() != 64
            || !self.source.sha256.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(format!(
                "sha256 must be 64 hex characters, got '{}'",
                self.source.sha256
            ));
        }
        if self.build.architectures.is_empty() {
            return Err("at least one architecture is required".into());
        }
        let mut seen = HashSet::new();
        for arch in &self.build.architectures {
            if !seen.insert(arch) {
                return Err(format!("architecture {arch} is listed twice"));
            }
        }
        if self.build.link_name.is_empty() {
            return Err("link name is empty".into());
        }
        Ok(())
    }

    pub fn version(&self) -> String {
        self.package.version()
    }

    /// Download URL with the version filled in.
    pub fn source_url(&self) -> String {
        self.source
            .url
            .replace("{version}", &self.package.source_version)
    }

    /// Directory the archive extracts to.
    pub fn source_dir_name(&self) -> String {
        match &self.source.directory {
            Some(dir) => dir.replace("{version}", &self.package.source_version),
            None => format!("{}-{}", self.package.name, self.package.source_version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"
[package]
name = "libxml2"
source_version = "2.9.10"
revision = 0
license = "MIT"
description = "XML"

[source]
url = "https://example.invalid/libxml2-{{version}}.tar.gz"
sha256 = "aafee193ffb8fe0c82d4afef6ef91972cbaf5feea100edc2f262750611b4be1f"

[build]
architectures = ["x86_64", "arm64"]
link_name = "xml2"
{extra}
"#
        )
    }

    #[test]
    fn test_version_string() {
        let recipe = Recipe::parse(&minimal(""), "test").unwrap();
        assert_eq!(recipe.version(), "2.9.10-0");
    }

    #[test]
    fn test_builtin_recipe() {
        let recipe = Recipe::builtin().unwrap();
        assert_eq!(recipe.version(), "2.9.2-3");
        assert_eq!(
            recipe.source_url(),
            "http://xmlsoft.org/sources/libxml2-sources-2.9.2.tar.gz"
        );
        assert_eq!(recipe.source_dir_name(), "libxml2-2.9.2");
        assert_eq!(recipe.source.license_file, "Copyright");
        assert_eq!(recipe.package.license_file_name(), "libxml2.txt");
        assert_eq!(recipe.package.library_base(), "libxml2");
        assert_eq!(recipe.build.link_name, "xml2");
        assert_eq!(recipe.build.make, "make");
        assert!(recipe
            .build
            .macos
            .ldflags
            .contains(&"-Wl,-install_name,@rpath/libxml2.dylib".to_string()));
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let recipe = Recipe::parse(&minimal(""), "test").unwrap();
        assert!(recipe.toolchain.compiler.is_none());
        assert_eq!(recipe.toolchain.cc, "clang");
        assert!(recipe.build.linux.cflags.is_empty());
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let text = minimal("").replace(
            "aafee193ffb8fe0c82d4afef6ef91972cbaf5feea100edc2f262750611b4be1f",
            "not-a-hash",
        );
        let err = Recipe::parse(&text, "bad.toml").unwrap_err();
        assert!(err.to_string().contains("sha256"), "{err}");
    }

    #[test]
    fn test_rejects_duplicate_architectures() {
        let text = minimal("").replace(r#"["x86_64", "arm64"]"#, r#"["arm64", "aarch64"]"#);
        let err = Recipe::parse(&text, "dup.toml").unwrap_err();
        assert!(err.to_string().contains("listed twice"), "{err}");
    }

    #[test]
    fn test_toolchain_section() {
        let text = minimal(
            r#"
[toolchain]
compiler = { name = "llvm", version = "11.0.1" }
sdk = { name = "macos-sdk", version = "11.0" }
"#,
        );
        let recipe = Recipe::parse(&text, "tc.toml").unwrap();
        assert_eq!(
            recipe.toolchain.compiler,
            Some(DeclaredDependency {
                name: "llvm".into(),
                version: "11.0.1".into()
            })
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Recipe::load(Path::new("/nonexistent/recipe.toml")).unwrap_err();
        assert!(matches!(err, PackageError::Io { .. }));
    }
}
