//! Smoke test for a finished package.
//!
//! Builds a tiny consumer against the package, runs it, and checks that
//! the packaged library links only against system libraries. XML behaviour
//! itself is not exercised.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::analyze::{check_link_hygiene, LinkTable};
use crate::build::run_step;
use crate::error::{BuildStep, PackageError, Result};
use crate::package::PackageMetadata;
use crate::platform::Platform;

const CONSUMER_SOURCE: &str = r#"#include <stdio.h>
#include <libxml/parser.h>

int main(void)
{
    const char xml[] = "<package name=\"libxml2\"/>";
    xmlDocPtr doc;

    xmlInitParser();
    doc = xmlReadMemory(xml, sizeof(xml) - 1, "smoke.xml", NULL, 0);
    if (doc == NULL) {
        fprintf(stderr, "failed to parse\n");
        return 1;
    }
    xmlFreeDoc(doc);
    xmlCleanupParser();
    printf("ok\n");
    return 0;
}
"#;

/// What a passing smoke test observed.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    pub program_output: String,
    pub link_table: LinkTable,
}

#[derive(Debug, Clone)]
pub struct SmokeTest {
    package_dir: PathBuf,
    work_dir: PathBuf,
    cc: PathBuf,
    platform: Platform,
}

impl SmokeTest {
    pub fn new(package_dir: &Path, work_dir: &Path) -> Self {
        SmokeTest {
            package_dir: package_dir.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            cc: PathBuf::from("cc"),
            platform: Platform::host(),
        }
    }

    /// Compiler used for the consumer program.
    pub fn compiler(mut self, cc: impl Into<PathBuf>) -> Self {
        self.cc = cc.into();
        self
    }

    pub fn run(&self) -> Result<SmokeReport> {
        let package_dir = std::path::absolute(&self.package_dir)
            .map_err(|e| PackageError::io("Failed to resolve package directory", &self.package_dir, e))?;
        let metadata = PackageMetadata::load(&package_dir)?;
        let lib_dir = package_dir.join("lib");

        fs::create_dir_all(&self.work_dir)
            .map_err(|e| PackageError::io("Failed to create smoke-test directory", &self.work_dir, e))?;
        let source = self.work_dir.join("test_package.c");
        fs::write(&source, CONSUMER_SOURCE)
            .map_err(|e| PackageError::io("Failed to write consumer program", &source, e))?;
        let program = self.work_dir.join("test_package");

        info!("Building consumer program against {}", package_dir.display());
        let mut compile = Command::new(&self.cc);
        compile
            .arg(&source)
            .arg(format!("-I{}", package_dir.join("include").display()))
            .arg(format!("-L{}", lib_dir.display()))
            .args(metadata.libs.iter().map(|l| format!("-l{l}")))
            .arg(format!("-Wl,-rpath,{}", lib_dir.display()))
            .arg("-o")
            .arg(&program);
        run_step(&mut compile, BuildStep::SmokeCompile, None)?;

        let program_output = run_step(&mut Command::new(&program), BuildStep::SmokeRun, None)?;

        let library = find_shared_library(&lib_dir)?;
        info!("Checking link table of {}", library.display());
        let link_table = check_link_hygiene(&library, self.platform)?;

        info!("Smoke test passed for {} {}", metadata.name, metadata.version);
        Ok(SmokeReport {
            program_output,
            link_table,
        })
    }
}

fn find_shared_library(lib_dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(lib_dir)
        .map_err(|e| PackageError::io("Failed to read package lib directory", lib_dir, e))?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|e| e == "dylib" || e == "so"))
        .ok_or_else(|| PackageError::MissingFile {
            path: lib_dir.join("*.so"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_metadata() {
        let temp = TempDir::new().unwrap();
        let err = SmokeTest::new(temp.path(), &temp.path().join("work"))
            .run()
            .unwrap_err();
        assert!(matches!(err, PackageError::Io { .. }));
    }

    #[test]
    fn test_find_shared_library() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("libxml2.dylib"), "").unwrap();
        assert_eq!(
            find_shared_library(temp.path()).unwrap(),
            temp.path().join("libxml2.dylib")
        );
    }

    #[test]
    fn test_find_shared_library_empty() {
        let temp = TempDir::new().unwrap();
        let err = find_shared_library(temp.path()).unwrap_err();
        assert!(matches!(err, PackageError::MissingFile { .. }));
    }

    #[test]
    fn test_compile_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("package");
        fs::create_dir_all(pkg.join("lib")).unwrap();
        fs::write(
            pkg.join("package.toml"),
            r#"
name = "libxml2"
version = "2.9.2-3"
license = "MIT"
description = "XML"
architectures = ["x86_64"]
libs = ["xml2"]
"#,
        )
        .unwrap();

        let err = SmokeTest::new(&pkg, &temp.path().join("work"))
            .compiler("false")
            .run()
            .unwrap_err();
        match err {
            PackageError::UpstreamBuild { step, .. } => assert_eq!(step, BuildStep::SmokeCompile),
            other => panic!("unexpected error: {other}"),
        }
    }
}
