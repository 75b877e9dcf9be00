//! Error types for the packaging pipeline.
//!
//! Every variant is fatal to a run. Tool output is carried verbatim so the
//! operator sees the upstream diagnostic, not a summary of it.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::platform::Arch;

/// Result type alias for packaging operations.
pub type Result<T> = std::result::Result<T, PackageError>;

/// External step that produced an [`PackageError::UpstreamBuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Configure,
    Make,
    Install,
    SmokeCompile,
    SmokeRun,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStep::Configure => "configure",
            BuildStep::Make => "make",
            BuildStep::Install => "make install",
            BuildStep::SmokeCompile => "smoke-test compile",
            BuildStep::SmokeRun => "smoke-test run",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PackageError {
    /// Download failed or the payload did not match the declared checksum.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A declared build-time dependency is not installed.
    #[error("cannot resolve build dependency '{dependency}': {reason}")]
    ToolchainResolution { dependency: String, reason: String },

    /// Leftover directory from an unclean run.
    #[error("{} already exists - clean the work directory first", .path.display())]
    DirectoryConflict { path: PathBuf },

    /// Non-zero exit (or spawn failure) from an upstream tool.
    #[error("{step} failed{}{}:\n{output}", arch_suffix(.arch), status_suffix(.status))]
    UpstreamBuild {
        step: BuildStep,
        arch: Option<Arch>,
        status: Option<ExitStatus>,
        output: String,
    },

    #[error("universal merge failed: {reason}\n{output}")]
    Merge { reason: String, output: String },

    /// An upstream output expected after install is absent.
    #[error("expected file is missing: {}", .path.display())]
    MissingFile { path: PathBuf },

    /// The link table references libraries outside the system locations.
    #[error("{} links against non-system libraries: {}", .binary.display(), .libraries.join(", "))]
    LeakedDependency {
        binary: PathBuf,
        libraries: Vec<String>,
    },

    #[error("invalid recipe {source_name}: {reason}")]
    Recipe { source_name: String, reason: String },

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackageError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PackageError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

fn arch_suffix(arch: &Option<Arch>) -> String {
    arch.map(|a| format!(" for {a}")).unwrap_or_default()
}

fn status_suffix(status: &Option<ExitStatus>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_build_message_includes_output() {
        let err = PackageError::UpstreamBuild {
            step: BuildStep::Configure,
            arch: Some(Arch::Arm64),
            status: None,
            output: "checking for gcc... no".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("configure failed for arm64"), "{msg}");
        assert!(msg.contains("checking for gcc... no"));
    }

    #[test]
    fn test_leaked_dependency_lists_libraries() {
        let err = PackageError::LeakedDependency {
            binary: PathBuf::from("lib/libxml2.dylib"),
            libraries: vec!["/opt/local/lib/libz.1.dylib".into(), "libiconv.2.dylib".into()],
        };
        assert_eq!(
            err.to_string(),
            "lib/libxml2.dylib links against non-system libraries: \
             /opt/local/lib/libz.1.dylib, libiconv.2.dylib"
        );
    }
}
