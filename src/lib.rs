//! Packaging recipe engine for libxml2.
//!
//! Downloads a pinned libxml2 source release, verifies it, builds it once
//! per target architecture with a fixed feature set, merges the results
//! into a universal library where the platform supports it, and lays out a
//! versioned binary package:
//!
//! ```text
//! package/
//!     include/libxml/*.h
//!     lib/libxml2.{dylib,so}
//!     license/libxml2.txt
//!     package.toml
//! ```
//!
//! Link tables are read with `readelf -d` (ELF) or `otool -L` (Mach-O),
//! which inspect headers without loading the binary, so cross-built
//! artifacts can be checked on the build machine.

mod analyze;
mod build;
mod copy;
mod error;
mod features;
mod fetch;
mod merge;
mod package;
mod paths;
mod pipeline;
mod platform;
mod recipe;
mod smoke;
mod toolchain;

pub use analyze::{
    check_link_hygiene, check_table, parse_otool_output, parse_readelf_output,
    parse_readelf_search_paths, read_link_table, LinkTable,
};
pub use build::{BuildTarget, Builder, InstalledTarget};
pub use copy::{copy_file_into, copy_matching_recursive};
pub use error::{BuildStep, PackageError, Result};
pub use features::{FeatureFlags, Toggle};
pub use fetch::{compute_sha256, download, fetch_source, verify_sha256};
pub use merge::{merge, missing_architectures, BuildOutput};
pub use package::{package, ArtifactBundle, PackageMetadata, METADATA_FILE};
pub use paths::{find_system_library, is_system_path};
pub use pipeline::{run, PipelineOptions};
pub use platform::{Arch, Platform};
pub use recipe::{
    BuildSpec, DeclaredDependency, PackageDescriptor, PlatformFlags, Recipe, SourceSpec,
    ToolchainSpec,
};
pub use smoke::{SmokeReport, SmokeTest};
pub use toolchain::Toolchain;
