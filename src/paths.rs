//! System library locations.

use std::path::{Path, PathBuf};

use crate::platform::Platform;

/// Directories the Linux dynamic linker searches by default.
pub const LINUX_SYSTEM_LIB_DIRS: &[&str] = &[
    "usr/lib64",
    "lib64",
    "usr/lib",
    "lib",
    "usr/lib/x86_64-linux-gnu",
    "lib/x86_64-linux-gnu",
    "usr/lib/aarch64-linux-gnu",
    "lib/aarch64-linux-gnu",
];

/// Path prefixes of libraries shipped with macOS.
pub const MACOS_SYSTEM_PREFIXES: &[&str] = &["/usr/lib/", "/System/"];

/// Find a library in the standard system paths below `root`.
///
/// Returns `None` if the library is not found in any search path.
#[must_use = "found library path should be used"]
pub fn find_system_library(root: &Path, lib_name: &str) -> Option<PathBuf> {
    LINUX_SYSTEM_LIB_DIRS
        .iter()
        .map(|dir| root.join(dir).join(lib_name))
        .find(|p| p.exists() || p.is_symlink())
}

/// Whether a link-table path or search directory belongs to the system.
pub fn is_system_path(path: &str, platform: Platform) -> bool {
    match platform {
        Platform::MacOs => MACOS_SYSTEM_PREFIXES.iter().any(|p| path.starts_with(p)),
        Platform::Linux => {
            let trimmed = path.trim_end_matches('/');
            LINUX_SYSTEM_LIB_DIRS.iter().any(|dir| {
                let dir = format!("/{dir}");
                trimmed == dir || Path::new(trimmed).parent() == Some(Path::new(&dir))
            })
        }
    }
}
