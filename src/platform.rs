//! Host platform and target architecture identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target processor architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64", alias = "aarch64")]
    Arm64,
}

impl Arch {
    /// Architecture of the machine running the build.
    pub fn host() -> Arch {
        if cfg!(target_arch = "aarch64") {
            Arch::Arm64
        } else {
            Arch::X86_64
        }
    }

    /// Name used by `-arch` and `lipo`.
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Host triple passed to `configure --host` when cross-compiling.
    pub fn host_triple(self, platform: Platform) -> &'static str {
        match (platform, self) {
            (Platform::MacOs, Arch::X86_64) => "x86_64-apple-darwin",
            (Platform::MacOs, Arch::Arm64) => "aarch64-apple-darwin",
            (Platform::Linux, Arch::X86_64) => "x86_64-linux-gnu",
            (Platform::Linux, Arch::Arm64) => "aarch64-linux-gnu",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system family the package is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    pub fn host() -> Platform {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Whether one file can carry code for several architectures.
    pub fn supports_fat_binaries(self) -> bool {
        matches!(self, Platform::MacOs)
    }

    /// Shared library file name for a library base name like `libxml2`.
    pub fn shared_library_name(self, base: &str) -> String {
        match self {
            Platform::MacOs => format!("{base}.dylib"),
            Platform::Linux => format!("{base}.so"),
        }
    }

    /// Per-architecture compiler flags.
    pub fn arch_flags(self, arch: Arch) -> Vec<String> {
        match self {
            Platform::MacOs => vec!["-arch".to_string(), arch.as_str().to_string()],
            Platform::Linux => Vec::new(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MacOs => f.write_str("macos"),
            Platform::Linux => f.write_str("linux"),
        }
    }
}
