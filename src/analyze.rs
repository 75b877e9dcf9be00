//! Link-table inspection using readelf (ELF) and otool (Mach-O).

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::process::Command;

use crate::error::{PackageError, Result};
use crate::paths::{find_system_library, is_system_path};
use crate::platform::Platform;

/// Shared-library dependencies recorded in a binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    /// Library names (ELF `NEEDED`) or install paths (Mach-O load commands).
    pub libraries: BTreeSet<String>,
    /// ELF `RPATH`/`RUNPATH` directories.
    pub search_paths: BTreeSet<String>,
}

impl LinkTable {
    /// Entries that do not belong to the system.
    ///
    /// ELF names are resolved below `root` (normally `/`); Mach-O entries
    /// are absolute paths and are checked by prefix.
    pub fn leaked(&self, platform: Platform, root: &Path) -> Vec<String> {
        let mut leaked: Vec<String> = match platform {
            Platform::MacOs => self
                .libraries
                .iter()
                .filter(|lib| !is_system_path(lib, platform))
                .cloned()
                .collect(),
            Platform::Linux => self
                .libraries
                .iter()
                .filter(|lib| {
                    if lib.contains('/') {
                        !is_system_path(lib, platform)
                    } else {
                        find_system_library(root, lib).is_none()
                    }
                })
                .cloned()
                .collect(),
        };

        leaked.extend(
            self.search_paths
                .iter()
                .filter(|dir| !stays_within_origin(dir) && !is_system_path(dir, platform))
                .cloned(),
        );
        leaked
    }
}

/// `$ORIGIN` or `${ORIGIN}`, optionally followed by a relative path that
/// never climbs above the origin directory.
fn stays_within_origin(dir: &str) -> bool {
    let Some(rest) = dir
        .strip_prefix("${ORIGIN}")
        .or_else(|| dir.strip_prefix("$ORIGIN"))
    else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }
    let Some(rest) = rest.strip_prefix('/') else {
        return false;
    };

    let mut depth = 0usize;
    for component in Path::new(rest).components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Read the link table of `binary` with the platform's tool.
///
/// Files the tool does not recognise as object files yield an empty table.
pub fn read_link_table(binary: &Path, platform: Platform) -> Result<LinkTable> {
    Ok(inspect(binary, platform)?.unwrap_or_default())
}

/// Fail with [`PackageError::LeakedDependency`] if `binary` links outside
/// the system library locations.
///
/// Unlike [`read_link_table`], a file that is not an object file is an error.
pub fn check_link_hygiene(binary: &Path, platform: Platform) -> Result<LinkTable> {
    let table = inspect(binary, platform)?.ok_or_else(|| {
        PackageError::io(
            "Cannot check link table",
            binary,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "not an object file"),
        )
    })?;
    check_table(binary, table, platform, Path::new("/"))
}

/// Check an already read link table, resolving ELF names below `root`.
pub fn check_table(
    binary: &Path,
    table: LinkTable,
    platform: Platform,
    root: &Path,
) -> Result<LinkTable> {
    let leaked = table.leaked(platform, root);
    if !leaked.is_empty() {
        return Err(PackageError::LeakedDependency {
            binary: binary.to_path_buf(),
            libraries: leaked,
        });
    }
    Ok(table)
}

fn inspect(binary: &Path, platform: Platform) -> Result<Option<LinkTable>> {
    if !binary.exists() {
        return Err(PackageError::MissingFile {
            path: binary.to_path_buf(),
        });
    }
    let table = match platform {
        Platform::Linux => run_tool(Command::new("readelf").arg("-d").arg(binary), binary)?.map(
            |output| LinkTable {
                libraries: parse_readelf_output(&output).into_iter().collect(),
                search_paths: parse_readelf_search_paths(&output).into_iter().collect(),
            },
        ),
        Platform::MacOs => {
            let is_dylib = binary.extension().is_some_and(|e| e == "dylib");
            run_tool(Command::new("otool").arg("-L").arg(binary), binary)?.map(|output| {
                LinkTable {
                    libraries: parse_otool_output(&output, is_dylib).into_iter().collect(),
                    search_paths: BTreeSet::new(),
                }
            })
        }
    };
    Ok(table)
}

const NOT_OBJECT_MARKERS: &[&str] = &[
    "Not an ELF file",
    "not a dynamic executable",
    "File format not recognized",
    "is not an object file",
];

/// Run a link-table tool; `None` means the file is not an object file.
fn run_tool(cmd: &mut Command, binary: &Path) -> Result<Option<String>> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    let output = cmd
        .output()
        .map_err(|e| PackageError::io("Failed to run link-table tool", &tool, e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    // readelf may exit 0 here; otool reports it on stdout
    if NOT_OBJECT_MARKERS
        .iter()
        .any(|m| stderr.contains(m) || stdout.contains(m))
    {
        return Ok(None);
    }

    if !output.status.success() {
        return Err(PackageError::io(
            "Link-table tool failed",
            binary,
            std::io::Error::other(format!("{tool}: {}", stderr.trim())),
        ));
    }

    Ok(Some(stdout))
}

/// Parse readelf -d output to extract NEEDED library names.
///
/// Example readelf output:
/// ```text
/// Dynamic section at offset 0x2d0e0 contains 28 entries:
///   Tag        Type                         Name/Value
///  0x0000000000000001 (NEEDED)             Shared library: [libtinfo.so.6]
///  0x0000000000000001 (NEEDED)             Shared library: [libc.so.6]
/// ```
pub fn parse_readelf_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("(NEEDED)") && line.contains("Shared library:"))
        .filter_map(bracketed)
        .map(str::to_string)
        .collect()
}

/// Parse `RPATH`/`RUNPATH` directories from readelf -d output.
pub fn parse_readelf_search_paths(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("(RPATH)") || line.contains("(RUNPATH)"))
        .filter_map(bracketed)
        .flat_map(|paths| paths.split(':'))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn bracketed(line: &str) -> Option<&str> {
    let start = line.find('[')?;
    let end = line.rfind(']')?;
    (end > start).then(|| &line[start + 1..end])
}

/// Parse otool -L output into linked library paths.
///
/// Each section starts with an unindented `file:` or
/// `file (architecture arm64):` header. For a dylib the first entry of a
/// section is its own install name, which is skipped when `skip_id` is set.
/// Sections of a universal binary are concatenated.
pub fn parse_otool_output(output: &str, skip_id: bool) -> Vec<String> {
    let mut libs = Vec::new();
    let mut first_in_section = false;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            first_in_section = true;
            continue;
        }
        let entry = line.trim();
        let path = entry.rfind(" (").map_or(entry, |i| &entry[..i]);
        if first_in_section && skip_id {
            first_in_section = false;
            continue;
        }
        first_in_section = false;
        libs.push(path.to_string());
    }

    libs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FAT_OTOOL: &str = "\
libxml2.dylib (architecture x86_64):
\t@rpath/libxml2.dylib (compatibility version 12.0.0, current version 12.2.0)
\t/usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1252.0.0)
\t/usr/lib/libz.1.dylib (compatibility version 1.0.0, current version 1.2.11)
libxml2.dylib (architecture arm64):
\t@rpath/libxml2.dylib (compatibility version 12.0.0, current version 12.2.0)
\t/usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1292.0.0)
\t/System/Library/Frameworks/CoreFoundation.framework/Versions/A/CoreFoundation (compatibility version 150.0.0, current version 1770.0.0)
";

    #[test]
    fn test_parse_readelf_output() {
        let output = r#"
Dynamic section at offset 0x2d0e0 contains 28 entries:
  Tag        Type                         Name/Value
 0x0000000000000001 (NEEDED)             Shared library: [libtinfo.so.6]
 0x0000000000000001 (NEEDED)             Shared library: [libc.so.6]
 0x000000000000000c (INIT)               0x5000
"#;
        let libs = parse_readelf_output(output);
        assert_eq!(libs, vec!["libtinfo.so.6", "libc.so.6"]);
    }

    #[test]
    fn test_parse_readelf_empty() {
        assert!(parse_readelf_output("not an ELF file").is_empty());
    }

    #[test]
    fn test_parse_readelf_search_paths() {
        let output = "\
 0x0000000000000001 (NEEDED)             Shared library: [libz.so.1]
 0x000000000000001d (RUNPATH)            Library runpath: [/opt/local/lib:$ORIGIN/../lib]
";
        assert_eq!(
            parse_readelf_search_paths(output),
            vec!["/opt/local/lib", "$ORIGIN/../lib"]
        );
    }

    #[test]
    fn test_parse_otool_universal_union() {
        let libs: BTreeSet<String> = parse_otool_output(FAT_OTOOL, true).into_iter().collect();
        let expected: BTreeSet<String> = [
            "/usr/lib/libSystem.B.dylib",
            "/usr/lib/libz.1.dylib",
            "/System/Library/Frameworks/CoreFoundation.framework/Versions/A/CoreFoundation",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(libs, expected);
    }

    #[test]
    fn test_parse_otool_executable_keeps_first_entry() {
        let output = "\
test_package:
\t@rpath/libxml2.dylib (compatibility version 12.0.0, current version 12.2.0)
\t/usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1252.0.0)
";
        assert_eq!(
            parse_otool_output(output, false),
            vec!["@rpath/libxml2.dylib", "/usr/lib/libSystem.B.dylib"]
        );
    }

    #[test]
    fn test_macos_leak_detection() {
        let mut table = LinkTable {
            libraries: parse_otool_output(FAT_OTOOL, true).into_iter().collect(),
            ..LinkTable::default()
        };
        assert!(table.leaked(Platform::MacOs, Path::new("/")).is_empty());

        table.libraries.insert("/usr/local/opt/libiconv/lib/libiconv.2.dylib".into());
        assert_eq!(
            table.leaked(Platform::MacOs, Path::new("/")),
            vec!["/usr/local/opt/libiconv/lib/libiconv.2.dylib"]
        );
    }

    #[test]
    fn test_linux_leak_detection() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("lib/x86_64-linux-gnu")).unwrap();
        fs::write(root.join("lib/x86_64-linux-gnu/libc.so.6"), "").unwrap();
        fs::write(root.join("lib/x86_64-linux-gnu/libm.so.6"), "").unwrap();

        let table = LinkTable {
            libraries: ["libc.so.6", "libm.so.6", "liblzma.so.5"]
                .into_iter()
                .map(String::from)
                .collect(),
            search_paths: ["/opt/deps/lib", "$ORIGIN"]
                .into_iter()
                .map(String::from)
                .collect(),
        };
        assert_eq!(
            table.leaked(Platform::Linux, root),
            vec!["liblzma.so.5", "/opt/deps/lib"]
        );
    }

    #[test]
    fn test_check_table_reports_leaks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("usr/lib")).unwrap();
        fs::write(root.join("usr/lib/libc.so.6"), "").unwrap();

        let table = LinkTable {
            libraries: ["libc.so.6", "liblzma.so.5"].into_iter().map(String::from).collect(),
            ..LinkTable::default()
        };
        let binary = Path::new("pkg/lib/libxml2.so");
        let err = check_table(binary, table.clone(), Platform::Linux, root).unwrap_err();
        match err {
            PackageError::LeakedDependency { binary: b, libraries } => {
                assert_eq!(b, binary);
                assert_eq!(libraries, vec!["liblzma.so.5"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut clean = table;
        clean.libraries.remove("liblzma.so.5");
        assert_eq!(
            check_table(binary, clean.clone(), Platform::Linux, root).unwrap(),
            clean
        );
    }

    #[test]
    fn test_origin_search_paths() {
        for ok in ["$ORIGIN", "${ORIGIN}", "$ORIGIN/deps", "${ORIGIN}/a/../b", "$ORIGIN/./lib"] {
            assert!(stays_within_origin(ok), "{ok}");
        }
        for bad in [
            "$ORIGIN/..",
            "$ORIGIN/../lib",
            "${ORIGIN}/../../opt/lib",
            "$ORIGIN/a/../../b",
            "$ORIGINAL/lib",
            "/opt/$ORIGIN",
        ] {
            assert!(!stays_within_origin(bad), "{bad}");
        }

        let table = LinkTable {
            search_paths: ["${ORIGIN}", "$ORIGIN/../../opt/lib"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..LinkTable::default()
        };
        assert_eq!(
            table.leaked(Platform::Linux, Path::new("/")),
            vec!["$ORIGIN/../../opt/lib"]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_hygiene_rejects_non_object_file() {
        let temp = TempDir::new().unwrap();
        // A GNU linker script is a common stand-in for libfoo.so
        let script = temp.path().join("libxml2.so");
        fs::write(&script, "/* GNU ld script */\nINPUT(libxml2.so.2)\n").unwrap();

        assert!(read_link_table(&script, Platform::Linux).unwrap().libraries.is_empty());
        let err = check_link_hygiene(&script, Platform::Linux).unwrap_err();
        assert!(err.to_string().contains("not an object file"), "{err}");
    }

    #[test]
    fn test_read_link_table_missing_binary() {
        let err = read_link_table(Path::new("/nonexistent/libxml2.so"), Platform::Linux)
            .unwrap_err();
        assert!(matches!(err, PackageError::MissingFile { .. }));
    }
}
