//! Source acquisition: download, verify, extract.
//!
//! Nothing is moved into the work directory until the checksum has been
//! verified and extraction has finished. A failed fetch leaves only dropped
//! temporaries behind.

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::error::{PackageError, Result};
use crate::recipe::Recipe;

/// Records the checksum a source tree was extracted from.
pub const CHECKSUM_MARKER: &str = ".source.sha256";

/// Fetch the recipe's source into `work_dir` and return the source tree.
///
/// The archive is always downloaded and verified. An already extracted tree
/// is reused only if its checksum marker matches the recipe; any other
/// existing tree is a [`PackageError::DirectoryConflict`].
pub fn fetch_source(recipe: &Recipe, work_dir: &Path) -> Result<PathBuf> {
    let dest = work_dir.join(recipe.source_dir_name());

    fs::create_dir_all(work_dir)
        .map_err(|e| PackageError::io("Failed to create work directory", work_dir, e))?;

    let url = recipe.source_url();
    let staging = tempfile::Builder::new()
        .prefix(".fetch-")
        .tempdir_in(work_dir)
        .map_err(|e| PackageError::io("Failed to create staging directory", work_dir, e))?;

    let archive = staging.path().join("source.tar.gz");
    info!("Downloading {url}");
    download(&url, &archive)?;

    verify_sha256(&archive, &recipe.source.sha256).map_err(|reason| PackageError::Fetch {
        url: url.clone(),
        reason,
    })?;
    debug!("Checksum verified for {}", archive.display());

    if dest.exists() {
        if extracted_from(&dest, &recipe.source.sha256) {
            info!("Reusing source tree {}", dest.display());
            return Ok(dest);
        }
        return Err(PackageError::DirectoryConflict { path: dest });
    }

    let extract_dir = staging.path().join("tree");
    fs::create_dir(&extract_dir)
        .map_err(|e| PackageError::io("Failed to create extraction directory", &extract_dir, e))?;
    extract(&archive, &extract_dir).map_err(|reason| PackageError::Fetch {
        url: url.clone(),
        reason,
    })?;

    let extracted = extract_dir.join(recipe.source_dir_name());
    if !extracted.is_dir() {
        return Err(PackageError::Fetch {
            url,
            reason: format!(
                "archive does not contain the directory {}",
                recipe.source_dir_name()
            ),
        });
    }

    rename_license(
        &extracted,
        &recipe.source.license_file,
        &recipe.package.license_file_name(),
    )?;

    let marker = extracted.join(CHECKSUM_MARKER);
    fs::write(&marker, recipe.source.sha256.to_ascii_lowercase())
        .map_err(|e| PackageError::io("Failed to write checksum marker", &marker, e))?;

    fs::rename(&extracted, &dest)
        .map_err(|e| PackageError::io("Failed to move source tree into place", &dest, e))?;
    info!("Extracted source to {}", dest.display());
    Ok(dest)
}

fn extracted_from(tree: &Path, sha256: &str) -> bool {
    fs::read_to_string(tree.join(CHECKSUM_MARKER))
        .is_ok_and(|recorded| recorded.trim().eq_ignore_ascii_case(sha256))
}

/// Download `url` to `dest`.
///
/// `file://` URLs and plain paths are copied locally; anything else goes
/// through `curl`.
pub fn download(url: &str, dest: &Path) -> Result<()> {
    let local = url
        .strip_prefix("file://")
        .or_else(|| (!url.contains("://")).then_some(url));

    if let Some(path) = local {
        fs::copy(path, dest).map_err(|e| PackageError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        return Ok(());
    }

    let output = Command::new("curl")
        .args(["-fsSL", "-o"])
        .arg(dest)
        .arg(url)
        .output()
        .map_err(|e| PackageError::Fetch {
            url: url.to_string(),
            reason: format!("curl could not be started: {e}"),
        })?;

    if !output.status.success() {
        return Err(PackageError::Fetch {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Hex-encoded SHA-256 of a file.
pub fn compute_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file's SHA-256 against `expected` (case-insensitive).
pub fn verify_sha256(path: &Path, expected: &str) -> std::result::Result<(), String> {
    let actual = compute_sha256(path).map_err(|e| format!("cannot hash {}: {e}", path.display()))?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(format!(
            "checksum mismatch: expected {}, computed {actual}",
            expected.to_ascii_lowercase()
        ));
    }
    Ok(())
}

fn extract(archive: &Path, dest: &Path) -> std::result::Result<(), String> {
    let output = Command::new("tar")
        .arg("-xf")
        .arg(archive)
        .arg("-C")
        .arg(dest)
        .output()
        .map_err(|e| format!("tar could not be started: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "tar failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

fn rename_license(source_dir: &Path, upstream: &str, renamed: &str) -> Result<()> {
    let from = source_dir.join(upstream);
    if !from.is_file() {
        return Err(PackageError::MissingFile { path: from });
    }
    let to = source_dir.join(renamed);
    fs::rename(&from, &to).map_err(|e| PackageError::io("Failed to rename license file", &to, e))
}
