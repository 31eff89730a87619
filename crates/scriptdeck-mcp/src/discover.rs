//! Manifest path resolution for the command line.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::manifest::{load_manifest, MANIFEST_FILE};

/// Package name of this tool. A manifest declaring this name is our own and
/// is skipped during the upward search.
pub const SELF_PACKAGE_NAME: &str = "scriptdeck-mcp";

#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("no package.json found in {}", .0.display())]
    MissingManifest(PathBuf),
}

/// Resolve the manifest to serve from an optional command-line argument.
///
/// - no argument: nearest manifest upward from `cwd` that is not ours, or `None`.
/// - a directory: it must contain a manifest.
/// - anything else: taken as the manifest path without further checks.
pub fn resolve_manifest_path(arg: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>, DiscoverError> {
    let Some(arg) = arg else {
        return Ok(find_nearest_manifest(cwd, SELF_PACKAGE_NAME));
    };

    let path = if arg.is_absolute() { arg.to_path_buf() } else { cwd.join(arg) };
    if path.is_dir() {
        let candidate = path.join(MANIFEST_FILE);
        if !candidate.is_file() {
            return Err(DiscoverError::MissingManifest(path));
        }
        return Ok(Some(candidate));
    }

    Ok(Some(path))
}

/// Walk from `start` up to the filesystem root and return the first manifest
/// whose declared name is not `self_name`.
///
/// A manifest that cannot be read or parsed is returned as-is so the loader
/// reports the problem instead of silently climbing past it.
pub fn find_nearest_manifest(start: &Path, self_name: &str) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(MANIFEST_FILE);
        if !candidate.is_file() {
            continue;
        }

        let declared = load_manifest(&candidate).ok().and_then(|m| m.name);
        if declared.as_deref() == Some(self_name) {
            debug!(path = %candidate.display(), "Skipping our own package manifest");
            continue;
        }

        return Some(candidate);
    }

    None
}
