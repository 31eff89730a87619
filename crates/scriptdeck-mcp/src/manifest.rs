//! package.json loading
//!
//! Only the `name` and `scripts` fields are read. Script order follows the
//! key order in the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

pub const MANIFEST_FILE: &str = "package.json";

/// One named command from the manifest's `scripts` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: String,
    pub command: String,
}

impl CommandEntry {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub scripts: Vec<CommandEntry>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    scripts: Option<Map<String, Value>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("script {name:?} in {} is not a string", .path.display())]
    InvalidScript { path: PathBuf, name: String },
}

pub fn load_manifest(path: &Path) -> Result<PackageManifest, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content, path)
}

/// Parse manifest text. `path` is only used in error messages.
pub fn parse_manifest(content: &str, path: &Path) -> Result<PackageManifest, ManifestError> {
    let raw: RawManifest = serde_json::from_str(content).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut scripts = Vec::new();
    for (name, value) in raw.scripts.unwrap_or_default() {
        let Value::String(command) = value else {
            return Err(ManifestError::InvalidScript {
                path: path.to_path_buf(),
                name,
            });
        };
        scripts.push(CommandEntry { name, command });
    }

    Ok(PackageManifest {
        name: raw.name.and_then(|v| v.as_str().map(str::to_string)),
        scripts,
    })
}

/// Directory scripts run in: the one containing the manifest.
pub fn manifest_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<PackageManifest, ManifestError> {
        parse_manifest(content, Path::new("package.json"))
    }

    #[test]
    fn test_preserves_script_order() {
        let manifest = parse(
            r#"{"name": "demo", "scripts": {"test": "vitest run", "build": "tsc", "Build:Prod": "tsc -p prod"}}"#,
        )
        .unwrap();

        assert_eq!(manifest.name.as_deref(), Some("demo"));
        assert_eq!(
            manifest.scripts,
            vec![
                CommandEntry::new("test", "vitest run"),
                CommandEntry::new("build", "tsc"),
                CommandEntry::new("Build:Prod", "tsc -p prod"),
            ]
        );
    }

    #[test]
    fn test_missing_or_empty_scripts_is_not_an_error() {
        assert!(parse(r#"{"name": "demo"}"#).unwrap().scripts.is_empty());
        assert!(parse(r#"{"scripts": {}}"#).unwrap().scripts.is_empty());
        assert!(parse(r#"{"scripts": null}"#).unwrap().scripts.is_empty());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn test_non_string_script_rejects_manifest() {
        let err = parse(r#"{"scripts": {"build": "tsc", "bad": 3}}"#).unwrap_err();
        match err {
            ManifestError::InvalidScript { name, .. } => assert_eq!(name, "bad"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_non_string_name_is_ignored() {
        let manifest = parse(r#"{"name": 42, "scripts": {"a": "b"}}"#).unwrap();
        assert_eq!(manifest.name, None);
        assert_eq!(manifest.scripts.len(), 1);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(&dir.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_manifest_dir_of_bare_file_name() {
        assert_eq!(manifest_dir(Path::new("package.json")), PathBuf::from("."));
        assert_eq!(manifest_dir(Path::new("/srv/app/package.json")), PathBuf::from("/srv/app"));
    }
}
