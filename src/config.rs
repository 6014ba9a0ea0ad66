//! Converter configuration.
//!
//! Loaded from JSON. An explicitly given file must exist; otherwise the
//! per-user `interlinear/config.json` is read when present and defaults are
//! used when it is not. `INTERLINEAR_DB` overrides the database location.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "interlinear";
const CONFIG_FILE: &str = "config.json";
const DB_ENV: &str = "INTERLINEAR_DB";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. `None` means the per-user data directory.
    pub database: Option<PathBuf>,
    pub export: ExportConfig,
}

/// Options that reshape the exported hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Level that becomes the top of the exported tree.
    pub root: Option<String>,
    /// Levels removed from the exported tree; their children move up.
    pub skip: Vec<String>,
    /// Stored unit type to read for a level, by level name, when the store
    /// does not use the level's own name.
    pub type_map: BTreeMap<String, String>,
    /// Stored `tier:name` feature to read for an exported `tier:name`.
    pub feat_map: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(db) = std::env::var(DB_ENV) {
            config.database = Some(PathBuf::from(db));
        }

        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"export": {"root": "phrase"}}"#).unwrap();
        assert_eq!(config.database, None);
        assert_eq!(config.export.root.as_deref(), Some("phrase"));
        assert!(config.export.skip.is_empty());
    }

    #[test]
    fn test_load_file_reads_skip_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"database": "/tmp/units.db", "export": {"skip": ["paragraph", "morph"]}}"#,
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/units.db")));
        assert_eq!(config.export.skip, vec!["paragraph", "morph"]);
    }

    #[test]
    fn test_reads_type_and_feature_maps() {
        let config: Config = serde_json::from_str(
            r#"{"export": {
                "type_map": {"phrase": "sentence"},
                "feat_map": {"FlexText/en:gls": "gloss:en"}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            config.export.type_map.get("phrase").map(String::as_str),
            Some("sentence")
        );
        assert_eq!(
            config.export.feat_map.get("FlexText/en:gls").map(String::as_str),
            Some("gloss:en")
        );
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_file(&dir.path().join("absent.json"));
        assert!(result.is_err());
    }
}
