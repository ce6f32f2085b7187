use crate::utils::ancestors;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const USER_CONFIG_FILE: &str = "FileSync-UserConfig.json";
const PROJECT_CONFIG_FILE: &str = "FileSync-ProjectConfig.json";

/// Which settings a JSON config file may carry. Merging is done field by
/// field over this fixed list, user value first, then project, then default.
const SETTING_FIELDS: [&str; 3] = ["srcFiles", "ignoreFiles", "outputFolder"];

/// Resolved mirroring settings. Loaded once before the engine starts and
/// read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Ordered regex patterns selecting files to mirror, by bare file name.
    pub src_files: Vec<String>,
    /// Ordered regex patterns excluding files; these win over `src_files`.
    pub ignore_files: Vec<String>,
    /// Root of the mirror tree.
    pub output_folder: PathBuf,
}

/// Config files discovered for a run. Either may be absent.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// The directory to watch: the project config's directory when there is
    /// one, else the starting directory.
    pub fn listen_dir(&self, start_dir: &Path) -> PathBuf {
        self.project
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or(start_dir)
            .to_path_buf()
    }
}

/// Look for the user and project config files in `start_dir` and each of its
/// ancestors, nearest first. The nearest hit of each kind wins; the walk
/// stops early once both are found.
pub fn find_config_paths(start_dir: &Path) -> ConfigPaths {
    let mut found = ConfigPaths::default();
    for dir in ancestors(start_dir) {
        if found.user.is_none() {
            let candidate = dir.join(USER_CONFIG_FILE);
            if candidate.is_file() {
                found.user = Some(candidate);
            }
        }
        if found.project.is_none() {
            let candidate = dir.join(PROJECT_CONFIG_FILE);
            if candidate.is_file() {
                found.project = Some(candidate);
            }
        }
        if found.user.is_some() && found.project.is_some() {
            break;
        }
    }
    found
}

/// Layer the user config over the project config, field by field. A field
/// present (and non-null) in the user file wins; otherwise the project value
/// applies; otherwise the default.
pub fn combine_settings(paths: &ConfigPaths) -> Result<SyncSettings> {
    let user = load_json(paths.user.as_deref())?;
    let project = load_json(paths.project.as_deref())?;

    let mut merged = serde_json::Map::new();
    for field in SETTING_FIELDS {
        let value = pick_field(user.as_ref(), field).or_else(|| pick_field(project.as_ref(), field));
        if let Some(v) = value {
            merged.insert(field.to_string(), v.clone());
        }
    }

    let settings: SyncSettings = serde_json::from_value(serde_json::Value::Object(merged))
        .context("invalid settings value after merge")?;
    Ok(settings)
}

fn load_json(path: Option<&Path>) -> Result<Option<serde_json::Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(value))
}

fn pick_field<'a>(source: Option<&'a serde_json::Value>, field: &str) -> Option<&'a serde_json::Value> {
    source
        .and_then(|v| v.get(field))
        .filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn user_field_wins_over_project() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join(USER_CONFIG_FILE);
        let project = dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&user, r#"{"outputFolder": "/user/out"}"#).unwrap();
        fs::write(
            &project,
            r#"{"srcFiles": [".*\\.txt$"], "outputFolder": "/project/out"}"#,
        )
        .unwrap();

        let paths = ConfigPaths {
            user: Some(user),
            project: Some(project),
        };
        let settings = combine_settings(&paths).unwrap();
        assert_eq!(settings.output_folder, PathBuf::from("/user/out"));
        assert_eq!(settings.src_files, vec![".*\\.txt$".to_string()]);
        assert!(settings.ignore_files.is_empty());
    }

    #[test]
    fn null_field_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join(USER_CONFIG_FILE);
        let project = dir.path().join(PROJECT_CONFIG_FILE);
        fs::write(&user, r#"{"outputFolder": null}"#).unwrap();
        fs::write(&project, r#"{"outputFolder": "/project/out"}"#).unwrap();

        let paths = ConfigPaths {
            user: Some(user),
            project: Some(project),
        };
        let settings = combine_settings(&paths).unwrap();
        assert_eq!(settings.output_folder, PathBuf::from("/project/out"));
    }

    #[test]
    fn absent_files_yield_defaults() {
        let settings = combine_settings(&ConfigPaths::default()).unwrap();
        assert!(settings.src_files.is_empty());
        assert_eq!(settings.output_folder, PathBuf::new());
    }

    #[test]
    fn discovery_finds_nearest_configs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "{}").unwrap();
        fs::write(nested.join(USER_CONFIG_FILE), "{}").unwrap();

        let found = find_config_paths(&nested);
        assert_eq!(found.user, Some(nested.join(USER_CONFIG_FILE)));
        assert_eq!(
            found.project,
            Some(dir.path().join(PROJECT_CONFIG_FILE))
        );
        assert_eq!(found.listen_dir(&nested), dir.path().to_path_buf());
    }
}
