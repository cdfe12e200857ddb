use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::difficulty::Difficulty;
use crate::protocol::{OneOrMany, StartSkillCheck};

/// Persisted demo defaults, used when the CLI leaves a knob unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Difficulty chain for a default session, as wire-shape entries.
    pub difficulty: Vec<Difficulty>,
    /// Accepted input keys.
    pub inputs: Vec<String>,
    /// Whether stage attempts are written to the stats database.
    pub record_attempts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: vec![Difficulty::Named("easy".to_string())],
            inputs: vec!["e".to_string()],
            record_attempts: true,
        }
    }
}

impl Config {
    /// The start command this config describes.
    pub fn to_start_command(&self) -> StartSkillCheck {
        StartSkillCheck {
            stages: OneOrMany::Many(self.difficulty.clone()),
            inputs: if self.inputs.is_empty() {
                None
            } else {
                Some(self.inputs.clone())
            },
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "ringcheck") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("ringcheck_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            difficulty: vec![
                Difficulty::Named("hard".into()),
                Difficulty::Custom {
                    area_size: 30.0,
                    speed_multiplier: 2.0,
                },
            ],
            inputs: vec!["w".into(), "a".into(), "s".into(), "d".into()],
            record_attempts: false,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nope.json"));
        assert_eq!(store.load(), Config::default());
    }

    #[test]
    fn default_config_builds_a_valid_start_command() {
        let cmd = Config::default().to_start_command();
        assert_eq!(cmd.stages.as_slice().len(), 1);
        assert_eq!(cmd.inputs.as_deref(), Some(&["e".to_string()][..]));
    }
}
