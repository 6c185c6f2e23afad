//! Configuration for flashcard review.

use review_scheduler::{SchedulerResult, Sm2, DEFAULT_EASINESS_FACTOR};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from the default location. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) => Self::load_or_default(&path),
            None => Ok(Self::default()),
        }
    }

    /// Like [`Config::load_from`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "flashcard-review")
            .map(|d| d.config_dir().join("config.toml"))
    }

    pub fn default_db_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "flashcard-review")
            .map(|d| d.data_dir().join("flashcards.db"))
    }

    /// Configured database path, then the platform data dir, then the working dir.
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .or_else(Self::default_db_path)
            .unwrap_or_else(|| "flashcards.db".into())
    }

    pub fn to_algorithm(&self) -> SchedulerResult<Sm2> {
        Sm2::new(self.scheduler.initial_ease)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_initial_ease")]
    pub initial_ease: f64,
}

fn default_initial_ease() -> f64 { DEFAULT_EASINESS_FACTOR }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASINESS_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    #[serde(default)]
    pub default_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [learner]
            default_user = "alice"
            "#,
        )
        .unwrap();
        assert_eq!(config.learner.default_user.as_deref(), Some("alice"));
        assert_eq!(config.scheduler.initial_ease, 2.5);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flashcard-review").join("config.toml");

        let mut config = Config::default();
        config.scheduler.initial_ease = 2.3;
        config.storage.database_path = Some(dir.path().join("cards.db"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.db_path(), dir.path().join("cards.db"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\ninitial_ease = \"high\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging\n").unwrap();
        assert!(matches!(Config::load_or_default(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_initial_ease_validated() {
        let mut config = Config::default();
        assert_eq!(config.to_algorithm().unwrap().initial_ease, 2.5);
        config.scheduler.initial_ease = 1.0;
        assert!(config.to_algorithm().is_err());
    }
}
