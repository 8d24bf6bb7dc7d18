use std::{io, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Settings for programs in general.
///
/// Each change produces a new version of the record; the newest version is
/// the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramsConfig {
    /// Whether the configuration is active.
    pub enabled: bool,
    /// When this version was recorded.
    pub change_date: DateTime<Utc>,
    /// Who recorded this version, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    /// Path used to construct URLs to programs marketing pages (e.g. `/foo`).
    #[serde(default)]
    pub marketing_path: String,
}

impl ProgramsConfig {
    /// The configuration in effect before any version has been recorded.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            change_date: DateTime::<Utc>::UNIX_EPOCH,
            changed_by: None,
            marketing_path: String::new(),
        }
    }

    /// The marketing page URL for this configuration, resolved against `base`.
    ///
    /// Follows URL-join rules: an absolute path replaces the path of `base`,
    /// a relative one is resolved against it. Returns `Ok(None)` when the
    /// configuration is disabled or has no path.
    ///
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid absolute URL.
    pub fn marketing_url(&self, base: &str) -> Result<Option<Url>, url::ParseError> {
        if !self.enabled || self.marketing_path.is_empty() {
            return Ok(None);
        }
        Url::parse(base)?.join(&self.marketing_path).map(Some)
    }
}

/// The full, append-only history of [`ProgramsConfig`] versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct ConfigHistory {
    /// Oldest first.
    versions: Vec<ProgramsConfig>,
}

impl ConfigHistory {
    /// Loads the history from a TOML file.
    ///
    /// A missing file is an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Saves the history to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The version currently in effect.
    #[must_use]
    pub fn current(&self) -> ProgramsConfig {
        self.versions
            .last()
            .cloned()
            .unwrap_or_else(ProgramsConfig::disabled)
    }

    /// Every recorded version, oldest first.
    #[must_use]
    pub fn versions(&self) -> &[ProgramsConfig] {
        &self.versions
    }

    /// Record a new version, which becomes current.
    ///
    /// Earlier versions are left untouched.
    pub fn record(
        &mut self,
        enabled: bool,
        marketing_path: String,
        changed_by: Option<String>,
    ) -> &ProgramsConfig {
        self.record_at(enabled, marketing_path, changed_by, Utc::now())
    }

    fn record_at(
        &mut self,
        enabled: bool,
        marketing_path: String,
        changed_by: Option<String>,
        change_date: DateTime<Utc>,
    ) -> &ProgramsConfig {
        tracing::info!(enabled, %marketing_path, "Recording programs configuration");
        self.versions.push(ProgramsConfig {
            enabled,
            change_date,
            changed_by,
            marketing_path,
        });
        &self.versions[self.versions.len() - 1]
    }
}

/// Errors that can occur when loading or saving configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),

    /// The file contents are not valid.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// The serialized versions of the history file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        versions: Vec<ProgramsConfig>,
    },
}

impl From<Versions> for ConfigHistory {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { versions } => Self { versions },
        }
    }
}

impl From<ConfigHistory> for Versions {
    fn from(history: ConfigHistory) -> Self {
        Self::V1 {
            versions: history.versions,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn empty_history_is_disabled() {
        let history = ConfigHistory::default();
        let current = history.current();
        assert!(!current.enabled);
        assert!(current.marketing_path.is_empty());
    }

    #[test]
    fn newest_version_is_current_and_old_ones_are_kept() {
        let mut history = ConfigHistory::default();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        history.record_at(true, "/old".to_string(), None, first);
        history.record_at(true, "/new".to_string(), Some("staff".to_string()), second);

        assert_eq!(history.current().marketing_path, "/new");
        assert_eq!(history.current().changed_by.as_deref(), Some("staff"));
        assert_eq!(history.versions().len(), 2);
        assert_eq!(history.versions()[0].marketing_path, "/old");
        assert_eq!(history.versions()[0].change_date, first);
    }

    #[test]
    fn save_and_load_preserve_history() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".discussion").join("programs.toml");

        let mut history = ConfigHistory::default();
        history.record(true, "/programs".to_string(), Some("admin".to_string()));
        history.record(false, "/programs".to_string(), None);
        history.save(&path).unwrap();

        let loaded = ConfigHistory::load(&path).unwrap();
        assert_eq!(loaded, history);
        assert!(!loaded.current().enabled);
    }

    #[test]
    fn missing_file_is_empty_history() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = ConfigHistory::load(&tmp.path().join("missing.toml")).unwrap();
        assert!(loaded.versions().is_empty());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("programs.toml");
        std::fs::write(&path, "_version = \"1\"\nversions = 3\n").unwrap();
        assert!(matches!(
            ConfigHistory::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn marketing_url_follows_join_rules() {
        let mut config = ProgramsConfig::disabled();
        config.marketing_path = "/programs".to_string();
        assert_eq!(config.marketing_url("https://example.com/a/b").unwrap(), None);

        config.enabled = true;
        assert_eq!(
            config.marketing_url("https://example.com/a/b").unwrap().unwrap().as_str(),
            "https://example.com/programs"
        );

        config.marketing_path = "programs".to_string();
        assert_eq!(
            config.marketing_url("https://example.com/a/").unwrap().unwrap().as_str(),
            "https://example.com/a/programs"
        );

        assert!(config.marketing_url("not a url").is_err());
    }
}
