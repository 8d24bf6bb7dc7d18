use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::programs::ConfigError;

/// Configuration for importing and rendering discussion content.
///
/// Lives in `.discussion/config.toml` under the course root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Whether unexpected failures while loading a legacy definition file
    /// abort the import.
    ///
    /// When `false` (default): any failure to load the definition file is
    /// logged and the block is treated as having no legacy definition.
    ///
    /// When `true`: only a missing file counts as "no legacy definition";
    /// unreadable or malformed files are reported as errors.
    pub strict_definitions: bool,

    /// Directory holding template overrides.
    ///
    /// Templates found here replace the bundled ones of the same name.
    pub template_dir: Option<PathBuf>,

    /// Policy document to apply on top of legacy definitions.
    ///
    /// Relative paths are resolved against the course root. When unset,
    /// `policies/{run}/policy.json` is used.
    pub policy_file: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Loads the configuration for a course root.
    ///
    /// A course without a configuration file uses the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        match Self::load(&path) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!("Failed to load config from {}: {e}", path.display());
                Err(e)
            }
            ok => ok,
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Where the configuration for the course rooted at `root` lives.
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(".discussion").join("config.toml")
    }
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        import: ImportSection,

        #[serde(default, skip_serializing_if = "TemplateSection::is_empty")]
        templates: TemplateSection,

        #[serde(default, skip_serializing_if = "PolicySection::is_empty")]
        policy: PolicySection,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ImportSection {
    #[serde(default)]
    strict_definitions: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TemplateSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directory: Option<PathBuf>,
}

impl TemplateSection {
    const fn is_empty(&self) -> bool {
        self.directory.is_none()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PolicySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
}

impl PolicySection {
    const fn is_empty(&self) -> bool {
        self.file.is_none()
    }
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                import,
                templates,
                policy,
            } => Self {
                strict_definitions: import.strict_definitions,
                template_dir: templates.directory,
                policy_file: policy.file,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            import: ImportSection {
                strict_definitions: config.strict_definitions,
            },
            templates: TemplateSection {
                directory: config.template_dir,
            },
            policy: PolicySection {
                file: config.policy_file,
            },
        }
    }
}
