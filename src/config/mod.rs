mod error;
pub mod fields;

pub use error::ConfigError;

use crate::description::Formatter;
use crate::record::Priority;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "TASKSYNC_CONFIG";

const GENERAL: &str = "general";
const SERVICE: &str = "service";

/// Loaded configuration: the `[general]` table plus one table per target.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    sections: toml::Table,
}

/// `[general]` settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Section names to pull from, in order
    #[serde(deserialize_with = "fields::string_list")]
    pub targets: Vec<String>,
    /// Annotation message cut-off in characters (0 disables)
    #[serde(default = "default_annotation_length")]
    pub annotation_length: usize,
    /// Description title cut-off in characters (0 disables)
    #[serde(default = "default_description_length")]
    pub description_length: usize,
    /// Allow `@oracle:ask_password` prompts
    #[serde(default)]
    pub interactive: bool,
    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_annotation_length() -> usize {
    45
}

fn default_description_length() -> usize {
    35
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GeneralConfig {
    /// Combines the global length limits with a target's link/annotation toggles.
    pub fn formatter(&self, common: &CommonConfig) -> Formatter {
        Formatter {
            description_length: non_zero(self.description_length),
            annotation_length: non_zero(self.annotation_length),
            inline_links: common.inline_links,
            annotation_links: common.annotation_links,
            annotation_comments: common.annotation_comments,
            annotation_newlines: common.annotation_newlines,
        }
    }
}

fn non_zero(len: usize) -> Option<usize> {
    (len > 0).then_some(len)
}

/// Settings every target section accepts, flattened into each service schema.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonConfig {
    #[serde(default = "default_priority", deserialize_with = "fields::priority")]
    pub default_priority: Option<Priority>,
    #[serde(default)]
    pub only_if_assigned: bool,
    #[serde(default, deserialize_with = "fields::string_list")]
    pub add_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub inline_links: bool,
    #[serde(default)]
    pub annotation_links: bool,
    #[serde(default = "default_true")]
    pub annotation_comments: bool,
    #[serde(default)]
    pub annotation_newlines: bool,
}

fn default_priority() -> Option<Priority> {
    Some(Priority::Medium)
}

fn default_true() -> bool {
    true
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            default_priority: default_priority(),
            only_if_assigned: false,
            add_tags: Vec::new(),
            inline_links: true,
            annotation_links: false,
            annotation_comments: true,
            annotation_newlines: false,
        }
    }
}

/// One target section, checked for a `service` key but not yet bound to a schema.
#[derive(Debug, Clone)]
pub struct TargetSection {
    pub name: String,
    pub service: String,
    table: toml::Table,
}

impl TargetSection {
    /// Deserializes the section into a service schema.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        toml::Value::Table(self.table.clone())
            .try_into()
            .map_err(|e| ConfigError::from_schema(&self.name, e))
    }

    pub fn table(&self) -> &toml::Table {
        &self.table
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut sections: toml::Table = toml::from_str(contents)?;
        let general = match sections.remove(GENERAL) {
            Some(toml::Value::Table(table)) => toml::Value::Table(table)
                .try_into::<GeneralConfig>()
                .map_err(|e| ConfigError::from_schema(GENERAL, e))?,
            Some(_) => {
                return Err(ConfigError::InvalidSection {
                    section: GENERAL.to_string(),
                    reason: "must be a table".to_string(),
                })
            }
            None => {
                return Err(ConfigError::NoSuchSection {
                    section: GENERAL.to_string(),
                })
            }
        };
        if general.targets.is_empty() {
            return Err(ConfigError::missing(GENERAL, "targets"));
        }

        let config = Self { general, sections };
        // Every target must at least name its service up front.
        config.targets()?;
        Ok(config)
    }

    /// All configured targets, in `general.targets` order.
    pub fn targets(&self) -> Result<Vec<TargetSection>, ConfigError> {
        self.general
            .targets
            .iter()
            .map(|name| self.target(name))
            .collect()
    }

    pub fn target(&self, name: &str) -> Result<TargetSection, ConfigError> {
        let table = match self.sections.get(name) {
            Some(toml::Value::Table(table)) => table.clone(),
            Some(_) => {
                return Err(ConfigError::InvalidSection {
                    section: name.to_string(),
                    reason: "must be a table".to_string(),
                })
            }
            None => {
                return Err(ConfigError::NoSuchSection {
                    section: name.to_string(),
                })
            }
        };
        let service = match table.get(SERVICE) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => return Err(ConfigError::unexpected(name, SERVICE, other.to_string())),
            None => return Err(ConfigError::missing(name, SERVICE)),
        };
        Ok(TargetSection {
            name: name.to_string(),
            service,
            table,
        })
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&contents)
}

/// `<config_dir>/tasksync/tasksync.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tasksync").join("tasksync.toml"))
}

/// Picks the explicit path, then `$TASKSYNC_CONFIG`, then the default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path()
        .filter(|path| path.exists())
        .ok_or(ConfigError::NotFound)
}
