use serde::Deserialize;
use std::path::PathBuf;
use tasksync::config::fields::{expand_path, validate_url};
use tasksync::config::{CommonConfig, ConfigError, TargetSection};

pub const DEFAULT_QUERY: &str = "is:open+is:reviewer";

/// Appended to every change query so messages and account details come back inline.
pub const QUERY_OPTIONS: &str = "&o=MESSAGES&o=DETAILED_ACCOUNTS";

/// `service = "gerrit"` section schema.
#[derive(Debug, Clone, Deserialize)]
pub struct GerritConfig {
    pub base_uri: String,
    pub username: String,
    /// Empty means "ask the secret store".
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssl_ca_path: Option<String>,
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(flatten)]
    pub common: CommonConfig,
}

fn default_query() -> String {
    DEFAULT_QUERY.to_string()
}

impl GerritConfig {
    pub fn from_section(section: &TargetSection) -> Result<Self, ConfigError> {
        let mut config: Self = section.parse()?;
        config.base_uri = validate_url(&section.name, "base_uri", &config.base_uri)?;
        if config.username.is_empty() {
            return Err(ConfigError::invalid(&section.name, "username", "must not be empty"));
        }
        Ok(config)
    }

    /// Secret-store service name for the password.
    pub fn keyring_service(&self) -> String {
        format!("gerrit://{}", self.base_uri)
    }

    /// The configured query plus the inline-details options, unencoded.
    pub fn query_string(&self) -> String {
        format!("{}{}", self.query, QUERY_OPTIONS)
    }

    pub fn ssl_ca_path(&self) -> Option<PathBuf> {
        self.ssl_ca_path.as_deref().map(expand_path)
    }
}
