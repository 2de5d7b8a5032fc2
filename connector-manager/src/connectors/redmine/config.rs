use serde::Deserialize;
use tasksync::config::fields::validate_url;
use tasksync::config::{CommonConfig, ConfigError, TargetSection};

/// Secret-store user for the API key, which has no natural owner.
pub const KEY_USERNAME: &str = "nousername";

/// `service = "redmine"` section schema.
#[derive(Debug, Clone, Deserialize)]
pub struct RedmineConfig {
    pub url: String,
    pub key: String,
    #[serde(default = "default_issue_limit")]
    pub issue_limit: u32,
    /// Raw query string appended to `/issues.json?`.
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Overrides the project derived from the Redmine project name.
    #[serde(default)]
    pub project_name: String,
    #[serde(flatten)]
    pub common: CommonConfig,
}

fn default_issue_limit() -> u32 {
    100
}

fn default_verify_ssl() -> bool {
    true
}

impl RedmineConfig {
    pub fn from_section(section: &TargetSection) -> Result<Self, ConfigError> {
        let mut config: Self = section.parse()?;
        config.url = validate_url(&section.name, "url", &config.url)?;
        Ok(config)
    }

    /// Secret-store service name shared by the key and the password.
    pub fn keyring_service(&self) -> String {
        format!("redmine://{}@{}/", self.login, self.url)
    }
}
