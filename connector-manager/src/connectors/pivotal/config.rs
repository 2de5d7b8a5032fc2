use serde::Deserialize;
use tasksync::config::fields::{integer, string_list, validate_url};
use tasksync::config::{CommonConfig, ConfigError, TargetSection};

pub const DEFAULT_HOST: &str = "https://www.pivotaltracker.com/services";
pub const API_VERSION: &str = "v5";

/// `service = "pivotaltracker"` section schema.
#[derive(Debug, Clone, Deserialize)]
pub struct PivotalConfig {
    pub token: String,
    #[serde(deserialize_with = "integer")]
    pub user_id: i64,
    #[serde(deserialize_with = "string_list")]
    pub account_ids: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default, deserialize_with = "string_list")]
    pub exclude_projects: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub exclude_stories: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub exclude_tags: Vec<String>,
    #[serde(default)]
    pub import_labels_as_tags: bool,
    #[serde(default = "default_true")]
    pub import_blockers: bool,
    /// Search query; `mywork:{user_id}` when unset.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(flatten)]
    pub common: CommonConfig,
}

fn default_version() -> String {
    API_VERSION.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_true() -> bool {
    true
}

impl PivotalConfig {
    pub fn from_section(section: &TargetSection) -> Result<Self, ConfigError> {
        let mut config: Self = section.parse()?;
        if config.version != API_VERSION {
            return Err(ConfigError::unexpected(&section.name, "version", config.version));
        }
        if config.account_ids.is_empty() {
            return Err(ConfigError::missing(&section.name, "account_ids"));
        }
        config.host = validate_url(&section.name, "host", &config.host)?;
        Ok(config)
    }

    pub fn query(&self) -> String {
        self.query
            .clone()
            .unwrap_or_else(|| format!("mywork:{}", self.user_id))
    }

    /// `{host}/{version}`
    pub fn api_base(&self) -> String {
        format!("{}/{}", self.host, self.version)
    }

    pub fn keyring_service(&self) -> String {
        format!("pivotaltracker://{}@{}", self.user_id, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync::config::Config;

    fn section(body: &str) -> TargetSection {
        let toml = format!(
            "[general]\ntargets = [\"pivotal\"]\n[pivotal]\nservice = \"pivotaltracker\"\n{}",
            body
        );
        Config::from_toml_str(&toml).unwrap().target("pivotal").unwrap()
    }

    #[test]
    fn test_validate_config() {
        let config = PivotalConfig::from_section(&section(
            "account_ids = \"12345\"\nuser_id = \"12345\"\ntoken = \"12345\"",
        ))
        .unwrap();
        assert_eq!(config.user_id, 12345);
        assert_eq!(config.account_ids, vec!["12345"]);
        assert_eq!(config.query(), "mywork:12345");
        assert_eq!(
            config.api_base(),
            "https://www.pivotaltracker.com/services/v5"
        );
        assert!(config.import_blockers);
        assert!(!config.import_labels_as_tags);
    }

    #[test]
    fn test_no_account_ids() {
        let err = PivotalConfig::from_section(&section("token = \"123\"\nuser_id = \"12345\""))
            .unwrap_err();
        assert_eq!(err.to_string(), "[pivotal] account_ids <- field required");
    }

    #[test]
    fn test_no_user_id() {
        let err = PivotalConfig::from_section(&section("account_ids = \"12345\"\ntoken = \"123\""))
            .unwrap_err();
        assert_eq!(err.to_string(), "[pivotal] user_id <- field required");
    }

    #[test]
    fn test_no_token() {
        let err = PivotalConfig::from_section(&section(
            "account_ids = \"12345\"\nuser_id = \"12345\"",
        ))
        .unwrap_err();
        assert_eq!(err.to_string(), "[pivotal] token <- field required");
    }

    #[test]
    fn test_invalid_version() {
        let err = PivotalConfig::from_section(&section(
            "account_ids = \"12345\"\ntoken = \"123\"\nuser_id = \"12345\"\nversion = \"v1\"",
        ))
        .unwrap_err();
        assert!(err.to_string().starts_with("[pivotal] version <- unexpected value"));
    }

    #[test]
    fn test_custom_query() {
        let config = PivotalConfig::from_section(&section(
            "account_ids = [100]\ntoken = \"t\"\nuser_id = 106\nquery = \"owner:106\"",
        ))
        .unwrap();
        assert_eq!(config.query(), "owner:106");
    }
}
