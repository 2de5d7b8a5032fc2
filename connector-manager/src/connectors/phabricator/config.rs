use serde::Deserialize;
use std::path::PathBuf;
use tasksync::config::fields::{expand_path, string_list, validate_url};
use tasksync::config::{CommonConfig, ConfigError, TargetSection};

pub const DEFAULT_ARCRC: &str = "~/.arcrc";

/// `service = "phabricator"` section schema.
///
/// Credentials come from the arcanist rc file, not from this section.
#[derive(Debug, Clone, Deserialize)]
pub struct PhabricatorConfig {
    #[serde(default, deserialize_with = "string_list")]
    pub user_phids: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub project_phids: Vec<String>,
    /// Conduit host; the first `.arcrc` host when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub arcrc_path: Option<String>,
    #[serde(default)]
    pub ignore_cc: Option<bool>,
    #[serde(default)]
    pub ignore_author: Option<bool>,
    #[serde(default)]
    pub ignore_owner: bool,
    #[serde(default)]
    pub ignore_reviewers: bool,
    #[serde(flatten)]
    pub common: CommonConfig,
}

impl PhabricatorConfig {
    pub fn from_section(section: &TargetSection) -> Result<Self, ConfigError> {
        let mut config: Self = section.parse()?;
        if let Some(host) = &config.host {
            config.host = Some(validate_url(&section.name, "host", host)?);
        }
        Ok(config)
    }

    /// Falls back to `only_if_assigned` when not set explicitly.
    pub fn ignore_cc(&self) -> bool {
        self.ignore_cc.unwrap_or(self.common.only_if_assigned)
    }

    /// Falls back to `only_if_assigned` when not set explicitly.
    pub fn ignore_author(&self) -> bool {
        self.ignore_author.unwrap_or(self.common.only_if_assigned)
    }

    pub fn arcrc_path(&self) -> PathBuf {
        expand_path(self.arcrc_path.as_deref().unwrap_or(DEFAULT_ARCRC))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync::config::Config;

    fn section(body: &str) -> TargetSection {
        let toml = format!(
            "[general]\ntargets = [\"phab\"]\n[phab]\nservice = \"phabricator\"\n{}",
            body
        );
        Config::from_toml_str(&toml).unwrap().target("phab").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PhabricatorConfig::from_section(&section("")).unwrap();
        assert!(config.user_phids.is_empty());
        assert!(config.project_phids.is_empty());
        assert!(config.host.is_none());
        assert!(!config.ignore_cc());
        assert!(!config.ignore_author());
        assert!(!config.ignore_owner);
        assert!(!config.ignore_reviewers);
        assert!(config.arcrc_path().ends_with(".arcrc"));
    }

    #[test]
    fn test_ignore_flags_follow_only_if_assigned() {
        let config = PhabricatorConfig::from_section(&section("only_if_assigned = true")).unwrap();
        assert!(config.ignore_cc());
        assert!(config.ignore_author());

        let config = PhabricatorConfig::from_section(&section(
            "only_if_assigned = true\nignore_cc = false",
        ))
        .unwrap();
        assert!(!config.ignore_cc());
        assert!(config.ignore_author());
    }

    #[test]
    fn test_phid_lists_accept_csv() {
        let config = PhabricatorConfig::from_section(&section(
            "user_phids = \"PHID-USER-1, PHID-USER-2\"\nproject_phids = [\"PHID-PROJ-1\"]",
        ))
        .unwrap();
        assert_eq!(config.user_phids, vec!["PHID-USER-1", "PHID-USER-2"]);
        assert_eq!(config.project_phids, vec!["PHID-PROJ-1"]);
    }

    #[test]
    fn test_invalid_host() {
        let err = PhabricatorConfig::from_section(&section("host = \"phab\"")).unwrap_err();
        assert!(err.to_string().starts_with("[phab] host <- invalid URL"));
    }
}
