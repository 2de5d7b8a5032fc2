//! Field-level deserializers and validators shared by the service schemas.

use super::ConfigError;
use crate::record::Priority;
use serde::{de, Deserialize, Deserializer};
use std::path::PathBuf;

#[derive(Deserialize)]
#[serde(untagged)]
enum ListItem {
    Text(String),
    Integer(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawList {
    Items(Vec<ListItem>),
    Csv(String),
}

/// Accepts a TOML array or a comma-separated string.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match RawList::deserialize(deserializer)? {
        RawList::Items(items) => items
            .into_iter()
            .map(|item| match item {
                ListItem::Text(s) => s.trim().to_string(),
                ListItem::Integer(n) => n.to_string(),
            })
            .collect::<Vec<_>>(),
        RawList::Csv(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
    };
    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}

/// Accepts an integer or a string holding one.
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match ListItem::deserialize(deserializer)? {
        ListItem::Integer(n) => Ok(n),
        ListItem::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected an integer, got '{}'", s))),
    }
}

/// `"H"`, `"M"`, `"L"` or `""` (no priority).
pub fn priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(de::Error::custom)
}

/// Validates an http(s) URL and strips any trailing slash.
pub fn validate_url(section: &str, field: &str, value: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::invalid(section, field, format!("invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            section,
            field,
            format!("URL scheme must be http or https, got '{}'", parsed.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Expands a leading `~` to the home directory.
pub fn expand_path(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(value)
}
