use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors.
///
/// Every variant tied to a section names it, and field-level variants name
/// the offending field plus the violated constraint.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No config file found; pass --config or set TASKSYNC_CONFIG")]
    NotFound,

    #[error("[{section}] <- no such section")]
    NoSuchSection { section: String },

    #[error("[{section}] {field} <- field required")]
    MissingField { section: String, field: String },

    #[error("[{section}] {field} <- unexpected value '{value}'")]
    UnexpectedValue {
        section: String,
        field: String,
        value: String,
    },

    #[error("[{section}] {field} <- {reason}")]
    InvalidField {
        section: String,
        field: String,
        reason: String,
    },

    #[error("[{section}] <- {reason}")]
    InvalidSection { section: String, reason: String },
}

impl ConfigError {
    pub fn missing(section: &str, field: &str) -> Self {
        ConfigError::MissingField {
            section: section.to_string(),
            field: field.to_string(),
        }
    }

    pub fn unexpected(section: &str, field: &str, value: impl Into<String>) -> Self {
        ConfigError::UnexpectedValue {
            section: section.to_string(),
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn invalid(section: &str, field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            section: section.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Maps a schema deserialization failure onto the field-level variants where possible.
    pub(crate) fn from_schema(section: &str, err: toml::de::Error) -> Self {
        let message = err.message();
        if let Some(field) = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            return ConfigError::missing(section, field);
        }
        ConfigError::InvalidSection {
            section: section.to_string(),
            reason: message.trim().to_string(),
        }
    }
}
