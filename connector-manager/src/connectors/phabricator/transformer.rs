use tasksync::description::Formatter;
use tasksync::record::{ANNOTATIONS, PRIORITY, PROJECT, TAGS};
use tasksync::{FieldType, Issue, NormalizedRecord, Priority, UdaSpec};

use super::api::{Revision, Task};

pub const TITLE: &str = "phabricatortitle";
pub const URL: &str = "phabricatorurl";
pub const TYPE: &str = "phabricatortype";
pub const OBJECT_NAME: &str = "phabricatorid";

pub const UDAS: &[UdaSpec] = &[
    UdaSpec::new(TITLE, FieldType::String, "Phabricator Title"),
    UdaSpec::new(URL, FieldType::String, "Phabricator URL"),
    UdaSpec::new(TYPE, FieldType::String, "Phabricator Type"),
    UdaSpec::new(OBJECT_NAME, FieldType::String, "Phabricator Object"),
];

pub const UNIQUE_KEY: &[&str] = &[URL];

/// Maps a Maniphest priority name; `None` means "use the configured default".
pub fn map_priority(priority: Option<&str>) -> Option<Priority> {
    match priority? {
        "Unbreak Now!" | "High" => Some(Priority::High),
        "Normal" => Some(Priority::Medium),
        "Low" | "Wishlist" => Some(Priority::Low),
        // "Needs Triage" and anything unknown
        _ => None,
    }
}

/// Whether a record came from Maniphest or Differential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Task,
    Revision,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Task => "issue",
            RecordType::Revision => "pull_request",
        }
    }
}

/// A Maniphest task or Differential revision, reduced to what the record needs.
#[derive(Debug, Clone)]
pub struct PhabricatorIssue {
    pub record_type: RecordType,
    pub title: String,
    pub uri: String,
    pub priority: Option<Priority>,
    pub project: String,
    pub formatter: Formatter,
}

impl PhabricatorIssue {
    pub fn from_task(
        task: Task,
        project: &str,
        default_priority: Option<Priority>,
        formatter: Formatter,
    ) -> Self {
        Self {
            record_type: RecordType::Task,
            priority: map_priority(task.priority.as_deref()).or(default_priority),
            title: task.title,
            uri: task.uri,
            project: project.to_string(),
            formatter,
        }
    }

    pub fn from_revision(
        revision: Revision,
        project: &str,
        default_priority: Option<Priority>,
        formatter: Formatter,
    ) -> Self {
        Self {
            record_type: RecordType::Revision,
            priority: default_priority,
            title: revision.title,
            uri: revision.uri,
            project: project.to_string(),
            formatter,
        }
    }

    /// Object name such as `T123` or `D45`: the last path segment of the URI.
    pub fn object_name(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or_default()
    }
}

impl Issue for PhabricatorIssue {
    fn to_record(&self) -> NormalizedRecord {
        let mut record = NormalizedRecord::new();
        record
            .insert(PROJECT, self.project.as_str())
            .insert(PRIORITY, self.priority)
            .insert(TAGS, Vec::<String>::new())
            .insert(ANNOTATIONS, Vec::<String>::new())
            .insert(URL, self.uri.as_str())
            .insert(TYPE, self.record_type.as_str())
            .insert(TITLE, self.title.as_str())
            .insert(OBJECT_NAME, self.object_name());
        record
    }

    fn default_description(&self) -> String {
        self.formatter.description(
            &self.title,
            &self.uri,
            self.object_name(),
            self.record_type.as_str(),
        )
    }
}
