use tasksync::description::Formatter;
use tasksync::record::{ANNOTATIONS, PRIORITY, PROJECT, TAGS};
use tasksync::{FieldType, Issue, NormalizedRecord, Priority, UdaSpec};

use super::api::Change;

pub const SUMMARY: &str = "gerritsummary";
pub const URL: &str = "gerriturl";
pub const FOREIGN_ID: &str = "gerritid";
pub const BRANCH: &str = "gerritbranch";
pub const TOPIC: &str = "gerrittopic";
pub const STATUS: &str = "gerritstatus";
pub const WORK_IN_PROGRESS: &str = "gerritwip";

pub const UDAS: &[UdaSpec] = &[
    UdaSpec::new(SUMMARY, FieldType::String, "Gerrit Summary"),
    UdaSpec::new(URL, FieldType::String, "Gerrit URL"),
    UdaSpec::new(FOREIGN_ID, FieldType::Numeric, "Gerrit Change ID"),
    UdaSpec::new(BRANCH, FieldType::String, "Gerrit Branch"),
    UdaSpec::new(TOPIC, FieldType::String, "Gerrit Topic"),
    UdaSpec::new(STATUS, FieldType::String, "Gerrit Status"),
    UdaSpec::new(WORK_IN_PROGRESS, FieldType::Numeric, "Gerrit Work in Progress"),
];

pub const UNIQUE_KEY: &[&str] = &[URL];

const NO_TOPIC: &str = "notopic";

/// Change URL in the web UI: `{base_uri}/#/c/{number}/`.
pub fn change_url(base_uri: &str, change: &Change) -> String {
    format!("{}/#/c/{}/", base_uri, change.number)
}

/// A Gerrit change plus the URL and annotations computed for it.
#[derive(Debug, Clone)]
pub struct GerritIssue {
    pub change: Change,
    pub url: String,
    pub annotations: Vec<String>,
    pub default_priority: Option<Priority>,
    pub formatter: Formatter,
}

impl GerritIssue {
    pub fn new(
        change: Change,
        base_uri: &str,
        default_priority: Option<Priority>,
        formatter: Formatter,
    ) -> Self {
        let url = change_url(base_uri, &change);
        let entries = change
            .messages
            .iter()
            .map(|m| (m.author.display_name(), m.clean_message()));
        let annotations = formatter.annotations(entries, Some(&url));
        Self {
            change,
            url,
            annotations,
            default_priority,
            formatter,
        }
    }
}

impl Issue for GerritIssue {
    fn to_record(&self) -> NormalizedRecord {
        let change = &self.change;
        let mut record = NormalizedRecord::new();
        record
            .insert(PROJECT, change.project.clone())
            .insert(PRIORITY, self.default_priority)
            .insert(TAGS, Vec::<String>::new())
            .insert(ANNOTATIONS, self.annotations.clone())
            .insert(URL, self.url.clone())
            .insert(FOREIGN_ID, change.number)
            .insert(SUMMARY, change.subject.clone())
            .insert(BRANCH, change.branch.clone())
            .insert(TOPIC, change.topic.as_deref().unwrap_or(NO_TOPIC))
            .insert(STATUS, change.status.as_deref().unwrap_or_default())
            .insert(
                WORK_IN_PROGRESS,
                i64::from(change.work_in_progress.unwrap_or(false)),
            );
        record
    }

    fn default_description(&self) -> String {
        self.formatter.description(
            &self.change.subject,
            &self.url,
            self.change.number,
            "pull_request",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::gerrit::api::parse_changes;
    use tasksync::FieldValue;

    fn change(json: &str) -> Change {
        parse_changes(&format!(")]}}'\n[{}]", json)).unwrap().remove(0)
    }

    #[test]
    fn test_minimal_change_defaults() {
        let issue = GerritIssue::new(
            change(r#"{"branch":"master","_number":1,"subject":"this is a title","work_in_progress":true}"#),
            "https://one.com",
            Some(Priority::Medium),
            Formatter::default(),
        );
        let record = issue.to_record();

        assert_eq!(record.get(URL).and_then(FieldValue::as_str), Some("https://one.com/#/c/1/"));
        assert_eq!(record.get(TOPIC).and_then(FieldValue::as_str), Some("notopic"));
        assert_eq!(record.get(STATUS).and_then(FieldValue::as_str), Some(""));
        assert_eq!(record.get(WORK_IN_PROGRESS).and_then(FieldValue::as_i64), Some(1));
        assert_eq!(record.get(FOREIGN_ID).and_then(FieldValue::as_i64), Some(1));
        assert_eq!(record.priority(), Some("M"));
        assert!(record.tags().is_empty());
        assert!(record.annotations().is_empty());
        assert!(record.get(PROJECT).unwrap().is_null());
        assert_eq!(
            issue.default_description(),
            "(bw)PR#1 - this is a title .. https://one.com/#/c/1/"
        );
    }

    #[test]
    fn test_annotations_from_messages() {
        let issue = GerritIssue::new(
            change(
                r#"{"project":"nova","branch":"master","_number":9,"subject":"s",
                "topic":"t","status":"NEW",
                "messages":[
                    {"author":{"username":"jdoe","_account_id":5},"message":"Patch Set 1: Verified+1","_revision_number":1},
                    {"author":{"_account_id":7},"message":"Patch Set 2:\n\nRebased","_revision_number":2}
                ]}"#,
            ),
            "https://review",
            None,
            Formatter::default(),
        );
        let record = issue.to_record();
        assert_eq!(
            record.annotations(),
            &["@jdoe - Verified+1".to_string(), "@7 - Rebased".to_string()]
        );
        assert_eq!(record.project(), Some("nova"));
        assert!(record.get(PRIORITY).unwrap().is_null());
        assert_eq!(record.get(WORK_IN_PROGRESS).and_then(FieldValue::as_i64), Some(0));
    }

    #[test]
    fn test_annotation_link_comes_first() {
        let formatter = Formatter {
            annotation_links: true,
            ..Formatter::default()
        };
        let issue = GerritIssue::new(
            change(r#"{"branch":"b","_number":3,"subject":"s"}"#),
            "https://review",
            None,
            formatter,
        );
        assert_eq!(issue.annotations, vec!["https://review/#/c/3/".to_string()]);
    }
}
