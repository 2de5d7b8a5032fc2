use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tasksync::convert::{hours_to_duration, parse_date, strip_non_alphanumeric};
use tasksync::description::Formatter;
use tasksync::record::{ANNOTATIONS, PRIORITY, PROJECT, TAGS};
use tasksync::{FieldType, Issue, NormalizedRecord, Priority, UdaSpec};

use super::api::RedmineIssue;

pub const URL: &str = "redmineurl";
pub const SUBJECT: &str = "redminesubject";
pub const ID: &str = "redmineid";
pub const DESCRIPTION: &str = "redminedescription";
pub const TRACKER: &str = "redminetracker";
pub const STATUS: &str = "redminestatus";
pub const AUTHOR: &str = "redmineauthor";
pub const CATEGORY: &str = "redminecategory";
pub const START_DATE: &str = "redminestartdate";
pub const SPENT_HOURS: &str = "redminespenthours";
pub const ESTIMATED_HOURS: &str = "redmineestimatedhours";
pub const CREATED_ON: &str = "redminecreatedon";
pub const UPDATED_ON: &str = "redmineupdatedon";
pub const DUE_DATE: &str = "redmineduedate";
pub const ASSIGNED_TO: &str = "redmineassignedto";
pub const PROJECT_NAME: &str = "redmineprojectname";

pub const UDAS: &[UdaSpec] = &[
    UdaSpec::new(URL, FieldType::String, "Redmine URL"),
    UdaSpec::new(SUBJECT, FieldType::String, "Redmine Subject"),
    UdaSpec::new(ID, FieldType::Numeric, "Redmine ID"),
    UdaSpec::new(DESCRIPTION, FieldType::String, "Redmine Description"),
    UdaSpec::new(TRACKER, FieldType::String, "Redmine Tracker"),
    UdaSpec::new(STATUS, FieldType::String, "Redmine Status"),
    UdaSpec::new(AUTHOR, FieldType::String, "Redmine Author"),
    UdaSpec::new(CATEGORY, FieldType::String, "Redmine Category"),
    UdaSpec::new(START_DATE, FieldType::Date, "Redmine Start Date"),
    UdaSpec::new(SPENT_HOURS, FieldType::Duration, "Redmine Spent Hours"),
    UdaSpec::new(ESTIMATED_HOURS, FieldType::Duration, "Redmine Estimated Hours"),
    UdaSpec::new(CREATED_ON, FieldType::Date, "Redmine Created On"),
    UdaSpec::new(UPDATED_ON, FieldType::Date, "Redmine Updated On"),
    UdaSpec::new(DUE_DATE, FieldType::Date, "Redmine Due Date"),
    UdaSpec::new(ASSIGNED_TO, FieldType::String, "Redmine Assigned To"),
    UdaSpec::new(PROJECT_NAME, FieldType::String, "Redmine Project"),
];

pub const UNIQUE_KEY: &[&str] = &[ID];

/// Maps a Redmine priority name; `None` means "use the configured default".
pub fn map_priority(name: &str) -> Option<Priority> {
    match name {
        "Low" => Some(Priority::Low),
        "Normal" => Some(Priority::Medium),
        "High" | "Urgent" | "Immediate" => Some(Priority::High),
        _ => None,
    }
}

/// Dates parsed up front so a malformed value fails the pull, not the render.
#[derive(Debug, Clone, Default)]
struct IssueDates {
    start_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    created_on: Option<DateTime<Utc>>,
    updated_on: Option<DateTime<Utc>>,
}

fn parse_optional(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_date(v).with_context(|| format!("Invalid Redmine {}", field)))
        .transpose()
}

/// A Redmine issue plus everything derived from the target config.
#[derive(Debug, Clone)]
pub struct RedmineTaskIssue {
    pub issue: RedmineIssue,
    pub url: String,
    pub project: String,
    pub priority: Option<Priority>,
    pub formatter: Formatter,
    dates: IssueDates,
}

impl RedmineTaskIssue {
    pub fn new(
        issue: RedmineIssue,
        base_url: &str,
        project_override: &str,
        default_priority: Option<Priority>,
        formatter: Formatter,
    ) -> Result<Self> {
        let dates = IssueDates {
            start_date: parse_optional("start_date", issue.start_date.as_deref())?,
            due_date: parse_optional("due_date", issue.due_date.as_deref())?,
            created_on: parse_optional("created_on", issue.created_on.as_deref())?,
            updated_on: parse_optional("updated_on", issue.updated_on.as_deref())?,
        };
        let project = if project_override.is_empty() {
            strip_non_alphanumeric(&issue.project.name)
        } else {
            project_override.to_string()
        };
        let priority = issue
            .priority
            .as_ref()
            .and_then(|p| map_priority(&p.name))
            .or(default_priority);

        Ok(Self {
            url: format!("{}/issues/{}", base_url, issue.id),
            issue,
            project,
            priority,
            formatter,
            dates,
        })
    }
}

impl Issue for RedmineTaskIssue {
    fn to_record(&self) -> NormalizedRecord {
        let issue = &self.issue;
        let mut record = NormalizedRecord::new();
        record
            .insert(PROJECT, self.project.as_str())
            .insert(PRIORITY, self.priority)
            .insert(TAGS, Vec::<String>::new())
            .insert(ANNOTATIONS, Vec::<String>::new())
            .insert(URL, self.url.as_str())
            .insert(SUBJECT, issue.subject.as_str())
            .insert(ID, issue.id)
            .insert(DESCRIPTION, issue.description.as_deref().unwrap_or_default())
            .insert(TRACKER, issue.tracker.name.as_str())
            .insert(STATUS, issue.status.name.as_str())
            .insert(AUTHOR, issue.author.name.as_str())
            .insert(PROJECT_NAME, issue.project.name.as_str())
            .insert(ASSIGNED_TO, issue.assigned_to.as_ref().map(|r| r.name.as_str()))
            .insert(CATEGORY, issue.category.as_ref().map(|r| r.name.as_str()))
            .insert(START_DATE, self.dates.start_date)
            .insert(CREATED_ON, self.dates.created_on)
            .insert(UPDATED_ON, self.dates.updated_on)
            .insert(DUE_DATE, self.dates.due_date)
            .insert(ESTIMATED_HOURS, issue.estimated_hours.map(hours_to_duration))
            .insert(SPENT_HOURS, issue.spent_hours.map(hours_to_duration));
        record
    }

    fn default_description(&self) -> String {
        self.formatter
            .description(&self.issue.subject, &self.url, self.issue.id, "issue")
    }
}
