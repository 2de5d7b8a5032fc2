use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tasksync::convert::{parse_date, replace_non_alphanumeric};
use tasksync::description::Formatter;
use tasksync::record::{ANNOTATIONS, PRIORITY, PROJECT, TAGS};
use tasksync::{FieldType, FieldValue, Issue, NormalizedRecord, Priority, UdaSpec};

use super::api::{Blocker, Project, Story, StoryTask};

pub const URL: &str = "pivotalurl";
pub const DESCRIPTION: &str = "pivotaldescription";
pub const TYPE: &str = "pivotalstorytype";
pub const PROJECT_ID: &str = "pivotalprojectid";
pub const PROJECT_NAME: &str = "pivotalprojectname";
pub const OWNERS: &str = "pivotalowners";
pub const REQUESTERS: &str = "pivotalrequesters";
pub const FOREIGN_ID: &str = "pivotalid";
pub const ESTIMATE: &str = "pivotalestimate";
pub const BLOCKERS: &str = "pivotalblockers";
pub const CREATED_AT: &str = "pivotalcreated";
pub const UPDATED_AT: &str = "pivotalupdated";
pub const CLOSED_AT: &str = "pivotalclosed";

pub const UDAS: &[UdaSpec] = &[
    UdaSpec::new(URL, FieldType::String, "Story URL"),
    UdaSpec::new(DESCRIPTION, FieldType::String, "Story Description"),
    UdaSpec::new(TYPE, FieldType::String, "Story Type"),
    UdaSpec::new(PROJECT_ID, FieldType::Numeric, "Project ID"),
    UdaSpec::new(PROJECT_NAME, FieldType::String, "Project Name"),
    UdaSpec::new(FOREIGN_ID, FieldType::Numeric, "Story ID"),
    UdaSpec::new(ESTIMATE, FieldType::Numeric, "Estimate"),
    UdaSpec::new(BLOCKERS, FieldType::String, "Blockers"),
    UdaSpec::new(OWNERS, FieldType::String, "Story Owner"),
    UdaSpec::new(REQUESTERS, FieldType::String, "Story Requester"),
    UdaSpec::new(CLOSED_AT, FieldType::Date, "Story Closed"),
    UdaSpec::new(UPDATED_AT, FieldType::Date, "Story Updated"),
    UdaSpec::new(CREATED_AT, FieldType::Date, "Story Created"),
];

pub const UNIQUE_KEY: &[&str] = &[URL];

/// `"Description: {d} State: {resolved}"` per blocker, joined with `"; "`.
pub fn format_blockers(blockers: &[Blocker]) -> String {
    blockers
        .iter()
        .map(|b| format!("Description: {} State: {}", b.description, b.resolved))
        .collect::<Vec<_>>()
        .join("; ")
}

/// `(kind, "status: {complete} - {description}")` annotation entries.
pub fn task_entries(tasks: &[StoryTask]) -> Vec<(String, String)> {
    tasks
        .iter()
        .map(|t| {
            (
                t.kind.clone(),
                format!("status: {} - {}", t.complete, t.description),
            )
        })
        .collect()
}

/// Whole-point estimates stay integers; fractional ones are kept as floats.
pub fn estimate_value(estimate: f64) -> FieldValue {
    if estimate.fract() == 0.0 && estimate.abs() < i64::MAX as f64 {
        FieldValue::Integer(estimate as i64)
    } else {
        FieldValue::Float(estimate)
    }
}

/// Resolves person ids to usernames, skipping unknown ids.
pub fn usernames(ids: &[u64], directory: &HashMap<u64, String>) -> String {
    ids.iter()
        .filter_map(|id| directory.get(id).map(String::as_str))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Side data fetched per story before mapping.
#[derive(Debug, Clone, Default)]
pub struct StoryExtra {
    pub annotations: Vec<String>,
    /// `None` when blockers are not imported.
    pub blockers: Option<String>,
    pub owners: String,
    pub requesters: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoryDates {
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    closed: Option<DateTime<Utc>>,
}

/// A Pivotal Tracker story with its project and side data.
#[derive(Debug, Clone)]
pub struct PivotalIssue {
    pub story: Story,
    pub project_name: String,
    pub extra: StoryExtra,
    pub priority: Option<Priority>,
    pub formatter: Formatter,
    dates: StoryDates,
}

impl PivotalIssue {
    pub fn new(
        story: Story,
        project: &Project,
        extra: StoryExtra,
        default_priority: Option<Priority>,
        formatter: Formatter,
    ) -> Result<Self> {
        let dates = StoryDates {
            created: parse_date(&story.created_at).context("Invalid story created_at")?,
            updated: parse_date(&story.updated_at).context("Invalid story updated_at")?,
            closed: story
                .accepted_at
                .as_deref()
                .map(parse_date)
                .transpose()
                .context("Invalid story accepted_at")?,
        };
        Ok(Self {
            story,
            project_name: project.name.clone(),
            extra,
            priority: default_priority,
            formatter,
            dates,
        })
    }
}

impl Issue for PivotalIssue {
    fn to_record(&self) -> NormalizedRecord {
        let story = &self.story;
        let mut record = NormalizedRecord::new();
        record
            .insert(PROJECT, replace_non_alphanumeric(&self.project_name, '_'))
            .insert(PRIORITY, self.priority)
            .insert(TAGS, self.extra.tags.clone())
            .insert(ANNOTATIONS, self.extra.annotations.clone())
            .insert(URL, story.url.as_str())
            .insert(DESCRIPTION, story.description.clone())
            .insert(TYPE, story.story_type.as_str())
            .insert(PROJECT_ID, story.project_id)
            .insert(PROJECT_NAME, self.project_name.as_str())
            .insert(OWNERS, self.extra.owners.as_str())
            .insert(REQUESTERS, self.extra.requesters.as_str())
            .insert(FOREIGN_ID, story.id)
            .insert(ESTIMATE, story.estimate.map(estimate_value))
            .insert(BLOCKERS, self.extra.blockers.clone())
            .insert(CREATED_AT, self.dates.created)
            .insert(UPDATED_AT, self.dates.updated)
            .insert(CLOSED_AT, self.dates.closed);
        record
    }

    fn default_description(&self) -> String {
        self.formatter.description(
            &self.story.name,
            &self.story.url,
            self.story.id,
            &self.story.story_type,
        )
    }
}
