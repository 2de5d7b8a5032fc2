use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;


/// Attributes every service emits regardless of its own UDAs.
pub const PROJECT: &str = "project";
pub const PRIORITY: &str = "priority";
pub const TAGS: &str = "tags";
pub const ANNOTATIONS: &str = "annotations";

/// Declared value type of a service attribute, as Taskwarrior understands it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Numeric,
    Date,
    Duration,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::Duration => "duration",
        }
    }
}

/// One service-prefixed attribute (a Taskwarrior UDA).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdaSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub label: &'static str,
}

impl UdaSpec {
    pub const fn new(name: &'static str, field_type: FieldType, label: &'static str) -> Self {
        Self {
            name,
            field_type,
            label,
        }
    }

    /// `.taskrc` lines declaring this attribute.
    pub fn taskrc_lines(&self) -> [String; 2] {
        [
            format!("uda.{}.type={}", self.name, self.field_type.as_str()),
            format!("uda.{}.label={}", self.name, self.label),
        ]
    }
}

/// Taskwarrior priority bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "H",
            Priority::Medium => "M",
            Priority::Low => "L",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "H" => Ok(Priority::High),
            "M" => Ok(Priority::Medium),
            "L" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}': must be one of H, M, L", other)),
        }
    }
}

/// A single attribute value in a [`NormalizedRecord`].
///
/// Serializes untagged, so a record renders as a flat JSON object.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(DateTime<Utc>),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Saturates at `i64::MAX`.
impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

impl From<Priority> for FieldValue {
    fn from(value: Priority) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Flat mapping from attribute names to values, as handed to the collector.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn project(&self) -> Option<&str> {
        self.get(PROJECT).and_then(FieldValue::as_str)
    }

    pub fn priority(&self) -> Option<&str> {
        self.get(PRIORITY).and_then(FieldValue::as_str)
    }

    pub fn tags(&self) -> &[String] {
        self.get(TAGS).and_then(FieldValue::as_list).unwrap_or(&[])
    }

    pub fn annotations(&self) -> &[String] {
        self.get(ANNOTATIONS)
            .and_then(FieldValue::as_list)
            .unwrap_or(&[])
    }

    /// Appends tags that are not already present, keeping the existing order.
    pub fn add_tags<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags = self.tags().to_vec();
        for tag in extra {
            let tag = tag.into();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.insert(TAGS, tags);
    }

    /// Values of the given key attributes, in key order. Missing attributes yield `Null`.
    pub fn key_values(&self, key: &[&str]) -> Vec<FieldValue> {
        key.iter()
            .map(|name| self.get(name).cloned().unwrap_or(FieldValue::Null))
            .collect()
    }
}

/// A provider record that can render itself for the collector.
pub trait Issue: Send + Sync {
    /// The normalized attribute mapping for this record.
    fn to_record(&self) -> NormalizedRecord;

    /// One-line human description, e.g. `(bw)PR#7 - Fix parser .. https://...`.
    fn default_description(&self) -> String;
}
