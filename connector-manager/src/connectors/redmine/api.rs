use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::http::ensure_success;

/// `{"id": .., "name": ..}` reference to another Redmine object.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
}

/// Issue as returned by `GET /issues.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct RedmineIssue {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    pub tracker: NamedRef,
    pub status: NamedRef,
    pub author: NamedRef,
    pub project: NamedRef,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    #[serde(default)]
    pub category: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_on: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub spent_hours: Option<f64>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IssuesResponse {
    issues: Vec<RedmineIssue>,
}

/// HTTP client for the Redmine REST API.
///
/// Authenticates with the `X-Redmine-API-Key` header, plus basic auth when
/// a login and password are both available.
pub struct RedmineClient {
    http_client: Client,
    url: String,
    key: String,
    basic_auth: Option<(String, String)>,
}

impl RedmineClient {
    pub fn new(
        http_client: Client,
        url: String,
        key: String,
        basic_auth: Option<(String, String)>,
    ) -> Self {
        Self {
            http_client,
            url,
            key,
            basic_auth,
        }
    }

    /// Fetch one page of issues (`limit` caps it; there is no pagination).
    pub async fn find_issues(
        &self,
        query: &str,
        limit: u32,
        only_if_assigned: bool,
    ) -> Result<Vec<RedmineIssue>> {
        let url = format!("{}/issues.json?{}", self.url.trim_end_matches('/'), query);
        let mut request = self
            .http_client
            .get(&url)
            .header("X-Redmine-API-Key", &self.key)
            .query(&[("limit", limit.to_string())]);
        if only_if_assigned {
            request = request.query(&[("assigned_to_id", "me")]);
        }
        if let Some((login, password)) = &self.basic_auth {
            request = request.basic_auth(login, Some(password));
        }

        let response = request
            .send()
            .await
            .context("Failed to send find_issues request")?;
        let response = ensure_success("Redmine", response).await?;
        let body = response
            .json::<IssuesResponse>()
            .await
            .context("Failed to parse issues response")?;
        Ok(body.issues)
    }
}
