use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

use crate::http::ensure_success;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Story as returned by project search.
#[derive(Debug, Clone, Deserialize)]
pub struct Story {
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub story_type: String,
    #[serde(default)]
    pub estimate: Option<f64>,
    pub url: String,
    #[serde(default)]
    pub current_state: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub accepted_at: Option<String>,
    #[serde(default)]
    pub requested_by_id: Option<u64>,
    #[serde(default)]
    pub owner_ids: Vec<u64>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoryTask {
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub complete: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Blocker {
    pub description: String,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Membership {
    pub person: Person,
}

#[derive(Debug, Deserialize)]
struct StoryPage {
    #[serde(default)]
    stories: Vec<Story>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    stories: StoryPage,
}

/// HTTP client for the Pivotal Tracker REST API.
///
/// Authenticates with the `X-TrackerToken` header.
pub struct PivotalClient {
    http_client: Client,
    api_base: String,
    token: String,
}

impl PivotalClient {
    /// `api_base` is `{host}/{version}`.
    pub fn new(http_client: Client, api_base: String, token: String) -> Self {
        Self {
            http_client,
            api_base,
            token,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .http_client
            .get(&url)
            .header("X-TrackerToken", &self.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let response = ensure_success("Pivotal Tracker", response).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    pub async fn fetch_projects(&self, account_ids: &[String]) -> Result<Vec<Project>> {
        let account_ids = account_ids.join(",");
        self.get("/projects", &[("account_ids", account_ids.as_str())])
            .await
    }

    pub async fn search_stories(&self, project_id: u64, query: &str) -> Result<Vec<Story>> {
        let response: SearchResponse = self
            .get(&format!("/projects/{}/search", project_id), &[("query", query)])
            .await?;
        Ok(response.stories.stories)
    }

    pub async fn fetch_tasks(&self, project_id: u64, story_id: u64) -> Result<Vec<StoryTask>> {
        self.get(
            &format!("/projects/{}/stories/{}/tasks", project_id, story_id),
            &[],
        )
        .await
    }

    pub async fn fetch_blockers(&self, project_id: u64, story_id: u64) -> Result<Vec<Blocker>> {
        self.get(
            &format!("/projects/{}/stories/{}/blockers", project_id, story_id),
            &[],
        )
        .await
    }

    /// Person id → username for everyone on the project.
    pub async fn fetch_usernames(&self, project_id: u64) -> Result<HashMap<u64, String>> {
        let memberships: Vec<Membership> = self
            .get(&format!("/projects/{}/memberships", project_id), &[])
            .await?;
        Ok(memberships
            .into_iter()
            .map(|m| (m.person.id, m.person.username))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, TlsOptions};
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> PivotalClient {
        PivotalClient::new(
            build_client(TlsOptions::default()).unwrap(),
            format!("{}/services/v5", server.url()),
            "tracker-token".to_string(),
        )
    }

    #[tokio::test]
    async fn test_fetch_projects_sends_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/services/v5/projects")
            .match_query(Matcher::UrlEncoded("account_ids".into(), "100,200".into()))
            .match_header("x-trackertoken", "tracker-token")
            .with_status(200)
            .with_body(r#"[{"id": 99, "name": "Death Star", "kind": "project"}]"#)
            .create_async()
            .await;

        let projects = client(&server)
            .fetch_projects(&["100".to_string(), "200".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Death Star");
    }

    #[tokio::test]
    async fn test_search_reads_nested_stories() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/services/v5/projects/99/search")
            .match_query(Matcher::UrlEncoded("query".into(), "mywork:106".into()))
            .with_status(200)
            .with_body(
                r#"{"epics": {"epics": [], "total_hits": 0}, "query": "mywork:106",
                    "stories": {"stories": [], "total_hits": 0}}"#,
            )
            .create_async()
            .await;

        let stories = client(&server).search_stories(99, "mywork:106").await.unwrap();
        assert!(stories.is_empty());
    }

    #[tokio::test]
    async fn test_usernames_from_memberships() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/services/v5/projects/99/memberships")
            .with_status(200)
            .with_body(
                r#"[{"id": 16200, "kind": "project_membership",
                     "person": {"kind": "person", "id": 106, "name": "Galen Marek", "username": "starkiller"}}]"#,
            )
            .create_async()
            .await;

        let usernames = client(&server).fetch_usernames(99).await.unwrap();
        assert_eq!(usernames.get(&106).map(String::as_str), Some("starkiller"));
    }
}
