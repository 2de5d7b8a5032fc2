use anyhow::{anyhow, Context, Result};
use rand::Rng;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::auth::{AuthScheme, DigestChallenge, DigestState};
use crate::http::ensure_success;

/// Length of the `)]}'` line Gerrit puts in front of every JSON body.
pub const XSSI_PREFIX_LEN: usize = 4;

/// Account details as returned with `o=DETAILED_ACCOUNTS`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "_account_id")]
    pub account_id: Option<u64>,
}

impl AccountInfo {
    /// First of name, username, email; the account id otherwise.
    pub fn display_name(&self) -> String {
        self.name
            .as_ref()
            .or(self.username.as_ref())
            .or(self.email.as_ref())
            .cloned()
            .or_else(|| self.account_id.map(|id| id.to_string()))
            .unwrap_or_default()
    }
}

/// One review message on a change.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMessage {
    /// Absent on messages posted by Gerrit itself.
    #[serde(default)]
    pub author: AccountInfo,
    pub message: String,
    #[serde(default, rename = "_revision_number")]
    pub revision_number: Option<u32>,
}

impl ChangeMessage {
    /// Strips the `Patch Set N:` boilerplate and flattens the text to one line.
    pub fn clean_message(&self) -> String {
        let message = self
            .message
            .strip_prefix("Patch Set ")
            .unwrap_or(&self.message);
        let message = match self.revision_number {
            Some(rev) => message
                .strip_prefix(&format!("{}:", rev))
                .unwrap_or(message),
            None => message,
        };
        message.trim().replace('\n', " ")
    }
}

/// A change from `GET /a/changes/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub project: Option<String>,
    pub branch: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(rename = "_number")]
    pub number: u64,
    pub subject: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub work_in_progress: Option<bool>,
    #[serde(default)]
    pub messages: Vec<ChangeMessage>,
}

/// Decodes a change list body after dropping the XSSI guard line.
pub fn parse_changes(body: &str) -> Result<Vec<Change>> {
    let json = body
        .get(XSSI_PREFIX_LEN..)
        .ok_or_else(|| anyhow!("Gerrit response too short: {:?}", body))?;
    serde_json::from_str(json).context("Failed to parse Gerrit changes response")
}

/// HTTP client for the Gerrit REST API.
///
/// Authenticates with digest or basic auth depending on what the server
/// advertised when the client connected.
pub struct GerritClient {
    http_client: Client,
    base_uri: String,
    username: String,
    password: String,
    digest: Option<Mutex<Option<DigestState>>>,
}

impl GerritClient {
    /// Probes `{base_uri}/a/` and picks the auth scheme from its challenge.
    pub async fn connect(
        http_client: Client,
        base_uri: String,
        username: String,
        password: String,
    ) -> Result<Self> {
        let response = http_client
            .head(format!("{}/a/", base_uri))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to probe Gerrit authentication scheme")?;
        let header = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok());

        let digest = match AuthScheme::from_header(header) {
            AuthScheme::Basic => None,
            AuthScheme::Digest(challenge) => Some(Mutex::new(challenge.map(DigestState::new))),
        };
        tracing::debug!(
            "Gerrit {} uses {} auth",
            base_uri,
            if digest.is_some() { "digest" } else { "basic" }
        );

        Ok(Self {
            http_client,
            base_uri,
            username,
            password,
            digest,
        })
    }

    pub fn uses_digest(&self) -> bool {
        self.digest.is_some()
    }

    /// Fetch the changes matching `query_string`.
    ///
    /// The query is appended verbatim; Gerrit rejects percent-encoded `:`.
    pub async fn fetch_changes(&self, query_string: &str) -> Result<Vec<Change>> {
        let url = format!("{}/a/changes/?q={}", self.base_uri, query_string);
        let response = self.get(&url).await?;
        let response = ensure_success("Gerrit", response).await?;
        let body = response
            .text()
            .await
            .context("Failed to read Gerrit changes response")?;
        parse_changes(&body)
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let url = Url::parse(url).with_context(|| format!("Invalid Gerrit URL {}", url))?;
        let response = self.send(&url).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(digest) = &self.digest else {
            return Ok(response);
        };
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(DigestChallenge::parse);
        match challenge {
            Some(challenge) => {
                tracing::debug!("Gerrit issued a new digest challenge, retrying");
                *digest.lock().await = Some(DigestState::new(challenge));
                self.send(&url).await
            }
            None => Ok(response),
        }
    }

    async fn send(&self, url: &Url) -> Result<Response> {
        let mut request = self
            .http_client
            .request(Method::GET, url.clone())
            .header(ACCEPT, "application/json");

        match &self.digest {
            None => {
                request = request.basic_auth(&self.username, Some(&self.password));
            }
            Some(digest) => {
                if let Some(state) = digest.lock().await.as_mut() {
                    let uri = match url.query() {
                        Some(query) => format!("{}?{}", url.path(), query),
                        None => url.path().to_string(),
                    };
                    let cnonce = hex::encode(rand::thread_rng().gen::<[u8; 8]>());
                    let header =
                        state.authorize("GET", &uri, &self.username, &self.password, &cnonce);
                    request = request.header(AUTHORIZATION, header);
                }
            }
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to send Gerrit request to {}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_changes_strips_prefix() {
        let body = ")]}'\n[{\"branch\":\"main\",\"_number\":7,\"subject\":\"Fix\"}]";
        let changes = parse_changes(body).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].number, 7);
        assert!(changes[0].project.is_none());
        assert!(changes[0].messages.is_empty());
    }

    #[test]
    fn test_parse_changes_wrong_prefix_length_fails() {
        // Only three junk characters: one byte of JSON gets eaten.
        assert!(parse_changes(")]}[{\"branch\":\"m\",\"_number\":1,\"subject\":\"s\"}]").is_err());
        assert!(parse_changes(")]}").is_err());
    }

    #[test]
    fn test_display_name_fallback() {
        let full = AccountInfo {
            name: Some("Jane Doe".into()),
            username: Some("jane".into()),
            email: Some("jane@example.com".into()),
            account_id: Some(1000),
        };
        assert_eq!(full.display_name(), "Jane Doe");

        let email_only = AccountInfo {
            email: Some("jane@example.com".into()),
            account_id: Some(1000),
            ..Default::default()
        };
        assert_eq!(email_only.display_name(), "jane@example.com");

        let id_only = AccountInfo {
            account_id: Some(1000),
            ..Default::default()
        };
        assert_eq!(id_only.display_name(), "1000");
    }

    #[test]
    fn test_clean_message() {
        let message = ChangeMessage {
            author: AccountInfo::default(),
            message: "Patch Set 3: Code-Review+2\n\nLooks good".into(),
            revision_number: Some(3),
        };
        assert_eq!(message.clean_message(), "Code-Review+2  Looks good");

        let uploaded = ChangeMessage {
            author: AccountInfo::default(),
            message: "Uploaded patch set 2.".into(),
            revision_number: Some(2),
        };
        assert_eq!(uploaded.clean_message(), "Uploaded patch set 2.");
    }
}
