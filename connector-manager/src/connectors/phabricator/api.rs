use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

use crate::http::ensure_success;

pub const STATUS_OPEN: &str = "status-open";

/// Maniphest task as returned by `maniphest.query`.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub phid: String,
    pub title: String,
    pub uri: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, rename = "ownerPHID")]
    pub owner_phid: Option<String>,
    #[serde(default, rename = "ccPHIDs")]
    pub cc_phids: Vec<String>,
    #[serde(default, rename = "authorPHID")]
    pub author_phid: Option<String>,
    #[serde(default, rename = "projectPHIDs")]
    pub project_phids: Vec<String>,
}

/// Differential revision as returned by `differential.query`.
#[derive(Debug, Clone, Deserialize)]
pub struct Revision {
    pub title: String,
    pub uri: String,
    #[serde(default, rename = "authorPHID")]
    pub author_phid: Option<String>,
    #[serde(default, deserialize_with = "phid_set")]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub ccs: Vec<String>,
    #[serde(default, rename = "repositoryPHID")]
    pub repository_phid: Option<String>,
    #[serde(default, rename = "phabricator:projects")]
    pub projects: Option<Vec<String>>,
}

/// Reviewers come back either as a PHID list or as an object keyed by PHID.
fn phid_set<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PhidSet {
        List(Vec<String>),
        Keyed(BTreeMap<String, Value>),
    }
    Ok(match Option::<PhidSet>::deserialize(deserializer)? {
        Some(PhidSet::List(phids)) => phids,
        Some(PhidSet::Keyed(map)) => map.into_keys().collect(),
        None => Vec::new(),
    })
}

/// JSON object read as `(key, value)` pairs in document order.
///
/// Conduit encodes an empty object as `[]`, so an empty list is accepted too.
#[derive(Debug, Clone)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object or an empty list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                if access.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(1, &"an empty list"));
                }
                Ok(OrderedMap::default())
            }
        }

        deserializer.deserialize_any(OrderedMapVisitor(PhantomData))
    }
}

/// Transport failures and `error_code` envelopes.
///
/// Decode failures are not part of this type and stay plain [`anyhow::Error`]s.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("Conduit {method} request failed: {message}")]
    Transport { method: String, message: String },

    #[error("Conduit {method} failed: {code}: {info}")]
    Api {
        method: String,
        code: String,
        info: String,
    },
}

/// The Conduit response envelope.
#[derive(Debug, Deserialize)]
struct ConduitResponse<T> {
    result: Option<T>,
    error_code: Option<String>,
    error_info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArcrcHost {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArcrcConfig {
    #[serde(default)]
    default: Option<String>,
}

/// The parts of `~/.arcrc` needed to talk to Conduit.
#[derive(Debug, Deserialize)]
pub struct Arcrc {
    #[serde(default)]
    hosts: OrderedMap<ArcrcHost>,
    #[serde(default)]
    config: ArcrcConfig,
}

impl Arcrc {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Resolves `(api_url, token)` for `host`, or for the default host when `None`.
    ///
    /// Without an explicit host, the rc file's `config.default` wins, then
    /// the first host entry.
    pub fn credentials(&self, host: Option<&str>) -> Result<(String, String)> {
        let wanted = host
            .or(self.config.default.as_deref())
            .map(normalize_api_url);
        let entry = match &wanted {
            Some(url) => self
                .hosts
                .0
                .iter()
                .find(|(key, _)| normalize_api_url(key) == *url),
            None => self.hosts.0.first(),
        };
        let (key, host) = entry.ok_or_else(|| match &wanted {
            Some(url) => anyhow!("No .arcrc entry for Phabricator host {}", url),
            None => anyhow!("No hosts configured in .arcrc"),
        })?;
        let token = host
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("No Conduit token for {} in .arcrc", key))?;
        Ok((normalize_api_url(key), token))
    }
}

/// `https://phab.example.com` → `https://phab.example.com/api/`.
pub fn normalize_api_url(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        format!("{}/", trimmed)
    } else {
        format!("{}/api/", trimmed)
    }
}

/// Conduit query parameters with `status=status-open` and an optional PHID constraint.
pub fn open_query(constraint: Option<(&str, &[String])>) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("status".to_string(), json!(STATUS_OPEN));
    if let Some((key, phids)) = constraint {
        params.insert(key.to_string(), json!(phids));
    }
    params
}

/// HTTP client for the Phabricator Conduit API.
pub struct ConduitClient {
    http_client: Client,
    api_url: String,
    token: String,
}

impl ConduitClient {
    /// `api_url` must end with `/api/`.
    pub fn new(http_client: Client, api_url: String, token: String) -> Self {
        Self {
            http_client,
            api_url,
            token,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Calls a Conduit method and unwraps the response envelope.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        mut params: Map<String, Value>,
    ) -> Result<T> {
        params.insert("__conduit__".to_string(), json!({ "token": self.token }));
        let params = serde_json::to_string(&params).context("Failed to encode Conduit params")?;

        let url = format!("{}{}", self.api_url, method);
        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("params", params.as_str()),
                ("output", "json"),
                ("__conduit__", "1"),
            ])
            .send()
            .await
            .map_err(|e| ConduitError::Transport {
                method: method.to_string(),
                message: e.to_string(),
            })?;
        let response = ensure_success("Phabricator", response)
            .await
            .map_err(|e| ConduitError::Transport {
                method: method.to_string(),
                message: format!("{:#}", e),
            })?;
        let envelope = response
            .json::<ConduitResponse<T>>()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(code) = envelope.error_code {
            return Err(ConduitError::Api {
                method: method.to_string(),
                code,
                info: envelope.error_info.unwrap_or_default(),
            }
            .into());
        }
        envelope
            .result
            .ok_or_else(|| anyhow!("Conduit {} returned no result", method))
    }

    /// `maniphest.query`, in response order.
    pub async fn maniphest_query(&self, params: Map<String, Value>) -> Result<Vec<Task>> {
        let tasks: OrderedMap<Task> = self.call("maniphest.query", params).await?;
        Ok(tasks.0.into_iter().map(|(_, task)| task).collect())
    }

    /// `differential.query`.
    pub async fn differential_query(&self, params: Map<String, Value>) -> Result<Vec<Revision>> {
        self.call("differential.query", params).await
    }
}
